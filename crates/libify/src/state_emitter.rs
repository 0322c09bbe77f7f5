//! StateEmitter: synthesizes the per-package state file
//!
//! For every package one `package-state.go` is produced, holding the
//! `PackageState` record (imported peer states first, then hoisted
//! variables, each section sorted by name) and the `NewPackageState`
//! constructor: allocate, wire the injected peer states, run the hoisted
//! initializers in the program's original init order, return. Imports that
//! are not in scope contribute neither a field nor a parameter.
//!
//! Emission is skipped when the package already declares a `PackageState`;
//! running the transformation over its own output therefore changes
//! nothing.

use log::debug;

use crate::{
    ast_store::AstStore,
    classifier::Classification,
    error::{Result, inconsistent},
    package::{STATE_CTOR, STATE_FILE, STATE_RECEIVER, STATE_TYPE, peer_param_name},
    rewriter::MovedSpec,
    snapshot::{ImportedPackage, PackageSnapshot, ProgramSnapshot},
    syntax::{
        AssignOp, Block, Decl, Expr, FieldDecl, File, FuncDecl, Ident, Param, Stmt, TypeDecl,
        TypeExpr, UnaryOp,
    },
    type_renderer::TypeRenderer,
    types::DefId,
};

pub struct StateEmitter<'a> {
    snapshot: &'a ProgramSnapshot,
    classification: &'a Classification,
}

impl<'a> StateEmitter<'a> {
    pub fn new(snapshot: &'a ProgramSnapshot, classification: &'a Classification) -> Self {
        Self {
            snapshot,
            classification,
        }
    }

    /// Synthesize and attach the state file for one package.
    ///
    /// Returns `false` when the package already carries a state record.
    pub fn emit_package(
        &self,
        store: &mut AstStore,
        package: &str,
        moved: &[MovedSpec],
    ) -> Result<bool> {
        let pkg = self
            .snapshot
            .package(package)
            .ok_or_else(|| inconsistent(format!("package {package} missing from snapshot")))?;

        if store
            .package_files(package)
            .any(|(_, file)| file.declares_type(STATE_TYPE))
        {
            debug!("{package} already declares {STATE_TYPE}; skipping emission");
            return Ok(false);
        }

        let mut file = File::new(pkg.name.clone());
        let peers = self.in_scope_peers(pkg);

        let record = self.state_record(store, &mut file, &peers, moved)?;
        let ctor = self.constructor(store, &mut file, pkg, &peers)?;
        file.decls.push(Decl::Type(record));
        file.decls.push(Decl::Func(ctor));

        store.emit_file(package, STATE_FILE, file)?;
        Ok(true)
    }

    /// Imported peers that are themselves being transformed, sorted by short
    /// name for deterministic output
    fn in_scope_peers(&self, pkg: &PackageSnapshot) -> Vec<ImportedPackage> {
        let mut peers: Vec<ImportedPackage> = pkg
            .imports
            .iter()
            .filter(|imp| self.snapshot.package(&imp.path).is_some())
            .cloned()
            .collect();
        peers.sort_by(|a, b| a.name.cmp(&b.name));
        peers.dedup_by(|a, b| a.path == b.path);
        peers
    }

    fn state_record(
        &self,
        store: &mut AstStore,
        file: &mut File,
        peers: &[ImportedPackage],
        moved: &[MovedSpec],
    ) -> Result<TypeDecl> {
        let mut fields = Vec::new();

        // foo *foo.PackageState, one per in-scope import
        for peer in peers {
            file.ensure_import(store.fresh(), &peer.path);
            let id = store.fresh();
            let state_name = store.fresh();
            fields.push(FieldDecl {
                names: vec![Ident::new(id, peer.name.clone())],
                ty: TypeExpr::Pointer(Box::new(TypeExpr::Name(Ident::qualified(
                    state_name,
                    STATE_TYPE,
                    peer.path.clone(),
                )))),
            });
        }

        let mut var_fields = self.var_fields(store, file, moved)?;
        var_fields.sort_by(|a, b| a.names[0].name.cmp(&b.names[0].name));
        fields.extend(var_fields);

        Ok(TypeDecl {
            id: store.fresh(),
            name: Ident::new(store.fresh(), STATE_TYPE),
            ty: TypeExpr::Struct { fields },
        })
    }

    /// One field per hoisted name; a row with an explicit type keeps its
    /// names grouped, an untyped row gets one field per name
    fn var_fields(
        &self,
        store: &mut AstStore,
        file: &mut File,
        moved: &[MovedSpec],
    ) -> Result<Vec<FieldDecl>> {
        let mut fields = Vec::new();

        for spec in moved {
            let named: Vec<(&Ident, DefId)> = spec
                .names
                .iter()
                .zip(&spec.defs)
                .filter(|(name, _)| !name.is_blank())
                .filter_map(|(name, def)| def.map(|d| (name, d)))
                .collect();

            if spec.ty.is_some() {
                let Some(&(_, first_def)) = named.first() else {
                    continue;
                };
                let info = self.snapshot.def(first_def).ok_or_else(|| {
                    inconsistent(format!("moved def {first_def:?} missing from snapshot"))
                })?;
                let renderer = TypeRenderer::new(self.snapshot.types(), &info.package);
                let ty = renderer.render(info.ty, file, store.ids_mut())?;
                fields.push(FieldDecl {
                    names: named.iter().map(|(name, _)| (*name).clone()).collect(),
                    ty,
                });
                continue;
            }

            for (name, def) in named {
                let info = self.snapshot.def(def).ok_or_else(|| {
                    inconsistent(format!("moved def {def:?} missing from snapshot"))
                })?;
                let renderer = TypeRenderer::new(self.snapshot.types(), &info.package);
                let ty = renderer.render(info.ty, file, store.ids_mut())?;
                fields.push(FieldDecl {
                    names: vec![name.clone()],
                    ty,
                });
            }
        }

        Ok(fields)
    }

    fn constructor(
        &self,
        store: &mut AstStore,
        file: &mut File,
        pkg: &PackageSnapshot,
        peers: &[ImportedPackage],
    ) -> Result<FuncDecl> {
        let mut params = Vec::with_capacity(peers.len());
        for peer in peers {
            file.ensure_import(store.fresh(), &peer.path);
            params.push(Param {
                name: Some(Ident::new(store.fresh(), peer_param_name(&peer.name))),
                ty: TypeExpr::Pointer(Box::new(TypeExpr::Name(Ident::qualified(
                    store.fresh(),
                    STATE_TYPE,
                    peer.path.clone(),
                )))),
            });
        }

        let mut body = Vec::new();

        // pstate := &PackageState{}
        body.push(Stmt::Assign {
            lhs: vec![self.state_ident(store)],
            op: AssignOp::Define,
            rhs: vec![Expr::Unary {
                id: store.fresh(),
                op: UnaryOp::Addr,
                operand: Box::new(Expr::Composite {
                    id: store.fresh(),
                    ty: TypeExpr::Name(Ident::new(store.fresh(), STATE_TYPE)),
                    elems: vec![],
                }),
            }],
        });

        // pstate.foo = foo_pstate
        for peer in peers {
            body.push(Stmt::Assign {
                lhs: vec![self.state_field(store, &peer.name)],
                op: AssignOp::Assign,
                rhs: vec![Expr::Ident(Ident::new(
                    store.fresh(),
                    peer_param_name(&peer.name),
                ))],
            });
        }

        // hoisted initializers, original init order; a multi-value tuple
        // emits its rhs exactly once
        for init in &pkg.init_order {
            let mut lhs = Vec::new();
            for &def in &init.lhs {
                if !self.classification.hoist_var(def) {
                    continue;
                }
                let info = self.snapshot.def(def).ok_or_else(|| {
                    inconsistent(format!("init lhs {def:?} missing from snapshot"))
                })?;
                if info.name == "_" {
                    continue;
                }
                lhs.push(self.state_field(store, &info.name));
            }
            if lhs.is_empty() {
                continue;
            }
            body.push(Stmt::Assign {
                lhs,
                op: AssignOp::Assign,
                rhs: vec![init.rhs.clone()],
            });
        }

        body.push(Stmt::Return {
            results: vec![self.state_ident(store)],
        });

        Ok(FuncDecl {
            id: store.fresh(),
            name: Ident::new(store.fresh(), STATE_CTOR),
            recv: None,
            params,
            results: vec![Param {
                name: None,
                ty: TypeExpr::Pointer(Box::new(TypeExpr::Name(Ident::new(
                    store.fresh(),
                    STATE_TYPE,
                )))),
            }],
            body: Block { stmts: body },
        })
    }

    fn state_ident(&self, store: &mut AstStore) -> Expr {
        Expr::Ident(Ident::new(store.fresh(), STATE_RECEIVER))
    }

    fn state_field(&self, store: &mut AstStore, field: &str) -> Expr {
        Expr::Selector {
            id: store.fresh(),
            base: Box::new(self.state_ident(store)),
            field: Ident::new(store.fresh(), field.to_string()),
        }
    }
}
