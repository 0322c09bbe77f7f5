//! Rewriter: the four edits that turn global-state code into threaded code
//!
//! Per package, in order:
//!  1. strip hoisted names out of top-level var declarations, keeping the
//!     rest byte-identical;
//!  2. extend signatures; threaded free functions gain a state receiver,
//!     threaded methods gain a prepended state parameter;
//!  3. rewrite local references to hoisted vars and threaded functions into
//!     `pstate.x` selectors inside function bodies;
//!  4. rewrite call sites of threaded methods (prepend `pstate` locally,
//!     `pstate.<peer>` across packages) and package-qualified references to
//!     hoisted vars / threaded functions into `pstate.<peer>.x`.
//!
//! A replaced subtree is never re-visited, an identifier with an empty
//! origin is always "this package", and a selector that does not resolve to
//! a known use is left untouched.

use log::trace;

use crate::{
    ast_store::{AstStore, IdGen},
    classifier::Classification,
    error::{Error, Result, inconsistent},
    package::{STATE_RECEIVER, STATE_TYPE},
    snapshot::{PackageSnapshot, ProgramSnapshot},
    syntax::{Decl, Expr, Ident, Param, TypeExpr, mutate_block, rewrite_block},
    types::DefId,
};

/// One var-spec row lifted out of package scope
///
/// `defs` aligns with `names`; blanks carry no definition. The values are
/// kept only so a caller can inspect what moved; the constructor's
/// initializers come from the snapshot's init order, not from here.
#[derive(Debug, Clone)]
pub struct MovedSpec {
    pub defs: Vec<Option<DefId>>,
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
}

pub struct Rewriter<'a> {
    snapshot: &'a ProgramSnapshot,
    classification: &'a Classification,
}

impl<'a> Rewriter<'a> {
    pub fn new(snapshot: &'a ProgramSnapshot, classification: &'a Classification) -> Self {
        Self {
            snapshot,
            classification,
        }
    }

    fn package(&self, path: &str) -> Result<&'a PackageSnapshot> {
        self.snapshot
            .package(path)
            .ok_or_else(|| inconsistent(format!("package {path} missing from snapshot")))
    }

    /// Edit 1: partition every top-level var group into kept and moved
    /// names. Groups left without a single name disappear entirely.
    pub fn strip_declarations(
        &self,
        store: &mut AstStore,
        package: &str,
    ) -> Result<Vec<MovedSpec>> {
        let pkg = self.package(package)?;
        let mut moved = Vec::new();

        store.rewrite_package_files(package, |_, file, _, maps| {
            for decl in &mut file.decls {
                let Decl::Var(group) = decl else { continue };
                let mut kept_specs = Vec::with_capacity(group.specs.len());

                for spec in group.specs.drain(..) {
                    let defs: Vec<Option<DefId>> = spec
                        .names
                        .iter()
                        .map(|name| {
                            maps.typed_of(name.id).and_then(|typed| pkg.def_at(typed))
                        })
                        .collect();
                    let hoisted: Vec<bool> = defs
                        .iter()
                        .map(|def| def.is_some_and(|d| self.classification.hoist_var(d)))
                        .collect();

                    if spec.is_tuple_group() {
                        // one rhs feeds several names: the row moves or stays
                        // as a whole so the constructor can emit the rhs once
                        if hoisted.iter().any(|&h| h) {
                            moved.push(MovedSpec {
                                defs,
                                names: spec.names,
                                ty: spec.ty,
                                values: spec.values,
                            });
                        } else {
                            kept_specs.push(spec);
                        }
                        continue;
                    }

                    let mut kept = spec.clone();
                    kept.names.clear();
                    kept.values.clear();
                    let mut lifted = MovedSpec {
                        defs: Vec::new(),
                        names: Vec::new(),
                        ty: spec.ty.clone(),
                        values: Vec::new(),
                    };

                    for (i, name) in spec.names.into_iter().enumerate() {
                        if hoisted[i] {
                            lifted.defs.push(defs[i]);
                            if let Some(value) = spec.values.get(i) {
                                lifted.values.push(value.clone());
                            }
                            trace!("hoisting {package}.{}", name.name);
                            lifted.names.push(name);
                        } else {
                            if let Some(value) = spec.values.get(i) {
                                kept.values.push(value.clone());
                            }
                            kept.names.push(name);
                        }
                    }

                    if !kept.names.is_empty() {
                        kept_specs.push(kept);
                    }
                    if !lifted.names.is_empty() {
                        moved.push(lifted);
                    }
                }

                group.specs = kept_specs;
            }

            // groups with no surviving spec are deleted
            file.decls.retain(
                |decl| !matches!(decl, Decl::Var(group) if group.specs.is_empty()),
            );
            Ok(())
        })?;

        Ok(moved)
    }

    /// Edit 2: thread the state through signatures
    pub fn extend_signatures(&self, store: &mut AstStore, package: &str) -> Result<()> {
        let pkg = self.package(package)?;
        let classification = self.classification;

        store.rewrite_package_files(package, |_, file, ids, maps| {
            for decl in &mut file.decls {
                let Decl::Func(func) = decl else { continue };
                let Some(def) = maps.typed_of(func.name.id).and_then(|t| pkg.def_at(t)) else {
                    continue;
                };
                if classification.is_threaded_func(def) {
                    func.recv = Some(state_param(ids));
                } else if classification.is_threaded_method(def) {
                    func.params.insert(0, state_param(ids));
                }
            }
            Ok(())
        })
    }

    /// Edit 3: `x` → `pstate.x` for hoisted vars and threaded functions
    /// declared in this package, inside every function body (the synthesized
    /// constructor included)
    pub fn rewrite_local_refs(&self, store: &mut AstStore, package: &str) -> Result<()> {
        let pkg = self.package(package)?;
        let snapshot = self.snapshot;
        let classification = self.classification;
        let mut failure: Option<Error> = None;

        store.rewrite_package_files(package, |_, file, ids, maps| {
            for decl in &mut file.decls {
                let Decl::Func(func) = decl else { continue };
                rewrite_block(&mut func.body, &mut |expr| {
                    let Expr::Ident(ident) = expr else { return None };
                    if ident.origin.is_some() {
                        return None;
                    }
                    let used = maps.typed_of(ident.id).and_then(|t| pkg.use_at(t))?;
                    if !classification.hoist_var(used) && !classification.is_threaded_func(used)
                    {
                        return None;
                    }
                    match snapshot.def(used) {
                        // only rewrite references that resolve into this
                        // package; a qualified peer reference is edit 4's job
                        Some(info) if info.package == package => Some(Expr::Selector {
                            id: ids.fresh(),
                            base: Box::new(state_ident(ids)),
                            field: ident.clone(),
                        }),
                        Some(_) => None,
                        None => {
                            if failure.is_none() {
                                failure = Some(inconsistent(format!(
                                    "use of {} resolves to an unknown def",
                                    ident.name
                                )));
                            }
                            None
                        }
                    }
                });
            }
            Ok(())
        })?;

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Edit 4a: thread the state argument through calls of threaded methods
    pub fn rewrite_method_calls(&self, store: &mut AstStore, package: &str) -> Result<()> {
        let pkg = self.package(package)?;
        let snapshot = self.snapshot;
        let classification = self.classification;
        let mut failure: Option<Error> = None;

        store.rewrite_package_files(package, |_, file, ids, maps| {
            for decl in &mut file.decls {
                let Decl::Func(func) = decl else { continue };
                mutate_block(&mut func.body, &mut |expr| {
                    let Expr::Call { callee, args, .. } = expr else { return };
                    let target = match &**callee {
                        Expr::Ident(ident) => ident,
                        Expr::Selector { field, .. } => field,
                        _ => return,
                    };
                    let Some(used) = maps.typed_of(target.id).and_then(|t| pkg.use_at(t))
                    else {
                        return;
                    };
                    if !classification.is_threaded_method(used) {
                        return;
                    }
                    match snapshot.def(used) {
                        Some(info) if info.package == package => {
                            args.insert(0, state_ident(ids));
                        }
                        Some(info) => match snapshot.package(&info.package) {
                            Some(peer) => {
                                let field = Ident::new(ids.fresh(), peer.name.clone());
                                args.insert(
                                    0,
                                    Expr::Selector {
                                        id: ids.fresh(),
                                        base: Box::new(state_ident(ids)),
                                        field,
                                    },
                                );
                            }
                            None => {
                                if failure.is_none() {
                                    failure = Some(inconsistent(format!(
                                        "threaded method {} of out-of-scope package {}",
                                        info.name, info.package
                                    )));
                                }
                            }
                        },
                        None => {
                            if failure.is_none() {
                                failure = Some(inconsistent(format!(
                                    "call of {} resolves to an unknown def",
                                    target.name
                                )));
                            }
                        }
                    }
                });
            }
            Ok(())
        })?;

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Edit 4b: `p.X` → `pstate.<p>.X` for hoisted vars and threaded
    /// functions of an in-scope peer
    pub fn rewrite_cross_refs(&self, store: &mut AstStore, package: &str) -> Result<()> {
        let snapshot = self.snapshot;
        let classification = self.classification;
        let pkg = self.package(package)?;

        store.rewrite_package_files(package, |_, file, ids, maps| {
            for decl in &mut file.decls {
                let Decl::Func(func) = decl else { continue };
                rewrite_block(&mut func.body, &mut |expr| {
                    let Expr::Ident(ident) = expr else { return None };
                    let origin = ident.origin.as_deref()?;
                    // out-of-scope imports keep their plain spelling
                    let peer = snapshot.package(origin)?;
                    let used = maps.typed_of(ident.id).and_then(|t| pkg.use_at(t))?;
                    if !classification.hoist_var(used) && !classification.is_threaded_func(used)
                    {
                        return None;
                    }
                    let peer_field = Ident::new(ids.fresh(), peer.name.clone());
                    let mut bare = ident.clone();
                    bare.origin = None;
                    Some(Expr::Selector {
                        id: ids.fresh(),
                        base: Box::new(Expr::Selector {
                            id: ids.fresh(),
                            base: Box::new(state_ident(ids)),
                            field: peer_field,
                        }),
                        field: bare,
                    })
                });
            }
            Ok(())
        })
    }
}

fn state_ident(ids: &mut IdGen) -> Expr {
    Expr::Ident(Ident::new(ids.fresh(), STATE_RECEIVER))
}

fn state_param(ids: &mut IdGen) -> Param {
    Param {
        name: Some(Ident::new(ids.fresh(), STATE_RECEIVER)),
        ty: TypeExpr::Pointer(Box::new(TypeExpr::Name(Ident::new(ids.fresh(), STATE_TYPE)))),
    }
}
