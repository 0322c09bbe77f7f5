//! Shared fixture support for the end-to-end scenarios
//!
//! The external collaborators (parser, type checker, SSA builder) are
//! replaced by a programmatic builder: decorated trees are constructed
//! directly, def/use bindings and init order are recorded the way a checker
//! would report them, and the SSA view carries exactly the stores each
//! scenario performs.

use libify::{
    ast_store::AstStore,
    cancel::CancelToken,
    codegen,
    pipeline::{Libifier, Libify},
    pointer::TableSolver,
    snapshot::{
        BasicType, DefInfo, DefKind, ImportedPackage, Initializer, ProgramSnapshot,
        SnapshotBuilder, Type,
    },
    ssa,
    syntax::{Block, Decl, Expr, FuncDecl, Ident, Lit, Param, Stmt, TypeExpr},
    types::{DefId, TypeId, TypedNodeId, ValueId},
};

pub const ROOT: &str = "example.com/app";
pub const MAIN: &str = "example.com/app/main";
pub const PEER: &str = "example.com/app/b";

pub struct Fixture {
    pub store: AstStore,
    pub builder: SnapshotBuilder,
    pub ssa: ssa::Program,
    next_typed: u32,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        Self {
            store: AstStore::new(),
            builder: ProgramSnapshot::builder(),
            ssa: ssa::Program::new(),
            next_typed: 0,
        }
    }

    pub fn add_package(&mut self, path: &str, name: &str) {
        self.builder.add_package(path, name);
    }

    pub fn entry(&mut self, path: &str) {
        self.builder.add_entry_package(path);
    }

    pub fn import(&mut self, from: &str, path: &str, name: &str) {
        self.builder.add_import(
            from,
            ImportedPackage {
                path: path.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub fn int_type(&mut self) -> TypeId {
        self.builder.types_mut().intern(Type::Basic(BasicType::Int))
    }

    pub fn def(&mut self, package: &str, name: &str, kind: DefKind) -> DefId {
        let ty = self.int_type();
        self.builder.add_def_info(DefInfo {
            name: name.to_string(),
            package: package.to_string(),
            kind,
            ty,
        })
    }

    fn typed(&mut self) -> TypedNodeId {
        let id = TypedNodeId::new(self.next_typed);
        self.next_typed += 1;
        id
    }

    /// A declaration-site identifier, bound through the node tables
    pub fn def_ident(&mut self, package: &str, name: &str, def: DefId) -> Ident {
        let ident = Ident::new(self.store.fresh(), name);
        let typed = self.typed();
        self.store.bind(ident.id, typed);
        self.builder.record_def(package, typed, def);
        ident
    }

    /// A reference-site identifier, bound through the node tables
    pub fn use_ident(&mut self, package: &str, name: &str, def: DefId) -> Ident {
        let ident = Ident::new(self.store.fresh(), name);
        let typed = self.typed();
        self.store.bind(ident.id, typed);
        self.builder.record_use(package, typed, def);
        ident
    }

    pub fn plain_ident(&mut self, name: &str) -> Ident {
        Ident::new(self.store.fresh(), name)
    }

    pub fn name_type(&mut self, name: &str) -> TypeExpr {
        TypeExpr::Name(Ident::new(self.store.fresh(), name))
    }

    pub fn lit_int(&mut self, value: &str) -> Expr {
        Expr::Lit {
            id: self.store.fresh(),
            lit: Lit::Int(value.to_string()),
        }
    }

    pub fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            id: self.store.fresh(),
            callee: Box::new(callee),
            args,
        }
    }

    pub fn func(
        &mut self,
        package: &str,
        name: &str,
        def: DefId,
        recv: Option<Param>,
        results: Vec<Param>,
        body: Vec<Stmt>,
    ) -> Decl {
        let name = self.def_ident(package, name, def);
        Decl::Func(FuncDecl {
            id: self.store.fresh(),
            name,
            recv,
            params: vec![],
            results,
            body: Block { stmts: body },
        })
    }

    pub fn init(&mut self, package: &str, lhs: Vec<DefId>, rhs: Expr) {
        self.builder.push_initializer(package, Initializer { lhs, rhs });
    }

    pub fn global(&mut self, def: DefId) -> ValueId {
        self.ssa.push_value(ssa::Value::Global { def })
    }

    pub fn opaque(&mut self) -> ValueId {
        self.ssa.push_value(ssa::Value::Opaque)
    }

    /// An SSA function holding one block of instructions
    pub fn ssa_fn(&mut self, package: &str, name: &str, is_method: bool, instrs: Vec<ssa::Instr>) {
        self.ssa.add_function(ssa::Function {
            name: name.to_string(),
            package: package.to_string(),
            is_method,
            blocks: vec![ssa::Block { instrs }],
            recover: None,
        });
    }

    /// A store of an opaque value into a global
    pub fn store_to(&mut self, package: &str, func: &str, def: DefId) {
        let addr = self.global(def);
        let value = self.opaque();
        self.ssa_fn(package, func, false, vec![ssa::Instr::Store { addr, value }]);
    }

    pub fn finish(self) -> (AstStore, ProgramSnapshot, ssa::Program) {
        (self.store, self.builder.finish(), self.ssa)
    }
}

/// Run the whole pipeline over the fixture output
pub fn run_libify(
    store: &mut AstStore,
    snapshot: &ProgramSnapshot,
    program: &ssa::Program,
    packages: Vec<&str>,
) -> libify::error::Result<()> {
    let solver = TableSolver::new();
    let libify = Libify {
        packages: packages.into_iter().map(str::to_string).collect(),
        root: ROOT.to_string(),
    };
    let mut libifier = Libifier::new(libify, snapshot, program, &solver, CancelToken::new());
    libifier.run(store)
}

/// Rendered source of one stored file
pub fn rendered(store: &AstStore, package: &str, fname: &str) -> String {
    codegen::render_file(
        store
            .file(package, fname)
            .unwrap_or_else(|| panic!("{package}/{fname} missing")),
    )
}

/// Rendered source of every file of a package, for whole-tree comparisons
pub fn rendered_package(store: &AstStore, package: &str) -> Vec<(String, String)> {
    store
        .package_files(package)
        .map(|(name, file)| (name.to_string(), codegen::render_file(file)))
        .collect()
}
