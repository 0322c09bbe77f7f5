//! Decorated AST of the subject language
//!
//! The trees held here are the transformation's working representation.
//! Every node carries a [`NodeId`]; identifiers additionally carry an
//! optional *origin package path* that records which package a
//! package-qualified reference resolves into, so later passes can rewrite
//! cross-package references without re-resolving names.
//!
//! Free-floating comments are not represented; only build-tag lines survive
//! on the [`File`] node. This is a deliberate concession: edits would break
//! comment anchoring anyway.

use rustc_hash::FxHashSet;

use crate::types::NodeId;

/// An identifier, decorated with its origin package path
///
/// `origin == None` means the reference is (or is resolved within) the
/// enclosing package. `origin == Some(path)` marks the right-hand identifier
/// of a package-qualified reference; rendering resolves it back into
/// `alias.Name` through the containing file's import table.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub origin: Option<String>,
}

impl Ident {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            origin: None,
        }
    }

    pub fn qualified(id: NodeId, name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            origin: Some(origin.into()),
        }
    }

    /// The discard placeholder is never hoisted and never declared
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// A single import of the containing file
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub id: NodeId,
    pub alias: Option<String>,
    pub path: String,
}

impl Import {
    /// The name this import binds in file scope
    pub fn effective_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

/// One source file of a package
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub package_name: String,
    /// Build-tag comment lines, preserved verbatim above the package clause
    pub build_tags: Vec<String>,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

impl File {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            build_tags: Vec::new(),
            imports: Vec::new(),
            decls: Vec::new(),
        }
    }

    /// Return the file-scope name for `path`, adding an import if absent.
    ///
    /// A clash with an already-bound name allocates a numbered alias, so the
    /// returned name is always unambiguous within the file.
    pub fn ensure_import(&mut self, id: NodeId, path: &str) -> String {
        if let Some(existing) = self.imports.iter().find(|imp| imp.path == path) {
            return existing.effective_name().to_string();
        }

        let base = path.rsplit('/').next().unwrap_or(path).to_string();
        let taken: FxHashSet<String> = self
            .imports
            .iter()
            .map(|imp| imp.effective_name().to_string())
            .collect();

        let name = if taken.contains(&base) {
            let mut n = 2u32;
            loop {
                let candidate = format!("{base}_{n}");
                if !taken.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            base.clone()
        };

        let alias = (name != base).then(|| name.clone());
        self.imports.push(Import {
            id,
            alias,
            path: path.to_string(),
        });
        name
    }

    /// File-scope name of an already-imported path
    pub fn import_name(&self, path: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|imp| imp.path == path)
            .map(|imp| imp.effective_name())
    }

    /// Whether this file declares a type with the given name
    pub fn declares_type(&self, name: &str) -> bool {
        self.decls
            .iter()
            .any(|decl| matches!(decl, Decl::Type(t) if t.name.name == name))
    }
}

/// A top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Var(VarGroup),
    Func(FuncDecl),
    Type(TypeDecl),
}

/// A grouped package-level `var` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VarGroup {
    pub id: NodeId,
    pub specs: Vec<VarSpec>,
}

/// One (names, type, values) row of a var group
///
/// Invariant: when `ty` is absent every name has a corresponding value; when
/// both sides have more than one entry the indices align pairwise. A single
/// value spanning several names is a multi-value tuple group.
#[derive(Debug, Clone, PartialEq)]
pub struct VarSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
}

impl VarSpec {
    /// True when one rhs expression feeds several names
    pub fn is_tuple_group(&self) -> bool {
        self.values.len() == 1 && self.names.len() > 1
    }
}

/// A type declaration
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub id: NodeId,
    pub name: Ident,
    pub ty: TypeExpr,
}

/// A function or method declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: Ident,
    pub recv: Option<Param>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub body: Block,
}

impl FuncDecl {
    pub fn is_method(&self) -> bool {
        self.recv.is_some()
    }
}

/// A parameter, receiver, or result slot
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    /// `x++` / `x--`
    IncDec {
        target: Expr,
        negative: bool,
    },
    Return {
        results: Vec<Expr>,
    },
    If {
        cond: Expr,
        then: Block,
        els: Option<Block>,
    },
    For {
        cond: Option<Expr>,
        body: Block,
    },
    Block(Block),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `:=`
    Define,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    Selector {
        id: NodeId,
        base: Box<Expr>,
        field: Ident,
    },
    Call {
        id: NodeId,
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        id: NodeId,
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        id: NodeId,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Index {
        id: NodeId,
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Composite {
        id: NodeId,
        ty: TypeExpr,
        elems: Vec<Expr>,
    },
    FuncLit {
        id: NodeId,
        params: Vec<Param>,
        results: Vec<Param>,
        body: Block,
    },
    Lit {
        id: NodeId,
        lit: Lit,
    },
    Paren {
        id: NodeId,
        inner: Box<Expr>,
    },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Ident(ident) => ident.id,
            Expr::Selector { id, .. }
            | Expr::Call { id, .. }
            | Expr::Unary { id, .. }
            | Expr::Binary { id, .. }
            | Expr::Index { id, .. }
            | Expr::Composite { id, .. }
            | Expr::FuncLit { id, .. }
            | Expr::Lit { id, .. }
            | Expr::Paren { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `&x`
    Addr,
    /// `*x`
    Deref,
    /// `!x`
    Not,
    /// `-x`
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Less,
    Greater,
    And,
    Or,
}

/// Literal values keep their source spelling so kept declarations render
/// byte-equivalent
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Int(String),
    Float(String),
    Str(String),
    Rune(String),
    Bool(bool),
    Nil,
}

/// A syntactic type expression
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `int`, `T`, or `alias.T` via the ident's origin path
    Name(Ident),
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array {
        len: String,
        elem: Box<TypeExpr>,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Chan {
        dir: ChanDir,
        elem: Box<TypeExpr>,
    },
    Func {
        params: Vec<Param>,
        results: Vec<Param>,
    },
    Struct {
        fields: Vec<FieldDecl>,
    },
    Interface {
        members: Vec<InterfaceMember>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// A field row of a struct type or state record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceMember {
    Embedded(TypeExpr),
    Method {
        name: Ident,
        params: Vec<Param>,
        results: Vec<Param>,
    },
}

// ---------------------------------------------------------------------------
// Walkers
//
// Three traversal flavors cover every pass:
//  * `rewrite_*`: pre-order replacement; a replaced subtree is never
//    re-entered (single-visit invariant)
//  * `mutate_*`: pre-order in-place mutation that always descends, for
//    edits like call-argument prepending
//  * `visit_*`: read-only traversal
//
// Selector field identifiers are not expression slots: a reference that was
// rewritten into `pstate.x` must not have its `x` half picked up again.
// ---------------------------------------------------------------------------

/// Pre-order rewrite of an expression tree. Returning `Some` replaces the
/// node and stops descent into it.
pub fn rewrite_expr(slot: &mut Expr, f: &mut dyn FnMut(&Expr) -> Option<Expr>) {
    if let Some(replacement) = f(slot) {
        *slot = replacement;
        return;
    }
    match slot {
        Expr::Ident(_) | Expr::Lit { .. } => {}
        Expr::Selector { base, .. } => rewrite_expr(base, f),
        Expr::Call { callee, args, .. } => {
            rewrite_expr(callee, f);
            for arg in args {
                rewrite_expr(arg, f);
            }
        }
        Expr::Unary { operand, .. } => rewrite_expr(operand, f),
        Expr::Binary { left, right, .. } => {
            rewrite_expr(left, f);
            rewrite_expr(right, f);
        }
        Expr::Index { base, index, .. } => {
            rewrite_expr(base, f);
            rewrite_expr(index, f);
        }
        Expr::Composite { elems, .. } => {
            for elem in elems {
                rewrite_expr(elem, f);
            }
        }
        Expr::FuncLit { body, .. } => rewrite_block(body, f),
        Expr::Paren { inner, .. } => rewrite_expr(inner, f),
    }
}

/// Apply [`rewrite_expr`] to every expression slot of a statement block
pub fn rewrite_block(block: &mut Block, f: &mut dyn FnMut(&Expr) -> Option<Expr>) {
    for stmt in &mut block.stmts {
        match stmt {
            Stmt::Expr(expr) => rewrite_expr(expr, f),
            Stmt::Assign { lhs, rhs, .. } => {
                for expr in lhs.iter_mut().chain(rhs.iter_mut()) {
                    rewrite_expr(expr, f);
                }
            }
            Stmt::IncDec { target, .. } => rewrite_expr(target, f),
            Stmt::Return { results } => {
                for expr in results {
                    rewrite_expr(expr, f);
                }
            }
            Stmt::If { cond, then, els } => {
                rewrite_expr(cond, f);
                rewrite_block(then, f);
                if let Some(els) = els {
                    rewrite_block(els, f);
                }
            }
            Stmt::For { cond, body } => {
                if let Some(cond) = cond {
                    rewrite_expr(cond, f);
                }
                rewrite_block(body, f);
            }
            Stmt::Block(inner) => rewrite_block(inner, f),
        }
    }
}

/// Pre-order in-place mutation that always descends into children
pub fn mutate_expr(slot: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
    f(slot);
    match slot {
        Expr::Ident(_) | Expr::Lit { .. } => {}
        Expr::Selector { base, .. } => mutate_expr(base, f),
        Expr::Call { callee, args, .. } => {
            mutate_expr(callee, f);
            for arg in args {
                mutate_expr(arg, f);
            }
        }
        Expr::Unary { operand, .. } => mutate_expr(operand, f),
        Expr::Binary { left, right, .. } => {
            mutate_expr(left, f);
            mutate_expr(right, f);
        }
        Expr::Index { base, index, .. } => {
            mutate_expr(base, f);
            mutate_expr(index, f);
        }
        Expr::Composite { elems, .. } => {
            for elem in elems {
                mutate_expr(elem, f);
            }
        }
        Expr::FuncLit { body, .. } => mutate_block(body, f),
        Expr::Paren { inner, .. } => mutate_expr(inner, f),
    }
}

/// Apply [`mutate_expr`] to every expression slot of a statement block
pub fn mutate_block(block: &mut Block, f: &mut dyn FnMut(&mut Expr)) {
    for stmt in &mut block.stmts {
        match stmt {
            Stmt::Expr(expr) => mutate_expr(expr, f),
            Stmt::Assign { lhs, rhs, .. } => {
                for expr in lhs.iter_mut().chain(rhs.iter_mut()) {
                    mutate_expr(expr, f);
                }
            }
            Stmt::IncDec { target, .. } => mutate_expr(target, f),
            Stmt::Return { results } => {
                for expr in results {
                    mutate_expr(expr, f);
                }
            }
            Stmt::If { cond, then, els } => {
                mutate_expr(cond, f);
                mutate_block(then, f);
                if let Some(els) = els {
                    mutate_block(els, f);
                }
            }
            Stmt::For { cond, body } => {
                if let Some(cond) = cond {
                    mutate_expr(cond, f);
                }
                mutate_block(body, f);
            }
            Stmt::Block(inner) => mutate_block(inner, f),
        }
    }
}

/// Apply [`mutate_expr`] to every expression slot of a file: var initializer
/// values and function bodies
pub fn mutate_file(file: &mut File, f: &mut dyn FnMut(&mut Expr)) {
    for decl in &mut file.decls {
        match decl {
            Decl::Var(group) => {
                for spec in &mut group.specs {
                    for value in &mut spec.values {
                        mutate_expr(value, f);
                    }
                }
            }
            Decl::Func(func) => mutate_block(&mut func.body, f),
            Decl::Type(_) => {}
        }
    }
}

/// Read-only pre-order traversal of an expression tree
pub fn visit_expr(expr: &Expr, f: &mut dyn FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Ident(_) | Expr::Lit { .. } => {}
        Expr::Selector { base, .. } => visit_expr(base, f),
        Expr::Call { callee, args, .. } => {
            visit_expr(callee, f);
            for arg in args {
                visit_expr(arg, f);
            }
        }
        Expr::Unary { operand, .. } => visit_expr(operand, f),
        Expr::Binary { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        Expr::Index { base, index, .. } => {
            visit_expr(base, f);
            visit_expr(index, f);
        }
        Expr::Composite { elems, .. } => {
            for elem in elems {
                visit_expr(elem, f);
            }
        }
        Expr::FuncLit { body, .. } => visit_block(body, f),
        Expr::Paren { inner, .. } => visit_expr(inner, f),
    }
}

/// Read-only traversal over every expression slot of a block
pub fn visit_block(block: &Block, f: &mut dyn FnMut(&Expr)) {
    for stmt in &block.stmts {
        match stmt {
            Stmt::Expr(expr) => visit_expr(expr, f),
            Stmt::Assign { lhs, rhs, .. } => {
                for expr in lhs.iter().chain(rhs.iter()) {
                    visit_expr(expr, f);
                }
            }
            Stmt::IncDec { target, .. } => visit_expr(target, f),
            Stmt::Return { results } => {
                for expr in results {
                    visit_expr(expr, f);
                }
            }
            Stmt::If { cond, then, els } => {
                visit_expr(cond, f);
                visit_block(then, f);
                if let Some(els) = els {
                    visit_block(els, f);
                }
            }
            Stmt::For { cond, body } => {
                if let Some(cond) = cond {
                    visit_expr(cond, f);
                }
                visit_block(body, f);
            }
            Stmt::Block(inner) => visit_block(inner, f),
        }
    }
}
