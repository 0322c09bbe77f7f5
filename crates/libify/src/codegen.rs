//! Deterministic rendering of decorated files back to source text
//!
//! One canonical layout, gofmt-like: tabs for indentation, nothing
//! re-sorted. The trees are emitted exactly as they stand, so kept declarations render
//! byte-equivalent to their parsed form. Package-qualified identifiers
//! resolve their spelling through the containing file's import table.

use rustc_hash::FxHashMap;

use crate::syntax::{
    AssignOp, BinaryOp, Block, ChanDir, Decl, Expr, FieldDecl, File, FuncDecl, Ident,
    InterfaceMember, Lit, Param, Stmt, TypeExpr, UnaryOp, VarGroup, VarSpec,
};

/// Render a whole file
pub fn render_file(file: &File) -> String {
    let mut printer = Printer::new(file);
    printer.file(file);
    printer.out
}

/// Render a lone type expression in the context of `file`'s imports
pub fn render_type_expr(ty: &TypeExpr, file: &File) -> String {
    let mut printer = Printer::new(file);
    printer.type_expr(ty);
    printer.out
}

/// Render a lone expression in the context of `file`'s imports
pub fn render_expr(expr: &Expr, file: &File) -> String {
    let mut printer = Printer::new(file);
    printer.expr(expr);
    printer.out
}

struct Printer<'a> {
    out: String,
    indent: usize,
    /// import path -> file-scope name
    aliases: FxHashMap<&'a str, &'a str>,
}

impl<'a> Printer<'a> {
    fn new(file: &'a File) -> Self {
        let aliases = file
            .imports
            .iter()
            .map(|imp| (imp.path.as_str(), imp.effective_name()))
            .collect();
        Self {
            out: String::new(),
            indent: 0,
            aliases,
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
    }

    fn tabs(&mut self) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }

    fn file(&mut self, file: &File) {
        for tag in &file.build_tags {
            self.push(tag);
            self.newline();
        }
        if !file.build_tags.is_empty() {
            self.newline();
        }

        self.push("package ");
        self.push(&file.package_name);
        self.newline();

        if !file.imports.is_empty() {
            self.newline();
            if let [only] = file.imports.as_slice() {
                self.push("import ");
                if let Some(alias) = &only.alias {
                    self.push(alias);
                    self.push(" ");
                }
                self.push(&format!("{:?}", only.path));
            } else {
                self.push("import (");
                self.newline();
                for imp in &file.imports {
                    self.push("\t");
                    if let Some(alias) = &imp.alias {
                        self.push(alias);
                        self.push(" ");
                    }
                    self.push(&format!("{:?}", imp.path));
                    self.newline();
                }
                self.push(")");
            }
            self.newline();
        }

        for decl in &file.decls {
            self.newline();
            self.decl(decl);
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Var(group) => self.var_group(group),
            Decl::Type(ty) => {
                self.push("type ");
                self.push(&ty.name.name);
                self.push(" ");
                self.type_expr(&ty.ty);
                self.newline();
            }
            Decl::Func(func) => self.func_decl(func),
        }
    }

    fn var_group(&mut self, group: &VarGroup) {
        if let [spec] = group.specs.as_slice() {
            self.push("var ");
            self.var_spec_body(spec);
            self.newline();
            return;
        }
        self.push("var (");
        self.newline();
        for spec in &group.specs {
            self.tabs();
            self.push("\t");
            self.var_spec_body(spec);
            self.newline();
        }
        self.push(")");
        self.newline();
    }

    fn var_spec_body(&mut self, spec: &VarSpec) {
        let names: Vec<&str> = spec.names.iter().map(|n| n.name.as_str()).collect();
        self.push(&names.join(", "));
        if let Some(ty) = &spec.ty {
            self.push(" ");
            self.type_expr(ty);
        }
        if !spec.values.is_empty() {
            self.push(" = ");
            for (i, value) in spec.values.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(value);
            }
        }
    }

    fn func_decl(&mut self, func: &FuncDecl) {
        self.push("func ");
        if let Some(recv) = &func.recv {
            self.push("(");
            self.param(recv);
            self.push(") ");
        }
        self.push(&func.name.name);
        self.signature(&func.params, &func.results);
        self.push(" ");
        self.block(&func.body);
        self.newline();
    }

    fn signature(&mut self, params: &[Param], results: &[Param]) {
        self.push("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.param(param);
        }
        self.push(")");
        match results {
            [] => {}
            [only] if only.name.is_none() => {
                self.push(" ");
                self.type_expr(&only.ty);
            }
            _ => {
                self.push(" (");
                for (i, result) in results.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.param(result);
                }
                self.push(")");
            }
        }
    }

    fn param(&mut self, param: &Param) {
        if let Some(name) = &param.name {
            self.push(&name.name);
            self.push(" ");
        }
        self.type_expr(&param.ty);
    }

    fn block(&mut self, block: &Block) {
        if block.stmts.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.newline();
        self.indent += 1;
        for stmt in &block.stmts {
            self.tabs();
            self.stmt(stmt);
            self.newline();
        }
        self.indent -= 1;
        self.tabs();
        self.push("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::Assign { lhs, op, rhs } => {
                for (i, expr) in lhs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(expr);
                }
                self.push(match op {
                    AssignOp::Assign => " = ",
                    AssignOp::Define => " := ",
                });
                for (i, expr) in rhs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(expr);
                }
            }
            Stmt::IncDec { target, negative } => {
                self.expr(target);
                self.push(if *negative { "--" } else { "++" });
            }
            Stmt::Return { results } => {
                self.push("return");
                for (i, expr) in results.iter().enumerate() {
                    self.push(if i == 0 { " " } else { ", " });
                    self.expr(expr);
                }
            }
            Stmt::If { cond, then, els } => {
                self.push("if ");
                self.expr(cond);
                self.push(" ");
                self.block(then);
                if let Some(els) = els {
                    self.push(" else ");
                    self.block(els);
                }
            }
            Stmt::For { cond, body } => {
                self.push("for ");
                if let Some(cond) = cond {
                    self.expr(cond);
                    self.push(" ");
                }
                self.block(body);
            }
            Stmt::Block(inner) => self.block(inner),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.ident(ident),
            Expr::Selector { base, field, .. } => {
                self.expr(base);
                self.push(".");
                self.push(&field.name);
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee);
                self.push("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(arg);
                }
                self.push(")");
            }
            Expr::Unary { op, operand, .. } => {
                self.push(match op {
                    UnaryOp::Addr => "&",
                    UnaryOp::Deref => "*",
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                });
                self.expr(operand);
            }
            Expr::Binary { op, left, right, .. } => {
                self.expr(left);
                self.push(match op {
                    BinaryOp::Add => " + ",
                    BinaryOp::Sub => " - ",
                    BinaryOp::Mul => " * ",
                    BinaryOp::Div => " / ",
                    BinaryOp::Eq => " == ",
                    BinaryOp::NotEq => " != ",
                    BinaryOp::Less => " < ",
                    BinaryOp::Greater => " > ",
                    BinaryOp::And => " && ",
                    BinaryOp::Or => " || ",
                });
                self.expr(right);
            }
            Expr::Index { base, index, .. } => {
                self.expr(base);
                self.push("[");
                self.expr(index);
                self.push("]");
            }
            Expr::Composite { ty, elems, .. } => {
                self.type_expr(ty);
                self.push("{");
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(elem);
                }
                self.push("}");
            }
            Expr::FuncLit {
                params,
                results,
                body,
                ..
            } => {
                self.push("func");
                self.signature(params, results);
                self.push(" ");
                self.block(body);
            }
            Expr::Lit { lit, .. } => self.lit(lit),
            Expr::Paren { inner, .. } => {
                self.push("(");
                self.expr(inner);
                self.push(")");
            }
        }
    }

    fn ident(&mut self, ident: &Ident) {
        if let Some(origin) = &ident.origin {
            let name = self
                .aliases
                .get(origin.as_str())
                .copied()
                .unwrap_or_else(|| origin.rsplit('/').next().unwrap_or(origin));
            self.push(name);
            self.push(".");
        }
        self.push(&ident.name);
    }

    fn lit(&mut self, lit: &Lit) {
        match lit {
            Lit::Int(v) | Lit::Float(v) => self.push(v),
            Lit::Str(v) => self.push(&format!("{v:?}")),
            Lit::Rune(v) => self.push(&format!("'{v}'")),
            Lit::Bool(v) => self.push(if *v { "true" } else { "false" }),
            Lit::Nil => self.push("nil"),
        }
    }

    fn type_expr(&mut self, ty: &TypeExpr) {
        match ty {
            TypeExpr::Name(ident) => self.ident(ident),
            TypeExpr::Pointer(elem) => {
                self.push("*");
                self.type_expr(elem);
            }
            TypeExpr::Slice(elem) => {
                self.push("[]");
                self.type_expr(elem);
            }
            TypeExpr::Array { len, elem } => {
                self.push("[");
                self.push(len);
                self.push("]");
                self.type_expr(elem);
            }
            TypeExpr::Map { key, value } => {
                self.push("map[");
                self.type_expr(key);
                self.push("]");
                self.type_expr(value);
            }
            TypeExpr::Chan { dir, elem } => {
                match dir {
                    ChanDir::Both => self.push("chan "),
                    ChanDir::Send => self.push("chan<- "),
                    ChanDir::Recv => self.push("<-chan "),
                }
                self.type_expr(elem);
            }
            TypeExpr::Func { params, results } => {
                self.push("func");
                self.signature(params, results);
            }
            TypeExpr::Struct { fields } => {
                if fields.is_empty() {
                    self.push("struct{}");
                    return;
                }
                self.push("struct {");
                self.newline();
                self.indent += 1;
                for field in fields {
                    self.tabs();
                    self.field_decl(field);
                    self.newline();
                }
                self.indent -= 1;
                self.tabs();
                self.push("}");
            }
            TypeExpr::Interface { members } => {
                if members.is_empty() {
                    self.push("interface{}");
                    return;
                }
                self.push("interface {");
                self.newline();
                self.indent += 1;
                for member in members {
                    self.tabs();
                    match member {
                        InterfaceMember::Embedded(ty) => self.type_expr(ty),
                        InterfaceMember::Method {
                            name,
                            params,
                            results,
                        } => {
                            self.push(&name.name);
                            self.signature(params, results);
                        }
                    }
                    self.newline();
                }
                self.indent -= 1;
                self.tabs();
                self.push("}");
            }
        }
    }

    fn field_decl(&mut self, field: &FieldDecl) {
        let names: Vec<&str> = field.names.iter().map(|n| n.name.as_str()).collect();
        if !names.is_empty() {
            self.push(&names.join(", "));
            self.push(" ");
        }
        self.type_expr(&field.ty);
    }
}
