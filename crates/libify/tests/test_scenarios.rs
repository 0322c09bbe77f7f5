//! End-to-end scenarios over the full pipeline
//!
//! Each test builds a small program the way the external checker and SSA
//! builder would present it, runs every pass, and checks the rewritten
//! sources plus the synthesized state file.

mod common;

use common::{Fixture, MAIN, PEER, ROOT, rendered, rendered_package, run_libify};
use libify::{
    cancel::CancelToken,
    error::Error,
    package::STATE_FILE,
    pipeline::{Libifier, Libify},
    pointer::TableSolver,
    snapshot::DefKind,
    ssa,
    syntax::{Decl, Expr, File, Param, Stmt, TypeDecl, VarGroup, VarSpec},
};

/// Trivial program: nothing is mutated, nothing is threaded, the state
/// record is empty
#[test]
fn scenario_trivial_noop() {
    let mut fx = Fixture::new();
    fx.add_package(MAIN, "main");
    fx.entry(MAIN);
    let def_main = fx.def(MAIN, "main", DefKind::Func);
    let def_foo = fx.def(MAIN, "Foo", DefKind::Func);

    let mut file = File::new("main");
    let main_decl = fx.func(MAIN, "main", def_main, None, vec![], vec![]);
    let foo_decl = fx.func(MAIN, "Foo", def_foo, None, vec![], vec![]);
    file.decls.push(main_decl);
    file.decls.push(foo_decl);
    fx.store.add_file(MAIN, "main.go", file);
    fx.ssa_fn(MAIN, "main", false, vec![]);
    fx.ssa_fn(MAIN, "Foo", false, vec![]);

    let (mut store, snapshot, program) = fx.finish();
    run_libify(&mut store, &snapshot, &program, vec![MAIN]).unwrap();

    assert_eq!(
        rendered(&store, MAIN, "main.go"),
        "package main\n\nfunc main() {}\n\nfunc Foo() {}\n"
    );
    assert_eq!(
        rendered(&store, MAIN, STATE_FILE),
        "package main\n\ntype PackageState struct{}\n\nfunc NewPackageState() *PackageState \
         {\n\tpstate := &PackageState{}\n\treturn pstate\n}\n"
    );
}

/// A mutated variable threads the function that writes it; the untouched
/// entry point stays as it was
#[test]
fn scenario_mutated_variable() {
    let mut fx = Fixture::new();
    fx.add_package(MAIN, "main");
    fx.entry(MAIN);
    let def_i = fx.def(MAIN, "i", DefKind::Var);
    let def_main = fx.def(MAIN, "main", DefKind::Func);
    let def_a = fx.def(MAIN, "a", DefKind::Func);

    let mut file = File::new("main");
    let main_decl = fx.func(MAIN, "main", def_main, None, vec![], vec![]);
    file.decls.push(main_decl);

    // func a() { i = 1 }
    let i_use = fx.use_ident(MAIN, "i", def_i);
    let one = fx.lit_int("1");
    let a_decl = fx.func(
        MAIN,
        "a",
        def_a,
        None,
        vec![],
        vec![Stmt::Assign {
            lhs: vec![Expr::Ident(i_use)],
            op: libify::syntax::AssignOp::Assign,
            rhs: vec![one],
        }],
    );
    file.decls.push(a_decl);

    // var i int
    let i_decl = fx.def_ident(MAIN, "i", def_i);
    let int_ty = fx.name_type("int");
    file.decls.push(Decl::Var(VarGroup {
        id: fx.store.fresh(),
        specs: vec![VarSpec {
            names: vec![i_decl],
            ty: Some(int_ty),
            values: vec![],
        }],
    }));
    fx.store.add_file(MAIN, "main.go", file);

    fx.ssa_fn(MAIN, "main", false, vec![]);
    fx.store_to(MAIN, "a", def_i);

    let (mut store, snapshot, program) = fx.finish();
    run_libify(&mut store, &snapshot, &program, vec![MAIN]).unwrap();

    let main_src = rendered(&store, MAIN, "main.go");
    assert!(main_src.contains("func main() {}"));
    assert!(main_src.contains("func (pstate *PackageState) a() {\n\tpstate.i = 1\n}"));
    assert!(!main_src.contains("var i"));

    let state = rendered(&store, MAIN, STATE_FILE);
    assert!(state.contains("\ti int\n"));
    // no initializer, so the constructor leaves i at its zero value
    assert!(!state.contains("pstate.i ="));
}

/// Initializers keep their dependency order, restricted to hoisted names,
/// and references inside them reach through the state
#[test]
fn scenario_init_order_dependency() {
    let mut fx = Fixture::new();
    fx.add_package(MAIN, "main");
    fx.entry(MAIN);
    let def_a = fx.def(MAIN, "a", DefKind::Var);
    let def_b = fx.def(MAIN, "b", DefKind::Var);
    let def_main = fx.def(MAIN, "main", DefKind::Func);
    let def_f1 = fx.def(MAIN, "f1", DefKind::Func);

    let mut file = File::new("main");
    let main_decl = fx.func(MAIN, "main", def_main, None, vec![], vec![]);
    file.decls.push(main_decl);

    // var a = b
    let b_ref = Expr::Ident(fx.use_ident(MAIN, "b", def_b));
    let a_decl = fx.def_ident(MAIN, "a", def_a);
    file.decls.push(Decl::Var(VarGroup {
        id: fx.store.fresh(),
        specs: vec![VarSpec {
            names: vec![a_decl],
            ty: None,
            values: vec![b_ref.clone()],
        }],
    }));

    // var b = 1
    let one = fx.lit_int("1");
    let b_decl = fx.def_ident(MAIN, "b", def_b);
    file.decls.push(Decl::Var(VarGroup {
        id: fx.store.fresh(),
        specs: vec![VarSpec {
            names: vec![b_decl],
            ty: None,
            values: vec![one.clone()],
        }],
    }));

    // func f1() { a, b = 1, 2 }
    let a_use = fx.use_ident(MAIN, "a", def_a);
    let b_use = fx.use_ident(MAIN, "b", def_b);
    let lit_one = fx.lit_int("1");
    let lit_two = fx.lit_int("2");
    let f1_decl = fx.func(
        MAIN,
        "f1",
        def_f1,
        None,
        vec![],
        vec![Stmt::Assign {
            lhs: vec![Expr::Ident(a_use), Expr::Ident(b_use)],
            op: libify::syntax::AssignOp::Assign,
            rhs: vec![lit_one, lit_two],
        }],
    );
    file.decls.push(f1_decl);
    fx.store.add_file(MAIN, "main.go", file);

    // the checker reports init order with b before a
    fx.init(MAIN, vec![def_b], one);
    fx.init(MAIN, vec![def_a], b_ref);

    let ga = fx.global(def_a);
    let gb = fx.global(def_b);
    let v1 = fx.opaque();
    let v2 = fx.opaque();
    fx.ssa_fn(MAIN, "main", false, vec![]);
    fx.ssa_fn(
        MAIN,
        "f1",
        false,
        vec![
            ssa::Instr::Store { addr: ga, value: v1 },
            ssa::Instr::Store { addr: gb, value: v2 },
        ],
    );

    let (mut store, snapshot, program) = fx.finish();
    run_libify(&mut store, &snapshot, &program, vec![MAIN]).unwrap();

    let main_src = rendered(&store, MAIN, "main.go");
    assert!(main_src.contains("pstate.a, pstate.b = 1, 2"));
    assert!(!main_src.contains("var a"));
    assert!(!main_src.contains("var b"));

    let state = rendered(&store, MAIN, STATE_FILE);
    assert!(state.contains("\ta int\n"));
    assert!(state.contains("\tb int\n"));
    let b_init = state.find("pstate.b = 1").expect("b initializer");
    let a_init = state.find("pstate.a = pstate.b").expect("a initializer");
    let ret = state.find("return pstate").expect("return");
    assert!(b_init < a_init && a_init < ret);
}

/// A method that reads a hoisted variable gains a prepended state
/// parameter rather than a second receiver
#[test]
fn scenario_method_requires_state() {
    let mut fx = Fixture::new();
    fx.add_package(MAIN, "main");
    fx.entry(MAIN);
    let def_v = fx.def(MAIN, "v", DefKind::Var);
    let def_main = fx.def(MAIN, "main", DefKind::Func);
    let def_m = fx.def(MAIN, "m", DefKind::Method);
    let def_f = fx.def(MAIN, "f", DefKind::Func);

    let mut file = File::new("main");
    let main_decl = fx.func(MAIN, "main", def_main, None, vec![], vec![]);
    file.decls.push(main_decl);

    // type T string
    let t_name = fx.plain_ident("T");
    let string_ty = fx.name_type("string");
    file.decls.push(Decl::Type(TypeDecl {
        id: fx.store.fresh(),
        name: t_name,
        ty: string_ty,
    }));

    // func (T) m() int { return v }
    let recv_ty = fx.name_type("T");
    let int_ty = fx.name_type("int");
    let v_use = fx.use_ident(MAIN, "v", def_v);
    let m_decl = fx.func(
        MAIN,
        "m",
        def_m,
        Some(Param {
            name: None,
            ty: recv_ty,
        }),
        vec![Param {
            name: None,
            ty: int_ty,
        }],
        vec![Stmt::Return {
            results: vec![Expr::Ident(v_use)],
        }],
    );
    file.decls.push(m_decl);

    // var v int
    let v_decl = fx.def_ident(MAIN, "v", def_v);
    let int_ty = fx.name_type("int");
    file.decls.push(Decl::Var(VarGroup {
        id: fx.store.fresh(),
        specs: vec![VarSpec {
            names: vec![v_decl],
            ty: Some(int_ty),
            values: vec![],
        }],
    }));

    // func f() { v = 1 }
    let v_write = fx.use_ident(MAIN, "v", def_v);
    let one = fx.lit_int("1");
    let f_decl = fx.func(
        MAIN,
        "f",
        def_f,
        None,
        vec![],
        vec![Stmt::Assign {
            lhs: vec![Expr::Ident(v_write)],
            op: libify::syntax::AssignOp::Assign,
            rhs: vec![one],
        }],
    );
    file.decls.push(f_decl);
    fx.store.add_file(MAIN, "main.go", file);

    fx.ssa_fn(MAIN, "main", false, vec![]);
    fx.ssa_fn(MAIN, "m", true, vec![]);
    fx.store_to(MAIN, "f", def_v);

    let (mut store, snapshot, program) = fx.finish();
    run_libify(&mut store, &snapshot, &program, vec![MAIN]).unwrap();

    let main_src = rendered(&store, MAIN, "main.go");
    assert!(main_src.contains("type T string"));
    assert!(main_src.contains("func (T) m(pstate *PackageState) int {\n\treturn pstate.v\n}"));
    assert!(main_src.contains("func (pstate *PackageState) f() {\n\tpstate.v = 1\n}"));

    let state = rendered(&store, MAIN, STATE_FILE);
    assert!(state.contains("\tv int\n"));
}

/// Two packages: the peer's state is a field of the importer's state, and
/// cross-package calls reach through it
#[test]
fn scenario_two_package_threading() {
    let mut fx = Fixture::new();
    fx.add_package(MAIN, "main");
    fx.add_package(PEER, "b");
    fx.entry(MAIN);
    fx.import(MAIN, PEER, "b");

    let def_peer_a = fx.def(PEER, "a", DefKind::Var);
    let def_big_b = fx.def(PEER, "B", DefKind::Func);
    let def_main = fx.def(MAIN, "main", DefKind::Func);
    let def_main_a = fx.def(MAIN, "a", DefKind::Func);

    // package b: func B() { a++ }; var a = 1
    let mut peer_file = File::new("b");
    let a_use = fx.use_ident(PEER, "a", def_peer_a);
    let b_decl = fx.func(
        PEER,
        "B",
        def_big_b,
        None,
        vec![],
        vec![Stmt::IncDec {
            target: Expr::Ident(a_use),
            negative: false,
        }],
    );
    peer_file.decls.push(b_decl);
    let one = fx.lit_int("1");
    let a_decl = fx.def_ident(PEER, "a", def_peer_a);
    peer_file.decls.push(Decl::Var(VarGroup {
        id: fx.store.fresh(),
        specs: vec![VarSpec {
            names: vec![a_decl],
            ty: None,
            values: vec![one.clone()],
        }],
    }));
    fx.store.add_file(PEER, "b.go", peer_file);
    fx.init(PEER, vec![def_peer_a], one);

    // package main: func main() {}; func a() { b.B() }
    let mut main_file = File::new("main");
    main_file.ensure_import(fx.store.fresh(), PEER);
    let main_decl = fx.func(MAIN, "main", def_main, None, vec![], vec![]);
    main_file.decls.push(main_decl);
    let mut big_b_use = fx.use_ident(MAIN, "B", def_big_b);
    big_b_use.origin = Some(PEER.to_string());
    let call = fx.call(Expr::Ident(big_b_use), vec![]);
    let main_a_decl = fx.func(
        MAIN,
        "a",
        def_main_a,
        None,
        vec![],
        vec![Stmt::Expr(call)],
    );
    main_file.decls.push(main_a_decl);
    fx.store.add_file(MAIN, "main.go", main_file);

    fx.ssa_fn(MAIN, "main", false, vec![]);
    fx.store_to(PEER, "B", def_peer_a);

    let (mut store, snapshot, program) = fx.finish();
    run_libify(&mut store, &snapshot, &program, vec![MAIN]).unwrap();

    let peer_src = rendered(&store, PEER, "b.go");
    assert!(peer_src.contains("func (pstate *PackageState) B() {\n\tpstate.a++\n}"));
    assert!(!peer_src.contains("var a"));

    let peer_state = rendered(&store, PEER, STATE_FILE);
    assert!(peer_state.contains("\ta int\n"));
    assert!(peer_state.contains("pstate.a = 1"));
    assert!(peer_state.contains("func NewPackageState() *PackageState {"));

    let main_src = rendered(&store, MAIN, "main.go");
    assert!(main_src.contains("func (pstate *PackageState) a() {\n\tpstate.b.B()\n}"));

    let main_state = rendered(&store, MAIN, STATE_FILE);
    assert!(main_state.contains("\tb *b.PackageState\n"));
    assert!(
        main_state.contains("func NewPackageState(b_pstate *b.PackageState) *PackageState {")
    );
    assert!(main_state.contains("pstate.b = b_pstate"));
}

/// Under the mutated-only policy an unwritten variable keeps its top-level
/// declaration and the state stays empty
#[test]
fn scenario_unused_variable_preserved() {
    let mut fx = Fixture::new();
    fx.add_package(MAIN, "main");
    fx.entry(MAIN);
    let def_i = fx.def(MAIN, "i", DefKind::Var);
    let def_main = fx.def(MAIN, "main", DefKind::Func);

    let mut file = File::new("main");
    let main_decl = fx.func(MAIN, "main", def_main, None, vec![], vec![]);
    file.decls.push(main_decl);
    let i_decl = fx.def_ident(MAIN, "i", def_i);
    let int_ty = fx.name_type("int");
    file.decls.push(Decl::Var(VarGroup {
        id: fx.store.fresh(),
        specs: vec![VarSpec {
            names: vec![i_decl],
            ty: Some(int_ty),
            values: vec![],
        }],
    }));
    fx.store.add_file(MAIN, "main.go", file);
    fx.ssa_fn(MAIN, "main", false, vec![]);

    let (mut store, snapshot, program) = fx.finish();
    run_libify(&mut store, &snapshot, &program, vec![MAIN]).unwrap();

    let main_src = rendered(&store, MAIN, "main.go");
    assert!(main_src.contains("var i int"));

    let state = rendered(&store, MAIN, STATE_FILE);
    assert!(state.contains("type PackageState struct{}"));
}

/// A second run over the transformation's own output is a no-op: no
/// hoisted variables remain to discover
#[test]
fn rerun_is_a_noop() {
    let mut fx = Fixture::new();
    fx.add_package(MAIN, "main");
    fx.entry(MAIN);
    let def_i = fx.def(MAIN, "i", DefKind::Var);
    let def_main = fx.def(MAIN, "main", DefKind::Func);
    let def_a = fx.def(MAIN, "a", DefKind::Func);

    let mut file = File::new("main");
    let main_decl = fx.func(MAIN, "main", def_main, None, vec![], vec![]);
    file.decls.push(main_decl);
    let i_use = fx.use_ident(MAIN, "i", def_i);
    let one = fx.lit_int("1");
    let a_decl = fx.func(
        MAIN,
        "a",
        def_a,
        None,
        vec![],
        vec![Stmt::Assign {
            lhs: vec![Expr::Ident(i_use)],
            op: libify::syntax::AssignOp::Assign,
            rhs: vec![one],
        }],
    );
    file.decls.push(a_decl);
    let i_decl = fx.def_ident(MAIN, "i", def_i);
    let int_ty = fx.name_type("int");
    file.decls.push(Decl::Var(VarGroup {
        id: fx.store.fresh(),
        specs: vec![VarSpec {
            names: vec![i_decl],
            ty: Some(int_ty),
            values: vec![],
        }],
    }));
    fx.store.add_file(MAIN, "main.go", file);
    fx.ssa_fn(MAIN, "main", false, vec![]);
    fx.store_to(MAIN, "a", def_i);

    let (mut store, snapshot, program) = fx.finish();
    run_libify(&mut store, &snapshot, &program, vec![MAIN]).unwrap();
    let first = rendered_package(&store, MAIN);

    run_libify(&mut store, &snapshot, &program, vec![MAIN]).unwrap();
    let second = rendered_package(&store, MAIN);

    assert_eq!(first, second);
    // still exactly one state record
    let state_files = second
        .iter()
        .filter(|(_, src)| src.contains("type PackageState struct"))
        .count();
    assert_eq!(state_files, 1);
}

/// Cancellation observed between passes aborts with no partial effects on
/// the destination
#[test]
fn cancellation_aborts_the_run() {
    let mut fx = Fixture::new();
    fx.add_package(MAIN, "main");
    fx.entry(MAIN);
    let def_main = fx.def(MAIN, "main", DefKind::Func);
    let mut file = File::new("main");
    let main_decl = fx.func(MAIN, "main", def_main, None, vec![], vec![]);
    file.decls.push(main_decl);
    fx.store.add_file(MAIN, "main.go", file);
    fx.ssa_fn(MAIN, "main", false, vec![]);

    let (mut store, snapshot, program) = fx.finish();
    let token = CancelToken::new();
    token.cancel();

    let solver = TableSolver::new();
    let mut libifier = Libifier::new(
        Libify {
            packages: vec![MAIN.to_string()],
            root: ROOT.to_string(),
        },
        &snapshot,
        &program,
        &solver,
        token,
    );
    assert!(matches!(libifier.run(&mut store), Err(Error::Cancelled)));
    assert!(store.file(MAIN, STATE_FILE).is_none());
}

/// Requesting a package outside the checked program is rejected up front
#[test]
fn unknown_package_is_invalid() {
    let fx = Fixture::new();
    let (mut store, snapshot, program) = fx.finish();
    let result = run_libify(
        &mut store,
        &snapshot,
        &program,
        vec!["example.com/app/ghost"],
    );
    assert!(matches!(result, Err(Error::InvalidProgram(_))));
}
