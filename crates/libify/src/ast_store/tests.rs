//! Tests for the decorated↔typed node tables

use super::*;
use crate::types::TypedNodeId;

#[test]
fn decorate_round_trips() {
    let mut store = AstStore::new();
    let typed = TypedNodeId::new(7);

    let node = store.decorate(typed);
    assert_eq!(store.undecorate(node), Some(typed));
    assert_eq!(store.deco_of(typed), Some(node));
}

#[test]
fn rebind_evicts_stale_entries() {
    let mut store = AstStore::new();
    let t1 = TypedNodeId::new(1);
    let t2 = TypedNodeId::new(2);

    let node = store.decorate(t1);
    store.bind(node, t2);

    assert_eq!(store.typed_of(node), Some(t2));
    assert_eq!(store.deco_of(t2), Some(node));
    // the stale reverse entry must be gone
    assert_eq!(store.deco_of(t1), None);
}

#[test]
fn emit_file_attaches_synthesized_files() {
    let mut store = AstStore::new();
    store.add_file("example.com/app", "app.go", File::new("app"));

    assert!(
        store
            .emit_file("example.com/app", "package-state.go", File::new("app"))
            .is_ok()
    );
    assert!(store.file("example.com/app", "package-state.go").is_some());
}

// invariant violations panic under debug_assertions, surface as errors in
// release; the test only runs where the panic is guaranteed
#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "inconsistent pipeline state")]
fn emit_file_refuses_collisions() {
    let mut store = AstStore::new();
    store.add_file("example.com/app", "app.go", File::new("app"));

    store
        .emit_file("example.com/app", "package-state.go", File::new("app"))
        .unwrap();
    let _ = store.emit_file("example.com/app", "package-state.go", File::new("app"));
}

#[test]
fn fresh_ids_are_distinct() {
    let mut store = AstStore::new();
    let a = store.fresh();
    let b = store.fresh();
    assert_ne!(a, b);
}
