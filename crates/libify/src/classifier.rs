//! Classifier: hoisted vs kept variables, threaded vs pure functions
//!
//! A variable is hoisted when it is package-level *and* the oracle says it
//! may be written. A function is threaded when a depth-first walk over its
//! direct and transitive callees reaches a hoisted variable. Because every
//! function runs its own walk, every transitive caller of a threaded
//! function comes out threaded as well; the closure is computed, not
//! assumed.

use log::debug;
use rustc_hash::FxHashSet;

use crate::{
    error::{Result, inconsistent},
    mutation_oracle::MutationOracle,
    snapshot::{DefKind, ProgramSnapshot},
    types::{DefId, FxIndexSet},
    use_graph::UseGraph,
};

/// Output of classification, consumed by the rewriter and the emitter
#[derive(Debug, Default)]
pub struct Classification {
    hoisted: FxHashSet<DefId>,
    /// Free functions that receive the state as a receiver
    threaded_funcs: FxIndexSet<DefId>,
    /// Methods that receive the state as a prepended parameter
    threaded_methods: FxIndexSet<DefId>,
}

impl Classification {
    pub fn hoist_var(&self, def: DefId) -> bool {
        self.hoisted.contains(&def)
    }

    pub fn is_threaded_func(&self, def: DefId) -> bool {
        self.threaded_funcs.contains(&def)
    }

    pub fn is_threaded_method(&self, def: DefId) -> bool {
        self.threaded_methods.contains(&def)
    }

    /// Threaded in either syntactic form
    pub fn thread_fn(&self, def: DefId) -> bool {
        self.is_threaded_func(def) || self.is_threaded_method(def)
    }

    pub fn hoisted(&self) -> &FxHashSet<DefId> {
        &self.hoisted
    }

    pub fn threaded_funcs(&self) -> &FxIndexSet<DefId> {
        &self.threaded_funcs
    }

    pub fn threaded_methods(&self) -> &FxIndexSet<DefId> {
        &self.threaded_methods
    }
}

/// Classify every variable and function of the program
pub fn classify(
    graph: &UseGraph,
    oracle: &MutationOracle,
    snapshot: &ProgramSnapshot,
) -> Result<Classification> {
    let mut classification = Classification::default();

    // mutated-only policy: an unwritten global stays where it is
    classification.hoisted = graph
        .var_objects()
        .iter()
        .copied()
        .filter(|&def| oracle.may_mutate(def))
        .collect();

    for &fn_def in graph.functions() {
        if !reaches_hoisted_var(graph, &classification.hoisted, fn_def) {
            continue;
        }
        let info = snapshot
            .def(fn_def)
            .ok_or_else(|| inconsistent(format!("function {fn_def:?} missing from snapshot")))?;
        match info.kind {
            DefKind::Method => {
                classification.threaded_methods.insert(fn_def);
            }
            _ => {
                classification.threaded_funcs.insert(fn_def);
            }
        }
    }

    debug!(
        "classified: {} hoisted vars, {} threaded funcs, {} threaded methods",
        classification.hoisted.len(),
        classification.threaded_funcs.len(),
        classification.threaded_methods.len()
    );
    Ok(classification)
}

/// Close the hoisted set over multi-value tuple rows.
///
/// `var a, b = f()` cannot be split: when any of its names is hoisted the
/// whole row moves into the state record, so every non-blank name of the row
/// must be hoisted with it; fields, constructor assignments, and reference
/// rewrites all follow the same set.
pub fn close_tuple_groups(
    classification: &mut Classification,
    store: &crate::ast_store::AstStore,
    snapshot: &ProgramSnapshot,
) -> Result<()> {
    use crate::syntax::Decl;

    for pkg in snapshot.packages() {
        for (_, file) in store.package_files(&pkg.path) {
            for decl in &file.decls {
                let Decl::Var(group) = decl else { continue };
                for spec in &group.specs {
                    if !spec.is_tuple_group() {
                        continue;
                    }
                    let defs: Vec<_> = spec
                        .names
                        .iter()
                        .filter(|name| !name.is_blank())
                        .filter_map(|name| {
                            store.typed_of(name.id).and_then(|typed| pkg.def_at(typed))
                        })
                        .collect();
                    if defs.iter().any(|def| classification.hoisted.contains(def)) {
                        classification.hoisted.extend(defs);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Depth-first reachability from `start` through the call edges to any use
/// of a hoisted variable
fn reaches_hoisted_var(graph: &UseGraph, hoisted: &FxHashSet<DefId>, start: DefId) -> bool {
    let mut done: FxHashSet<DefId> = FxHashSet::default();
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        if !done.insert(current) {
            continue;
        }
        if let Some(vars) = graph.var_uses(current)
            && vars.iter().any(|used| hoisted.contains(used))
        {
            return true;
        }
        if let Some(callees) = graph.func_uses(current) {
            stack.extend(callees.iter().copied());
        }
    }
    false
}
