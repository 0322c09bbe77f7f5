//! MutationOracle: decides which package-level variables may be written
//!
//! The oracle walks every SSA function collecting store and map-update
//! targets. A target that lifts syntactically to a global (through deref,
//! field-address and index-address chains) is marked immediately; anything
//! else becomes a query for the whole-program pointer analysis. Each
//! resulting points-to label is then chased forward through its referrers
//! (allocation sites, map constructions, index/slice derivations) until a
//! store or map update lands in a global, which is then marked.
//!
//! Free functions named `init` are the synthesized package initializers;
//! counting their stores would report every initialized variable as mutated,
//! so they are skipped. Methods literally named `init` are ordinary code and
//! are included.

use log::{debug, trace};
use rustc_hash::FxHashSet;

use crate::{
    error::{Result, inconsistent},
    pointer::{AnalysisConfig, PointsToSolver},
    snapshot::ProgramSnapshot,
    ssa::{Instr, Program, Referrer, Value},
    types::{DefId, ValueId},
};

/// Immutable set of definitions that may be written during execution
#[derive(Debug)]
pub struct MutationOracle {
    mutated: FxHashSet<DefId>,
}

impl MutationOracle {
    /// Run the analysis over the whole SSA program
    pub fn analyze(
        program: &Program,
        snapshot: &ProgramSnapshot,
        solver: &dyn PointsToSolver,
    ) -> Result<Self> {
        let mut modified: Vec<DefId> = Vec::new();
        let mut queries: Vec<ValueId> = Vec::new();

        for function in program.functions() {
            if function.name == "init" && !function.is_method {
                continue;
            }
            for block in function.blocks.iter().chain(function.recover.iter()) {
                for instr in &block.instrs {
                    match *instr {
                        Instr::Store { addr, .. } => {
                            lift_target(program, addr, &mut modified, &mut queries);
                        }
                        Instr::MapUpdate { map, .. } => {
                            lift_target(program, map, &mut modified, &mut queries);
                        }
                        Instr::Call | Instr::Return | Instr::Other => {}
                    }
                }
            }
        }

        debug!(
            "mutation oracle: {} direct targets, {} pointer queries",
            modified.len(),
            queries.len()
        );

        let config = AnalysisConfig::whole_program(snapshot.entry_packages().to_vec());
        let result = solver.analyze(program, &config, &queries)?;

        let mut seen: FxHashSet<ValueId> = FxHashSet::default();
        for &query in &queries {
            for label in result.labels(query) {
                chase_value(program, label.value, &mut modified, &mut seen);
            }
        }

        // attribute the marks, dropping globals of out-of-scope packages
        let mut mutated = FxHashSet::default();
        for def in modified {
            let info = snapshot
                .def(def)
                .ok_or_else(|| inconsistent(format!("marked def {def:?} missing from snapshot")))?;
            if snapshot.package(&info.package).is_some() {
                trace!("may mutate: {}.{}", info.package, info.name);
                mutated.insert(def);
            }
        }

        Ok(Self { mutated })
    }

    pub fn may_mutate(&self, def: DefId) -> bool {
        self.mutated.contains(&def)
    }

    // precomputed result, for other modules' unit tests
    #[cfg(test)]
    pub(crate) fn from_set(mutated: FxHashSet<DefId>) -> Self {
        Self { mutated }
    }

    pub fn mutated(&self) -> &FxHashSet<DefId> {
        &self.mutated
    }
}

/// Lift a store target through its address chain: a direct global is marked,
/// an opaque target becomes a pointer-analysis query
fn lift_target(
    program: &Program,
    target: ValueId,
    modified: &mut Vec<DefId>,
    queries: &mut Vec<ValueId>,
) {
    match program.value(target) {
        Some(Value::Global { def }) => modified.push(def),
        Some(Value::Deref { operand })
        | Some(Value::IndexAddr { operand })
        | Some(Value::FieldAddr { operand }) => {
            lift_target(program, operand, modified, queries);
        }
        _ => queries.push(target),
    }
}

/// Follow a points-to label's underlying value until a global is reached
fn chase_value(
    program: &Program,
    value: ValueId,
    modified: &mut Vec<DefId>,
    seen: &mut FxHashSet<ValueId>,
) {
    if !seen.insert(value) {
        return;
    }
    match program.value(value) {
        Some(Value::Global { def }) => modified.push(def),
        // a construction site links to its global through the store that
        // writes it there; look at the referrers
        Some(Value::MakeMap) | Some(Value::Alloc) => {
            for referrer in program.referrers(value) {
                chase_referrer(program, *referrer, value, modified, seen);
            }
        }
        Some(Value::FieldAddr { operand }) | Some(Value::IndexAddr { operand }) => {
            chase_value(program, operand, modified, seen);
        }
        _ => {}
    }
}

/// Continue the chase through an instruction or derived value that mentions
/// `value`
fn chase_referrer(
    program: &Program,
    referrer: Referrer,
    value: ValueId,
    modified: &mut Vec<DefId>,
    seen: &mut FxHashSet<ValueId>,
) {
    match referrer {
        // only relevant when the chased value is the stored operand
        Referrer::Store { addr, value: stored } if stored == value => {
            chase_value(program, addr, modified, seen);
        }
        Referrer::MapUpdate { map, value: stored } if stored == value => {
            chase_value(program, map, modified, seen);
        }
        Referrer::Value(derived) => {
            let is_forwarding = matches!(
                program.value(derived),
                Some(Value::IndexAddr { .. }) | Some(Value::Slice { .. })
            );
            if is_forwarding && seen.insert(derived) {
                for next in program.referrers(derived) {
                    chase_referrer(program, *next, derived, modified, seen);
                }
            }
        }
        _ => {}
    }
}
