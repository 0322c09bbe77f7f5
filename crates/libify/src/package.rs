//! Package model and per-package stage machine

use crate::{
    error::{Result, inconsistent},
    rewriter::MovedSpec,
};

/// Name of the synthesized state record
pub const STATE_TYPE: &str = "PackageState";

/// Name of the synthesized constructor
pub const STATE_CTOR: &str = "NewPackageState";

/// Receiver/parameter name bound to the package state in rewritten code
pub const STATE_RECEIVER: &str = "pstate";

/// File name of the synthesized state artifact
pub const STATE_FILE: &str = "package-state.go";

/// Constructor parameter name for an imported peer's state
pub fn peer_param_name(peer: &str) -> String {
    format!("{peer}_pstate")
}

/// Lifecycle of one package through the pipeline
///
/// Transitions are idempotent and require the prior stage; anything else is
/// a pipeline bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Discovered,
    Snapshot,
    Analyzed,
    Classified,
    Rewritten,
    Emitted,
}

impl Stage {
    fn prior(self) -> Option<Stage> {
        match self {
            Stage::Discovered => None,
            Stage::Snapshot => Some(Stage::Discovered),
            Stage::Analyzed => Some(Stage::Snapshot),
            Stage::Classified => Some(Stage::Analyzed),
            Stage::Rewritten => Some(Stage::Classified),
            Stage::Emitted => Some(Stage::Rewritten),
        }
    }
}

/// A package being transformed
///
/// Created at discovery, enriched by classification, mutated by the
/// rewrite, extended by one synthesized file at emission. Never destroyed.
#[derive(Debug)]
pub struct Package {
    /// Canonical import path
    pub path: String,
    /// Path relative to the input root
    pub relpath: String,
    /// Primary package name
    pub name: String,
    /// Declarations lifted out of package scope, in source order
    pub moved: Vec<MovedSpec>,
    stage: Stage,
}

impl Package {
    pub fn new(path: impl Into<String>, relpath: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            relpath: relpath.into(),
            name: name.into(),
            moved: Vec::new(),
            stage: Stage::Discovered,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `next`; re-entering the current stage is a no-op
    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if self.stage == next {
            return Ok(());
        }
        if next.prior() == Some(self.stage) {
            self.stage = next;
            return Ok(());
        }
        Err(inconsistent(format!(
            "package {}: cannot advance from {:?} to {next:?}",
            self.path, self.stage
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order_and_idempotently() {
        let mut pkg = Package::new("example.com/a", "a", "a");
        assert_eq!(pkg.stage(), Stage::Discovered);

        pkg.advance(Stage::Snapshot).unwrap();
        // idempotent re-entry
        pkg.advance(Stage::Snapshot).unwrap();
        pkg.advance(Stage::Analyzed).unwrap();
        pkg.advance(Stage::Classified).unwrap();
        pkg.advance(Stage::Rewritten).unwrap();
        pkg.advance(Stage::Emitted).unwrap();
        assert_eq!(pkg.stage(), Stage::Emitted);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "inconsistent pipeline state")]
    fn skipping_a_stage_is_a_pipeline_bug() {
        let mut pkg = Package::new("example.com/a", "a", "a");
        let _ = pkg.advance(Stage::Classified);
    }
}
