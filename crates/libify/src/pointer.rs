//! Interface to the whole-program pointer analysis
//!
//! The analysis itself is an external collaborator; the oracle hands it a
//! configuration plus the opaque store targets it could not lift to a global
//! syntactically, and gets back a points-to label set per query.

use rustc_hash::FxHashMap;

use crate::{error::Result, ssa, types::ValueId};

/// Configuration for a whole-program points-to run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// The original entry packages of the program
    pub entry_packages: Vec<String>,
    pub build_call_graph: bool,
    pub reflection: bool,
}

impl AnalysisConfig {
    /// The configuration the pipeline always uses: call graph on, reflection
    /// modelled, rooted at the program's entry packages
    pub fn whole_program(entry_packages: Vec<String>) -> Self {
        Self {
            entry_packages,
            build_call_graph: true,
            reflection: true,
        }
    }
}

/// An abstract memory location a query may point at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub value: ValueId,
}

/// Per-query points-to sets
#[derive(Debug, Default)]
pub struct PointsToResult {
    sets: FxHashMap<ValueId, Vec<Label>>,
}

impl PointsToResult {
    pub fn insert(&mut self, query: ValueId, labels: Vec<Label>) {
        self.sets.insert(query, labels);
    }

    /// Labels of one query; a query the analysis knows nothing about has an
    /// empty points-to set
    pub fn labels(&self, query: ValueId) -> &[Label] {
        self.sets.get(&query).map_or(&[], Vec::as_slice)
    }
}

/// The narrow seam to the external points-to engine
pub trait PointsToSolver {
    fn analyze(
        &self,
        program: &ssa::Program,
        config: &AnalysisConfig,
        queries: &[ValueId],
    ) -> Result<PointsToResult>;
}

/// Table-backed solver for precomputed points-to sets
///
/// Used by the test suites and by embedders that run the real analysis out
/// of process: each registered query returns its recorded label set,
/// unregistered queries resolve to nothing.
#[derive(Debug, Default)]
pub struct TableSolver {
    sets: FxHashMap<ValueId, Vec<ValueId>>,
}

impl TableSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `query` may point at each of `targets`
    pub fn set(&mut self, query: ValueId, targets: Vec<ValueId>) -> &mut Self {
        self.sets.insert(query, targets);
        self
    }
}

impl PointsToSolver for TableSolver {
    fn analyze(
        &self,
        _program: &ssa::Program,
        _config: &AnalysisConfig,
        queries: &[ValueId],
    ) -> Result<PointsToResult> {
        let mut result = PointsToResult::default();
        for &query in queries {
            let labels = self
                .sets
                .get(&query)
                .map(|targets| targets.iter().map(|&value| Label { value }).collect())
                .unwrap_or_default();
            result.insert(query, labels);
        }
        Ok(result)
    }
}
