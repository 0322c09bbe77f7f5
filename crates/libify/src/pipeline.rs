//! Libifier: the multi-pass transformation pipeline
//!
//! Pass order, mirroring the dependency structure of the edits:
//!
//!  1. discover the in-scope package closure (requested packages plus every
//!     in-tree import reachable from them);
//!  2. mutation analysis over SSA + pointer analysis;
//!  3. use-graph construction and classification (closed over tuple rows);
//!  4. declaration stripping, per package in leaves-first order;
//!  5. state-file emission (before reference rewriting, so the synthesized
//!     constructor bodies take part in the remaining passes);
//!  6. signature extension, local reference rewriting, method call
//!     threading, cross-package reference rewriting; each pass runs to
//!     completion over all packages before the next begins.
//!
//! The pipeline is single-threaded and cooperative: the cancellation token
//! is consulted between passes and between packages. Stage bookkeeping per
//! package is sequential even where a pass touches files earlier than its
//! stage name suggests.

use log::{debug, info};

use crate::{
    ast_store::AstStore,
    cancel::CancelToken,
    classifier::{self, Classification},
    error::{Result, inconsistent},
    mutation_oracle::MutationOracle,
    package::{Package, Stage},
    pointer::PointsToSolver,
    rewriter::Rewriter,
    snapshot::ProgramSnapshot,
    ssa,
    state_emitter::StateEmitter,
    types::FxIndexMap,
};

/// What the caller asks the pipeline to transform
#[derive(Debug, Clone, Default)]
pub struct Libify {
    /// Canonical import paths of the packages to transform; their in-tree
    /// import closures are pulled in automatically
    pub packages: Vec<String>,
    /// Import-path prefix of the source tree root, stripped to obtain
    /// root-relative package paths
    pub root: String,
}

/// The whole-program transformation
pub struct Libifier<'a> {
    libify: Libify,
    snapshot: &'a ProgramSnapshot,
    ssa: &'a ssa::Program,
    solver: &'a dyn PointsToSolver,
    cancel: CancelToken,
    packages: FxIndexMap<String, Package>,
}

impl<'a> Libifier<'a> {
    pub fn new(
        libify: Libify,
        snapshot: &'a ProgramSnapshot,
        ssa: &'a ssa::Program,
        solver: &'a dyn PointsToSolver,
        cancel: CancelToken,
    ) -> Self {
        Self {
            libify,
            snapshot,
            ssa,
            solver,
            cancel,
            packages: FxIndexMap::default(),
        }
    }

    /// The discovered packages, keyed by import path
    pub fn packages(&self) -> &FxIndexMap<String, Package> {
        &self.packages
    }

    /// Run every pass over `store`
    pub fn run(&mut self, store: &mut AstStore) -> Result<()> {
        info!("libify: {} requested packages", self.libify.packages.len());

        self.scan_deps()?;
        self.advance_all(Stage::Snapshot)?;
        self.cancel.check()?;

        debug!("mutation analysis");
        let oracle = MutationOracle::analyze(self.ssa, self.snapshot, self.solver)?;
        self.advance_all(Stage::Analyzed)?;
        self.cancel.check()?;

        debug!("use graph + classification");
        let graph = crate::use_graph::UseGraph::build(store, self.snapshot)?;
        let mut classification = classifier::classify(&graph, &oracle, self.snapshot)?;
        classifier::close_tuple_groups(&mut classification, store, self.snapshot)?;
        self.advance_all(Stage::Classified)?;
        self.cancel.check()?;

        let order = self.transform_order()?;
        self.rewrite_and_emit(store, &classification, &order)?;

        self.advance_all(Stage::Rewritten)?;
        self.advance_all(Stage::Emitted)?;
        info!("libify: transformed {} packages", self.packages.len());
        Ok(())
    }

    /// Find the requested packages and their full in-tree dependency
    /// closure
    fn scan_deps(&mut self) -> Result<()> {
        let requested = self.libify.packages.clone();
        for path in &requested {
            if self.snapshot.package(path).is_none() {
                return Err(crate::error::Error::InvalidProgram(format!(
                    "requested package {path} is not part of the checked program"
                )));
            }
            self.scan_package(path);
        }
        debug!("in scope: {} packages", self.packages.len());
        Ok(())
    }

    fn scan_package(&mut self, path: &str) {
        if self.packages.contains_key(path) {
            return;
        }
        let Some(pkg) = self.snapshot.package(path) else {
            // not in the checked tree: standard library or vendored code
            return;
        };
        let relpath = path
            .strip_prefix(&self.libify.root)
            .map(|rel| rel.trim_start_matches('/'))
            .unwrap_or(path)
            .to_string();
        self.packages.insert(
            path.to_string(),
            Package::new(path.to_string(), relpath, pkg.name.clone()),
        );
        let imports: Vec<String> = pkg.imports.iter().map(|imp| imp.path.clone()).collect();
        for imported in imports {
            self.scan_package(&imported);
        }
    }

    /// In-scope packages in leaves-first dependency order
    fn transform_order(&self) -> Result<Vec<String>> {
        let order = self.snapshot.dependency_order()?;
        Ok(order
            .into_iter()
            .filter(|path| self.packages.contains_key(path))
            .collect())
    }

    fn rewrite_and_emit(
        &mut self,
        store: &mut AstStore,
        classification: &Classification,
        order: &[String],
    ) -> Result<()> {
        let rewriter = Rewriter::new(self.snapshot, classification);
        let emitter = StateEmitter::new(self.snapshot, classification);

        debug!("stripping declarations");
        for path in order {
            self.cancel.check()?;
            let moved = rewriter.strip_declarations(store, path)?;
            self.packages
                .get_mut(path)
                .ok_or_else(|| inconsistent(format!("package {path} lost during rewrite")))?
                .moved = moved;
        }

        debug!("emitting state files");
        for path in order {
            self.cancel.check()?;
            let moved = &self.packages[path].moved;
            emitter.emit_package(store, path, moved)?;
        }

        debug!("extending signatures");
        for path in order {
            self.cancel.check()?;
            rewriter.extend_signatures(store, path)?;
        }

        debug!("rewriting local references");
        for path in order {
            self.cancel.check()?;
            rewriter.rewrite_local_refs(store, path)?;
        }

        debug!("threading method call sites");
        for path in order {
            self.cancel.check()?;
            rewriter.rewrite_method_calls(store, path)?;
        }

        debug!("rewriting cross-package references");
        for path in order {
            self.cancel.check()?;
            rewriter.rewrite_cross_refs(store, path)?;
        }

        Ok(())
    }

    fn advance_all(&mut self, stage: Stage) -> Result<()> {
        for pkg in self.packages.values_mut() {
            pkg.advance(stage)?;
        }
        Ok(())
    }
}
