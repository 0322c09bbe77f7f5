//! UseGraph: direct variable and function references per declaration
//!
//! Two passes over the decorated trees. The first collects every
//! package-level variable definition; the second walks each function and
//! method body recording which of those variables it reads or writes and
//! which functions it mentions. Only direct uses are recorded; transitive
//! reachability is the classifier's job.
//!
//! Cross-package references are included and attributed to the declaring
//! package through the definition object, so threading propagates across
//! package boundaries. Anonymous function bodies are credited to the
//! enclosing declaration.

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast_store::AstStore,
    error::{Result, inconsistent},
    snapshot::{DefKind, PackageSnapshot, ProgramSnapshot},
    syntax::{Decl, Expr, visit_block},
    types::{DefId, FxIndexSet},
};

/// Direct-use edges for every function/method declaration
#[derive(Debug, Default)]
pub struct UseGraph {
    /// Every package-level variable definition
    var_objects: FxHashSet<DefId>,
    /// Every function/method declaration, in file order
    functions: FxIndexSet<DefId>,
    var_uses: FxHashMap<DefId, FxHashSet<DefId>>,
    func_uses: FxHashMap<DefId, FxHashSet<DefId>>,
}

impl UseGraph {
    /// Build the graph for every package of the snapshot
    pub fn build(store: &AstStore, snapshot: &ProgramSnapshot) -> Result<Self> {
        let mut graph = Self::default();

        // package-level vars first: a body may reference a variable of a
        // package that has not been walked yet
        for pkg in snapshot.packages() {
            graph.collect_vars(store, pkg)?;
        }
        for pkg in snapshot.packages() {
            graph.collect_uses(store, snapshot, pkg)?;
        }

        debug!(
            "use graph: {} package vars, {} functions",
            graph.var_objects.len(),
            graph.functions.len()
        );
        Ok(graph)
    }

    fn collect_vars(&mut self, store: &AstStore, pkg: &PackageSnapshot) -> Result<()> {
        for (_, file) in store.package_files(&pkg.path) {
            for decl in &file.decls {
                let Decl::Var(group) = decl else { continue };
                for spec in &group.specs {
                    for name in &spec.names {
                        if name.is_blank() {
                            continue;
                        }
                        let def = store
                            .typed_of(name.id)
                            .and_then(|typed| pkg.def_at(typed))
                            .ok_or_else(|| {
                                inconsistent(format!("can't find {} in defs", name.name))
                            })?;
                        self.var_objects.insert(def);
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_uses(
        &mut self,
        store: &AstStore,
        snapshot: &ProgramSnapshot,
        pkg: &PackageSnapshot,
    ) -> Result<()> {
        for (_, file) in store.package_files(&pkg.path) {
            for decl in &file.decls {
                let Decl::Func(func) = decl else { continue };
                // synthesized declarations (a previously emitted constructor,
                // for instance) have no typed binding and no uses to record
                let Some(fn_def) = store
                    .typed_of(func.name.id)
                    .and_then(|typed| pkg.def_at(typed))
                else {
                    trace!("skipping unbound function {}", func.name.name);
                    continue;
                };
                self.functions.insert(fn_def);

                let mut record = |ident_id| {
                    let Some(used) = store.typed_of(ident_id).and_then(|typed| pkg.use_at(typed))
                    else {
                        return;
                    };
                    if self.var_objects.contains(&used) {
                        self.var_uses.entry(fn_def).or_default().insert(used);
                        return;
                    }
                    if let Some(info) = snapshot.def(used)
                        && matches!(info.kind, DefKind::Func | DefKind::Method)
                    {
                        self.func_uses.entry(fn_def).or_default().insert(used);
                    }
                };

                visit_block(&func.body, &mut |expr| match expr {
                    Expr::Ident(ident) => record(ident.id),
                    // method references live on the selector's right-hand
                    // side, which is not an expression slot of its own
                    Expr::Selector { field, .. } => record(field.id),
                    _ => {}
                });
            }
        }
        Ok(())
    }

    pub fn var_objects(&self) -> &FxHashSet<DefId> {
        &self.var_objects
    }

    pub fn functions(&self) -> &FxIndexSet<DefId> {
        &self.functions
    }

    pub fn var_uses(&self, def: DefId) -> Option<&FxHashSet<DefId>> {
        self.var_uses.get(&def)
    }

    pub fn func_uses(&self, def: DefId) -> Option<&FxHashSet<DefId>> {
        self.func_uses.get(&def)
    }

    // direct construction, for the classifier's unit tests
    #[cfg(test)]
    pub(crate) fn record_for_tests(
        vars: &[DefId],
        functions: &[DefId],
        var_uses: &[(DefId, DefId)],
        func_uses: &[(DefId, DefId)],
    ) -> Self {
        let mut graph = Self::default();
        graph.var_objects.extend(vars.iter().copied());
        graph.functions.extend(functions.iter().copied());
        for &(f, v) in var_uses {
            graph.var_uses.entry(f).or_default().insert(v);
        }
        for &(f, callee) in func_uses {
            graph.func_uses.entry(f).or_default().insert(callee);
        }
        graph
    }
}
