//! AstStore: decorated trees plus the decorated↔typed node tables
//!
//! Holds the decorated AST for every in-scope package, keyed by
//! (package path, file name), and owns the bidirectional mapping between
//! decorated nodes and the plain typed nodes the external checker and SSA
//! builder know about. Every lookup into the type system goes through this
//! mapping; edits never invalidate it because entries are only ever added or
//! replaced in both directions at once.

use log::debug;

use crate::{
    error::{Result, inconsistent},
    syntax::File,
    types::{FxIndexMap, NodeId, TypedNodeId},
};

/// Allocator for fresh decorated node ids
///
/// Synthesized nodes (pstate receivers, state selectors, the state file) draw
/// from the same id space as parsed nodes so the tables stay collision-free.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u32,
}

impl IdGen {
    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId::new(self.next);
        self.next += 1;
        id
    }

    /// Reserve everything below `floor`, for trees decorated elsewhere
    pub fn skip_to(&mut self, floor: u32) {
        if floor > self.next {
            self.next = floor;
        }
    }
}

/// Bidirectional decorated↔typed node tables
#[derive(Debug, Default)]
pub struct NodeMaps {
    deco_to_typed: FxIndexMap<NodeId, TypedNodeId>,
    typed_to_deco: FxIndexMap<TypedNodeId, NodeId>,
}

impl NodeMaps {
    pub fn typed_of(&self, node: NodeId) -> Option<TypedNodeId> {
        self.deco_to_typed.get(&node).copied()
    }

    pub fn deco_of(&self, typed: TypedNodeId) -> Option<NodeId> {
        self.typed_to_deco.get(&typed).copied()
    }

    fn bind(&mut self, node: NodeId, typed: TypedNodeId) {
        if let Some(stale) = self.deco_to_typed.insert(node, typed) {
            self.typed_to_deco.swap_remove(&stale);
        }
        if let Some(stale) = self.typed_to_deco.insert(typed, node) {
            self.deco_to_typed.swap_remove(&stale);
        }
    }
}

/// Decorated AST store for the whole in-scope package set
#[derive(Debug, Default)]
pub struct AstStore {
    /// package import path -> file name -> decorated file
    files: FxIndexMap<String, FxIndexMap<String, File>>,
    maps: NodeMaps,
    ids: IdGen,
}

impl AstStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh decorated node id
    pub fn fresh(&mut self) -> NodeId {
        self.ids.fresh()
    }

    pub fn ids_mut(&mut self) -> &mut IdGen {
        &mut self.ids
    }

    pub fn maps(&self) -> &NodeMaps {
        &self.maps
    }

    /// Record that decorated `node` corresponds to typed `typed`.
    ///
    /// Both directions are updated together; a rebind evicts the stale
    /// reverse entries.
    pub fn bind(&mut self, node: NodeId, typed: TypedNodeId) {
        self.maps.bind(node, typed);
    }

    /// Round-trip into the decorated world: allocate a decorated id for a
    /// typed node and bind the pair
    pub fn decorate(&mut self, typed: TypedNodeId) -> NodeId {
        let node = self.ids.fresh();
        self.maps.bind(node, typed);
        node
    }

    /// Round-trip out of the decorated world
    pub fn undecorate(&self, node: NodeId) -> Option<TypedNodeId> {
        self.maps.typed_of(node)
    }

    pub fn typed_of(&self, node: NodeId) -> Option<TypedNodeId> {
        self.maps.typed_of(node)
    }

    pub fn deco_of(&self, typed: TypedNodeId) -> Option<NodeId> {
        self.maps.deco_of(typed)
    }

    /// Register a parsed file under its package
    pub fn add_file(&mut self, package: &str, name: &str, file: File) {
        self.files
            .entry(package.to_string())
            .or_default()
            .insert(name.to_string(), file);
    }

    /// Attach a synthesized file to a package.
    ///
    /// Unlike [`add_file`](Self::add_file) this refuses to overwrite: a
    /// synthesized name colliding with a parsed file is a pipeline bug.
    pub fn emit_file(&mut self, package: &str, name: &str, file: File) -> Result<()> {
        let package_files = self.files.entry(package.to_string()).or_default();
        if package_files.contains_key(name) {
            return Err(inconsistent(format!(
                "synthesized file {name} already exists in {package}"
            )));
        }
        debug!("emitting {name} into {package}");
        package_files.insert(name.to_string(), file);
        Ok(())
    }

    pub fn remove_file(&mut self, package: &str, name: &str) -> Option<File> {
        self.files.get_mut(package)?.shift_remove(name)
    }

    /// Package import paths currently held, in insertion order
    pub fn package_paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn file(&self, package: &str, name: &str) -> Option<&File> {
        self.files.get(package)?.get(name)
    }

    /// Iterate the files of one package
    pub fn package_files(&self, package: &str) -> impl Iterator<Item = (&str, &File)> {
        self.files
            .get(package)
            .into_iter()
            .flat_map(|files| files.iter().map(|(name, file)| (name.as_str(), file)))
    }

    /// In-order mutable walk over the files of one package.
    ///
    /// The closure receives the file, the id allocator, and the (read-only)
    /// node tables, so rewrite passes can synthesize nodes and resolve typed
    /// bindings in one sweep.
    pub fn rewrite_package_files<F>(&mut self, package: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &mut File, &mut IdGen, &NodeMaps) -> Result<()>,
    {
        let Self {
            files, maps, ids, ..
        } = self;
        let Some(package_files) = files.get_mut(package) else {
            return Ok(());
        };
        for (name, file) in package_files.iter_mut() {
            f(name, file, ids, maps)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
