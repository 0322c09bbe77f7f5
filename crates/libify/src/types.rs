//! Shared type definitions for the libify crate
//!
//! This module contains the newtype identifiers that tie the decorated AST,
//! the typed-program snapshot, and the SSA facade together. All cross-pass
//! graphs are keyed by these ids, never by node references.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

/// Type alias for IndexMap with FxHasher for better performance
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Type alias for IndexSet with FxHasher for better performance
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Unique identifier for a decorated AST node
///
/// Decorated nodes carry transformation metadata (origin package paths,
/// synthesized-node provenance). The id space is owned by the
/// [`AstStore`](crate::ast_store::AstStore); fresh nodes created during
/// rewriting allocate from the same space so the decorated/typed tables
/// stay collision-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value of the NodeId
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Unique identifier for a node as known to the external type checker
///
/// The checker resolves names against its own tree; the bidirectional
/// `NodeId` ↔ `TypedNodeId` tables in the store are the only bridge between
/// the two worlds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypedNodeId(u32);

impl TypedNodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Opaque identity of a declared entity (variable, function, method, param)
///
/// Issued by the type checker; treated as an abstract key everywhere. The
/// mutation oracle, the use graph, and the classifier are all keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(u32);

impl DefId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifier of an interned type in the snapshot's type table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifier of an SSA value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(u32);

impl ValueId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}
