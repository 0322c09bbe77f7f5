//! ProgramSnapshot: immutable view of the typed program
//!
//! Built once from the external type checker before classification and never
//! refreshed. It carries, per package: the `Defs` and `Uses` name bindings
//! (keyed by typed node id), the dependency-ordered initializer list, and the
//! import list; globally: the definition table, the interned type table, the
//! entry packages, and the package import graph used for leaves-first pass
//! scheduling.

use log::debug;
use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;

use crate::{
    error::{Error, Result},
    syntax::{ChanDir, Expr},
    types::{DefId, FxIndexMap, TypeId, TypedNodeId},
};

/// What kind of entity a definition names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Var,
    Func,
    Method,
    Param,
    TypeName,
}

/// Metadata the checker reports for one definition
#[derive(Debug, Clone)]
pub struct DefInfo {
    pub name: String,
    /// Import path of the declaring package
    pub package: String,
    pub kind: DefKind,
    pub ty: TypeId,
}

/// One entry of a package's init order: the definitions on the left-hand
/// side and the initializer expression, captured as an owned decorated clone
///
/// A multi-value call shares one `rhs` among several `lhs` entries.
#[derive(Debug, Clone)]
pub struct Initializer {
    pub lhs: Vec<DefId>,
    pub rhs: Expr,
}

/// An import edge as the checker reports it
#[derive(Debug, Clone)]
pub struct ImportedPackage {
    pub path: String,
    /// Short (package) name, used for state-field naming
    pub name: String,
}

/// Per-package slice of the snapshot
#[derive(Debug, Default)]
pub struct PackageSnapshot {
    pub path: String,
    pub name: String,
    /// Name binding at declaration sites
    pub defs: FxHashMap<TypedNodeId, DefId>,
    /// Name binding at reference sites
    pub uses: FxHashMap<TypedNodeId, DefId>,
    /// Top-level initializers in dependency order
    pub init_order: Vec<Initializer>,
    pub imports: Vec<ImportedPackage>,
}

impl PackageSnapshot {
    pub fn def_at(&self, typed: TypedNodeId) -> Option<DefId> {
        self.defs.get(&typed).copied()
    }

    pub fn use_at(&self, typed: TypedNodeId) -> Option<DefId> {
        self.uses.get(&typed).copied()
    }
}

/// Immutable whole-program snapshot
#[derive(Debug)]
pub struct ProgramSnapshot {
    packages: FxIndexMap<String, PackageSnapshot>,
    defs: Vec<DefInfo>,
    types: TypeTable,
    entry_packages: Vec<String>,
}

impl ProgramSnapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn package(&self, path: &str) -> Option<&PackageSnapshot> {
        self.packages.get(path)
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageSnapshot> {
        self.packages.values()
    }

    pub fn def(&self, id: DefId) -> Option<&DefInfo> {
        self.defs.get(id.index())
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Packages holding the program's entry points, as reported by the
    /// checker; the pointer analysis is rooted here
    pub fn entry_packages(&self) -> &[String] {
        &self.entry_packages
    }

    /// Package paths in dependency order, leaves first.
    ///
    /// When a package is processed, everything it imports has already been
    /// processed. An import cycle is a rejected program.
    pub fn dependency_order(&self) -> Result<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: FxHashMap<&str, NodeIndex> = FxHashMap::default();

        for path in self.packages.keys() {
            let idx = graph.add_node(path.as_str());
            indices.insert(path.as_str(), idx);
        }
        for (path, pkg) in &self.packages {
            for imported in &pkg.imports {
                if let Some(&to) = indices.get(imported.path.as_str()) {
                    graph.add_edge(indices[path.as_str()], to, ());
                }
            }
        }

        // toposort puts importers before their imports; the passes want
        // leaves first, so reverse
        let mut order = toposort(&graph, None)
            .map_err(|cycle| {
                Error::InvalidProgram(format!(
                    "import cycle through {}",
                    graph[cycle.node_id()]
                ))
            })?
            .into_iter()
            .map(|idx| graph[idx].to_string())
            .collect::<Vec<_>>();
        order.reverse();
        debug!("dependency order: {order:?}");
        Ok(order)
    }
}

/// Incrementally populated by the external checker adapter, sealed into a
/// [`ProgramSnapshot`]
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    packages: FxIndexMap<String, PackageSnapshot>,
    defs: Vec<DefInfo>,
    types: TypeTable,
    entry_packages: Vec<String>,
}

impl SnapshotBuilder {
    /// Register a package; repeated calls for the same path are merged
    pub fn add_package(&mut self, path: &str, name: &str) -> &mut Self {
        let entry = self.packages.entry(path.to_string()).or_default();
        entry.path = path.to_string();
        entry.name = name.to_string();
        self
    }

    pub fn add_import(&mut self, path: &str, imported: ImportedPackage) -> &mut Self {
        if let Some(pkg) = self.packages.get_mut(path) {
            pkg.imports.push(imported);
        }
        self
    }

    pub fn add_def_info(&mut self, info: DefInfo) -> DefId {
        let id = DefId::new(self.defs.len() as u32);
        self.defs.push(info);
        id
    }

    pub fn record_def(&mut self, path: &str, typed: TypedNodeId, def: DefId) -> &mut Self {
        if let Some(pkg) = self.packages.get_mut(path) {
            pkg.defs.insert(typed, def);
        }
        self
    }

    pub fn record_use(&mut self, path: &str, typed: TypedNodeId, def: DefId) -> &mut Self {
        if let Some(pkg) = self.packages.get_mut(path) {
            pkg.uses.insert(typed, def);
        }
        self
    }

    pub fn push_initializer(&mut self, path: &str, init: Initializer) -> &mut Self {
        if let Some(pkg) = self.packages.get_mut(path) {
            pkg.init_order.push(init);
        }
        self
    }

    pub fn add_entry_package(&mut self, path: &str) -> &mut Self {
        self.entry_packages.push(path.to_string());
        self
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub fn finish(self) -> ProgramSnapshot {
        ProgramSnapshot {
            packages: self.packages,
            defs: self.defs,
            types: self.types,
            entry_packages: self.entry_packages,
        }
    }
}

// ---------------------------------------------------------------------------
// Type table
// ---------------------------------------------------------------------------

/// Builtin type kinds, including the untyped constant forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicType {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Str,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

/// A type as the checker's internal representation reports it
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Basic(BasicType),
    Array { len: u64, elem: TypeId },
    Slice { elem: TypeId },
    Pointer { elem: TypeId },
    Map { key: TypeId, value: TypeId },
    Chan { dir: ChanDir, elem: TypeId },
    Func { params: Vec<(Option<String>, TypeId)>, results: Vec<(Option<String>, TypeId)> },
    Struct { fields: Vec<(String, TypeId)> },
    Interface { embedded: Vec<TypeId>, methods: Vec<(String, TypeId)> },
    /// `package == None` for the universe-scope `error` sentinel
    Named { package: Option<String>, name: String },
    Tuple { elems: Vec<TypeId> },
}

/// Interned types, indexable by [`TypeId`]
#[derive(Debug, Default)]
pub struct TypeTable {
    types: Vec<Type>,
}

impl TypeTable {
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(pos) = self.types.iter().position(|existing| *existing == ty) {
            return TypeId::new(pos as u32);
        }
        let id = TypeId::new(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.index())
    }
}
