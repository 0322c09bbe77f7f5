//! SSA facade: the slice of the external SSA builder's output the mutation
//! oracle consumes
//!
//! Only the instruction and value forms that matter for write detection are
//! represented: stores, map updates, the address-lifting chain (deref,
//! field-address, index-address), allocation sites, map construction, and
//! slicing. Everything else collapses to `Opaque`/`Other`. Referrer edges,
//! recording which instructions and derived values mention a value, are maintained by
//! the program itself as functions are added, so the oracle can chase
//! allocation sites forward to the store that lands in a global.

use rustc_hash::FxHashMap;

use crate::types::{DefId, ValueId};

/// An SSA value, reduced to the shapes the oracle inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// Address of a package-level variable
    Global { def: DefId },
    /// `*x`
    Deref { operand: ValueId },
    /// `&x.f`
    FieldAddr { operand: ValueId },
    /// `&x[i]`
    IndexAddr { operand: ValueId },
    /// `x[lo:hi]`
    Slice { operand: ValueId },
    /// A local allocation whose address may escape
    Alloc,
    /// A map construction site
    MakeMap,
    /// Any other value (parameters, call results, constants, ...)
    Opaque,
}

/// An SSA instruction, reduced to the shapes the oracle inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    Store { addr: ValueId, value: ValueId },
    MapUpdate { map: ValueId, key: ValueId, value: ValueId },
    Call,
    Return,
    Other,
}

#[derive(Debug, Default)]
pub struct Block {
    pub instrs: Vec<Instr>,
}

/// One function of the SSA program
#[derive(Debug)]
pub struct Function {
    pub name: String,
    /// Import path of the defining package
    pub package: String,
    /// Methods named `init` are real code; free functions named `init` are
    /// the synthesized package initializers and are skipped by the oracle
    pub is_method: bool,
    pub blocks: Vec<Block>,
    /// The implicit recover block, when present
    pub recover: Option<Block>,
}

/// A use of a value: either an instruction operand position the oracle cares
/// about, or a derived value built from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Referrer {
    Store { addr: ValueId, value: ValueId },
    MapUpdate { map: ValueId, value: ValueId },
    /// A derived value (index-address, slice, ...) whose operand is the
    /// referent
    Value(ValueId),
}

/// The whole-program SSA view
#[derive(Debug, Default)]
pub struct Program {
    values: Vec<Value>,
    referrers: FxHashMap<ValueId, Vec<Referrer>>,
    functions: Vec<Function>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value. Derived values record themselves as referrers of
    /// their operand.
    pub fn push_value(&mut self, value: Value) -> ValueId {
        let id = ValueId::new(self.values.len() as u32);
        self.values.push(value);
        match value {
            Value::Deref { operand }
            | Value::FieldAddr { operand }
            | Value::IndexAddr { operand }
            | Value::Slice { operand } => {
                self.referrers.entry(operand).or_default().push(Referrer::Value(id));
            }
            _ => {}
        }
        id
    }

    /// Add a function; referrer edges for its instructions are recorded here
    pub fn add_function(&mut self, function: Function) {
        for block in function.blocks.iter().chain(function.recover.iter()) {
            for instr in &block.instrs {
                match *instr {
                    Instr::Store { addr, value } => {
                        let edge = Referrer::Store { addr, value };
                        self.referrers.entry(addr).or_default().push(edge);
                        self.referrers.entry(value).or_default().push(edge);
                    }
                    Instr::MapUpdate { map, value, .. } => {
                        let edge = Referrer::MapUpdate { map, value };
                        self.referrers.entry(map).or_default().push(edge);
                        self.referrers.entry(value).or_default().push(edge);
                    }
                    Instr::Call | Instr::Return | Instr::Other => {}
                }
            }
        }
        self.functions.push(function);
    }

    pub fn value(&self, id: ValueId) -> Option<Value> {
        self.values.get(id.index()).copied()
    }

    pub fn referrers(&self, id: ValueId) -> &[Referrer] {
        self.referrers.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }
}
