//! libify: whole-program hoisting of package-level mutable state
//!
//! Takes a tree of packages built around process-wide globals and rewrites
//! it into re-entrant library form: every package's mutable globals move
//! into an explicit `PackageState` record with a `NewPackageState`
//! constructor, and every function that transitively touches them is
//! threaded with a `pstate` receiver or parameter. Multiple independent
//! instances of the program can then coexist in one process.
//!
//! The core lives in [`pipeline::Libifier`]; the external parser, type
//! checker, SSA builder, and pointer analysis are consumed through the
//! narrow seams in [`snapshot`], [`ssa`], and [`pointer`].

pub mod ast_store;
pub mod cancel;
pub mod classifier;
pub mod codegen;
pub mod error;
pub mod mutation_oracle;
pub mod mutators;
pub mod package;
pub mod pipeline;
pub mod pointer;
pub mod rewriter;
pub mod session;
pub mod snapshot;
pub mod ssa;
pub mod state_emitter;
pub mod syntax;
pub mod type_renderer;
pub mod types;
pub mod use_graph;
pub mod vfs;
