//! Error taxonomy for the transformation pipeline

use thiserror::Error;

/// Errors surfaced by the libify core
///
/// The variants mirror the failure domains of the pipeline: rejected input,
/// analysis failure, unsynthesizable types, violated cross-pass invariants,
/// cooperative cancellation, and filesystem trouble. All of them abort the
/// run; on abort the destination tree is left untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// The type checker or SSA builder rejected the input program
    #[error("invalid program: {0}")]
    InvalidProgram(String),

    /// The pointer analysis returned an internal error
    #[error("pointer analysis failed: {0}")]
    AnalysisFailed(String),

    /// The type renderer met a type it cannot express syntactically
    #[error("cannot synthesize a type expression for {0}")]
    UnsupportedType(String),

    /// A cross-pass invariant was violated; this is a bug in the pipeline
    #[error("inconsistent pipeline state: {0}")]
    InconsistentState(String),

    /// Cancellation was observed between passes or files
    #[error("cancelled")]
    Cancelled,

    /// Underlying filesystem failure
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Report a violated pipeline invariant.
///
/// Panics in debug builds so the broken pass is caught at its source; in
/// release builds the error surfaces as a fatal [`Error::InconsistentState`].
pub(crate) fn inconsistent(msg: impl Into<String>) -> Error {
    let msg = msg.into();
    debug_assert!(false, "inconsistent pipeline state: {msg}");
    Error::InconsistentState(msg)
}
