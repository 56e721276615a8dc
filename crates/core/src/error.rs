//! Framework error types.

/// Errors raised by the PALNS framework itself.
///
/// Domain-level failures (infeasible insertions, degenerate removals)
/// are boolean returns inside the operators, not errors; this type only
/// covers misconfiguration of the framework.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The runner was started without any destroy operator.
    #[error("no destroy operator registered")]
    NoDestroyOperators,

    /// The runner was started without any repair operator.
    #[error("no repair operator registered")]
    NoRepairOperators,

    /// A framework parameter is outside its valid range.
    #[error("invalid framework parameter: {0}")]
    InvalidParameter(String),
}

/// Convenience alias used across the framework crate.
pub type Result<T> = std::result::Result<T, Error>;
