//! Error types for the orienteering engine.
//!
//! Recoverable failures (unreadable inputs, external-tool breakage,
//! solver misconfiguration) are errors. Invariant violations (tour
//! cache divergence, a non-simple tour, a displaced depot, a travel-time
//! lookup on a non-adjacent pair) indicate bugs and are assertions, not
//! errors.

/// Errors raised by the orienteering engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The instance cannot be turned into a graph.
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    /// A parameters or solution file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A parameters or solution file could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external TSP tool failed or produced no artifact.
    #[error("tsp solver failure: {0}")]
    Tsp(String),

    /// The MIP backend reported a failure.
    #[error("mip solver failure: {0}")]
    Mip(String),

    /// The PALNS framework rejected the configuration.
    #[error(transparent)]
    Framework(#[from] u_orienteering_core::Error),
}

/// Convenience alias used across the engine crate.
pub type Result<T> = std::result::Result<T, Error>;
