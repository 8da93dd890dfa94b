//! Error types for topology construction and scenario resolution.

use thiserror::Error;

/// Errors that can occur while building the graph or its generators.
#[derive(Debug, Error)]
pub enum Error {
    /// A call references an operation that does not exist.
    #[error("unknown call target '{target}' referenced from {from}")]
    UnknownTarget {
        /// The calling operation, `"svc.op"` form.
        from: String,
        /// The unresolved target reference.
        target: String,
    },

    /// The call graph contains a directed cycle.
    #[error("cycle detected involving {0}")]
    Cycle(String),

    /// Structural problem while materializing the graph.
    #[error("topology error: {0}")]
    Build(String),

    /// An attribute generator spec could not be turned into a generator.
    #[error("invalid attribute generator: {0}")]
    InvalidGenerator(String),

    /// A scalar inside the config failed to parse.
    #[error(transparent)]
    Model(#[from] synth_model::Error),
}

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;
