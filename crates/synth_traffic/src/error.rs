//! Error types for traffic pattern construction.

use thiserror::Error;

/// Errors that can occur while building a traffic pattern.
#[derive(Debug, Error)]
pub enum Error {
    /// Pattern parameters violate an invariant.
    #[error("invalid traffic pattern: {0}")]
    InvalidPattern(String),

    /// A scalar inside the traffic config failed to parse.
    #[error(transparent)]
    Model(#[from] synth_model::Error),
}

/// Result type alias for traffic pattern operations.
pub type Result<T> = std::result::Result<T, Error>;
