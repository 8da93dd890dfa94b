//! Error types for configuration parsing and validation.

use thiserror::Error;

/// Errors that can occur while parsing or validating a configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// A rate string did not match the `N/unit` grammar.
    #[error("invalid rate '{input}': {reason}")]
    InvalidRate {
        /// The offending rate string.
        input: String,
        /// Reason the rate was rejected.
        reason: String,
    },

    /// A duration literal could not be parsed.
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration {
        /// The offending duration string.
        input: String,
        /// Reason the duration was rejected.
        reason: String,
    },

    /// A distribution string did not match the `mean +/- stddev` grammar.
    #[error("invalid distribution '{input}': {reason}")]
    InvalidDistribution {
        /// The offending distribution string.
        input: String,
        /// Reason the distribution was rejected.
        reason: String,
    },

    /// An error-rate value was malformed or out of range.
    #[error("invalid error rate '{input}': {reason}")]
    InvalidErrorRate {
        /// The offending error-rate value.
        input: String,
        /// Reason the value was rejected.
        reason: String,
    },

    /// Config structure is well-formed but semantically wrong.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;
