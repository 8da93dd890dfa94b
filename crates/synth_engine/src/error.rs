//! Error types for engine runs.

use thiserror::Error;

/// Unrecoverable faults detected when a run starts.
///
/// Runtime span-emission problems are counted and logged, never fatal.
#[derive(Debug, Error)]
pub enum Error {
    /// The topology has no root operations to drive.
    #[error("topology has no root operations")]
    NoRoots,
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
