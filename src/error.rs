//! Crate error types

use thiserror::Error;

/// Errors surfaced by the LWR loss and its collaborators
///
/// All variants are fatal for the training run; nothing here is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// A required precondition on module state was violated, e.g. the
    /// retrospective loss was invoked past the warm-up boundary without a
    /// snapshot output.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Tensor shapes disagree under the configured softening axis.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A sample index does not address a row of the soft-label table.
    #[error("sample index {index} out of bounds for table with {len} rows")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for LWR operations
pub type Result<T> = std::result::Result<T, Error>;
