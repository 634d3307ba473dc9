//! # Core Error Types

use thiserror::Error;

/// Errors raised by the core memory primitives.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// The backing store could not be reserved.
    #[error("out of memory: failed to reserve {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested.
        requested: usize,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
