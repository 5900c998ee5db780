//! Key store error types.
//!
//! - `Unavailable`: the store could not be opened
//! - `NotFound`: requested blob doesn't exist
//! - `LengthMismatch`: blob exists with a different length than requested
//! - `Io`: underlying flash or database errors

use thiserror::Error;

/// Errors that can occur during key store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be opened
    #[error("key store unavailable: {0}")]
    Unavailable(String),

    /// Blob not present
    #[error("blob not found: {name}")]
    NotFound {
        /// Blob name
        name: String,
    },

    /// Blob present with an unexpected length
    #[error("blob {name} has length {actual}, expected {expected}")]
    LengthMismatch {
        /// Blob name
        name: String,
        /// Length requested by the caller
        expected: usize,
        /// Length actually stored
        actual: usize,
    },

    /// I/O error (flash, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}
