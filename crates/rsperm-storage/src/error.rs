//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
///
/// Failures are surfaced to the command layer as retryable; the engine
/// never treats a failed save as silent data loss.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Holder not found.
    #[error("holder not found: {id}")]
    NotFound { id: String },

    /// Group already exists.
    #[error("group already exists: {name}")]
    AlreadyExists { name: String },

    /// Backend I/O failure.
    #[error("storage i/o error: {message}")]
    Io { message: String },

    /// Record could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    Internal { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
