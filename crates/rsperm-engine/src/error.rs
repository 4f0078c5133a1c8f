//! Engine error types.

use thiserror::Error;

use rsperm_domain::error::DomainError;
use rsperm_domain::validation::ValidationError;
use rsperm_storage::error::StorageError;

/// Errors surfaced to the command layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The holder addressed by a query or mutation is not resident and
    /// not stored.
    #[error("holder not found: {id}")]
    NotFound { id: String },

    /// A domain rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Malformed input rejected at the mutation boundary.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The storage backend failed; the caller may retry. The engine has
    /// already re-synchronized its in-memory state with storage.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
