//! Domain error types for permission operations.

use thiserror::Error;

use crate::validation::ValidationError;

/// Domain-specific errors for permission operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A holder referenced by id does not exist.
    #[error("holder not found: {id}")]
    HolderNotFound { id: String },

    /// A group referenced by name does not exist.
    #[error("group not found: {name}")]
    GroupNotFound { name: String },

    /// Malformed permission key, context key or group name.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A policy-blocked state transition (e.g. removing the last
    /// primary-group link when configuration forbids it).
    #[error("consistency violation: {message}")]
    Consistency { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
