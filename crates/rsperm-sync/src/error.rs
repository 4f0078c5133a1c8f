//! Sync error types.

use thiserror::Error;

/// Messenger and codec errors.
///
/// Transport failures degrade to eventual consistency (the periodic
/// resync is the backstop); they never crash the resolving process.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A message could not be encoded for the wire.
    #[error("message encode error: {message}")]
    Encode { message: String },

    /// An incoming frame could not be decoded.
    #[error("message decode error: {message}")]
    Decode { message: String },

    /// The transport is closed or has no capacity.
    #[error("messenger transport closed")]
    Closed,

    /// Publish did not complete within the bounded timeout.
    #[error("publish timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
