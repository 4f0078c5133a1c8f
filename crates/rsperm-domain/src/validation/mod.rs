//! Input validation for permission keys, context keys and group names.
//!
//! Validation happens at the mutation boundary, before a node is
//! constructed. Resolution itself is total and never validates: a holder
//! whose stored nodes predate a rule change must still resolve.

use thiserror::Error;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Permission key is empty or contains illegal characters.
    #[error("invalid permission key {key:?}: {reason}")]
    InvalidPermissionKey { key: String, reason: String },

    /// Context key is empty or contains illegal characters.
    #[error("invalid context key {key:?}: {reason}")]
    InvalidContextKey { key: String, reason: String },

    /// Group name is empty or contains illegal characters.
    #[error("invalid group name {name:?}: {reason}")]
    InvalidGroupName { name: String, reason: String },
}

/// Result type for validation operations.
pub type ValidationResult = Result<(), ValidationError>;

/// Characters that may never appear in a permission key.
///
/// Whitespace would make keys ambiguous in command input and the dollar
/// sign is reserved for server-side expansion in some front ends.
const FORBIDDEN_KEY_CHARS: &[char] = &[' ', '\t', '\n', '\r', '"', '$'];

/// Validates a permission key (also used for the structured sub-kind
/// encodings, which share the same character set).
pub fn validate_permission_key(key: &str) -> ValidationResult {
    if key.trim().is_empty() {
        return Err(ValidationError::InvalidPermissionKey {
            key: key.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if let Some(c) = key.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c)) {
        return Err(ValidationError::InvalidPermissionKey {
            key: key.to_string(),
            reason: format!("contains forbidden character {c:?}"),
        });
    }
    Ok(())
}

/// Validates a context key. Context keys are identifiers like `server` or
/// `world`; values are unrestricted.
pub fn validate_context_key(key: &str) -> ValidationResult {
    if key.trim().is_empty() {
        return Err(ValidationError::InvalidContextKey {
            key: key.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidContextKey {
            key: key.to_string(),
            reason: "must be alphanumeric with optional '-' or '_'".to_string(),
        });
    }
    Ok(())
}

/// Validates a group name. Group names double as holder identifiers and as
/// path components in flat-file storage backends, so the character set is
/// deliberately narrow.
pub fn validate_group_name(name: &str) -> ValidationResult {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidGroupName {
            name: name.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidGroupName {
            name: name.to_string(),
            reason: "must be alphanumeric with optional '-' or '_'".to_string(),
        });
    }
    Ok(())
}
