//! JSON wire codec for messages.
//!
//! The transport is frame-oriented: one message per frame, encoded as a
//! single JSON object. Audit entries must round-trip exactly.

use crate::error::{SyncError, SyncResult};
use crate::message::Message;

/// Encodes a message into a wire frame.
pub fn encode(message: &Message) -> SyncResult<String> {
    serde_json::to_string(message).map_err(|e| SyncError::Encode {
        message: e.to_string(),
    })
}

/// Decodes a wire frame into a message.
pub fn decode(frame: &str) -> SyncResult<Message> {
    serde_json::from_str(frame).map_err(|e| SyncError::Decode {
        message: e.to_string(),
    })
}
