//! The cross-process message model.
//!
//! Every message carries its own UUID. Receivers deduplicate on it, which
//! makes handlers idempotent under the transport's at-most-once,
//! unordered delivery: applying the same invalidation twice is a no-op.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use rsperm_domain::model::LogEntry;

/// A mutation notification or audit record broadcast between cooperating
/// processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A specific user's node data changed remotely. Receivers invalidate
    /// that user's cache entries and may eagerly reload from storage.
    UserUpdate { id: Uuid, user_id: Uuid },

    /// An immutable action-log record for display/audit. Informational
    /// only; never mutates permission state.
    Log { id: Uuid, entry: LogEntry },

    /// Extension point for out-of-tree message kinds.
    Custom {
        id: Uuid,
        channel: String,
        payload: Value,
    },
}

impl Message {
    /// Builds a user-update notification with a fresh message id.
    pub fn user_update(user_id: Uuid) -> Self {
        Message::UserUpdate {
            id: Uuid::new_v4(),
            user_id,
        }
    }

    /// Builds a log broadcast with a fresh message id.
    pub fn log(entry: LogEntry) -> Self {
        Message::Log {
            id: Uuid::new_v4(),
            entry,
        }
    }

    /// Builds a custom message with a fresh message id.
    pub fn custom(channel: impl Into<String>, payload: Value) -> Self {
        Message::Custom {
            id: Uuid::new_v4(),
            channel: channel.into(),
            payload,
        }
    }

    /// The message's own id, used for idempotent handling.
    pub fn id(&self) -> Uuid {
        match self {
            Message::UserUpdate { id, .. } => *id,
            Message::Log { id, .. } => *id,
            Message::Custom { id, .. } => *id,
        }
    }
}
