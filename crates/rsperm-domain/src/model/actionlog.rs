//! Action log entries: immutable audit records of permission mutations.
//!
//! Entries are informational only; they never mutate permission state.
//! They round-trip exactly through the messenger so cooperating processes
//! can display a live shared audit feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::HolderId;

/// The kind of holder an action was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    User,
    Group,
}

/// The holder an action was applied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedTarget {
    /// Stable identity rendering: UUID for users, name for groups.
    pub id: String,
    pub kind: TargetKind,
}

impl From<&HolderId> for LoggedTarget {
    fn from(id: &HolderId) -> Self {
        match id {
            HolderId::User(uuid) => LoggedTarget {
                id: uuid.to_string(),
                kind: TargetKind::User,
            },
            HolderId::Group(name) => LoggedTarget {
                id: name.clone(),
                kind: TargetKind::Group,
            },
        }
    }
}

/// An immutable audit record: who did what to whom, when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Identity of the acting user.
    pub actor: Uuid,
    /// Display name of the acting user at the time of the action.
    pub actor_name: String,
    /// The holder acted upon.
    pub target: LoggedTarget,
    /// Action verb, e.g. "permission set" or "parent remove".
    pub action: String,
    /// Ordered action parameters as entered.
    pub args: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Starts building an entry for the given actor.
    pub fn builder(actor: Uuid, actor_name: impl Into<String>) -> LogEntryBuilder {
        LogEntryBuilder {
            actor,
            actor_name: actor_name.into(),
            target: None,
            action: String::new(),
            args: Vec::new(),
        }
    }
}

/// Builder for [`LogEntry`]. Stamps the timestamp at `build` time.
#[derive(Debug, Clone)]
pub struct LogEntryBuilder {
    actor: Uuid,
    actor_name: String,
    target: Option<LoggedTarget>,
    action: String,
    args: Vec<String>,
}

impl LogEntryBuilder {
    /// Sets the holder acted upon.
    pub fn target(mut self, id: &HolderId) -> Self {
        self.target = Some(LoggedTarget::from(id));
        self
    }

    /// Sets the action verb.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Appends an action parameter.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Finishes the entry. Falls back to a group target named "unknown"
    /// when none was set; callers always set one in practice.
    pub fn build(self) -> LogEntry {
        LogEntry {
            actor: self.actor,
            actor_name: self.actor_name,
            target: self.target.unwrap_or(LoggedTarget {
                id: "unknown".to_string(),
                kind: TargetKind::Group,
            }),
            action: self.action,
            args: self.args,
            timestamp: Utc::now(),
        }
    }
}
