//! Core data model: context sets, nodes, holders and audit entries.

mod actionlog;
mod context;
mod holder;
mod node;

#[cfg(test)]
mod context_proptest;

pub use actionlog::{LogEntry, LogEntryBuilder, LoggedTarget, TargetKind};
pub use context::{ContextSet, ContextSetBuilder};
pub use holder::{Holder, HolderId, MutateResult};
pub use node::{Node, NodeBuilder, NodeKind};
