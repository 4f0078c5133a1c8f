//! Permission holders: users and groups owning collections of nodes.
//!
//! Holders are identified by stable ids ([`HolderId`]) rather than object
//! references; the inheritance graph is an id graph, which keeps holders
//! serializable and cycle detection cheap. Every mutation bumps the
//! holder's version counter, the stamp the resolution cache validates
//! entries against.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ContextSet, Node, NodeKind};

/// Stable identity of a permission holder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HolderId {
    /// A user, identified by UUID.
    User(Uuid),
    /// A group, identified by lowercase name.
    Group(String),
}

impl HolderId {
    /// Builds a group id, normalizing the name.
    pub fn group(name: impl AsRef<str>) -> Self {
        HolderId::Group(name.as_ref().to_ascii_lowercase())
    }

    /// Returns true for user ids.
    pub fn is_user(&self) -> bool {
        matches!(self, HolderId::User(_))
    }

    /// Returns true for group ids.
    pub fn is_group(&self) -> bool {
        matches!(self, HolderId::Group(_))
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolderId::User(id) => write!(f, "user:{id}"),
            HolderId::Group(name) => write!(f, "group:{name}"),
        }
    }
}

/// Reports whether a mutation changed anything. Callers skip the
/// save/invalidate/publish pipeline when nothing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutateResult {
    /// The node collection changed.
    Changed,
    /// The mutation was a no-op (node already present / already absent).
    Unchanged,
}

impl MutateResult {
    /// True if the mutation changed the holder.
    pub fn changed(self) -> bool {
        matches!(self, MutateResult::Changed)
    }
}

/// An entity owning permission nodes: a user or a group.
///
/// Nodes are kept in insertion order; that order is the documented
/// tie-break of last resort during resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holder {
    id: HolderId,
    nodes: Vec<Node>,
    /// Cached exact username, users only.
    username: Option<String>,
    /// Stored primary group, users only.
    primary_group: Option<String>,
    /// Monotonic mutation counter; the cache stamp.
    version: u64,
}

impl Holder {
    /// Creates an empty user holder.
    pub fn new_user(id: Uuid) -> Self {
        Self {
            id: HolderId::User(id),
            nodes: Vec::new(),
            username: None,
            primary_group: None,
            version: 0,
        }
    }

    /// Creates an empty group holder.
    pub fn new_group(name: impl AsRef<str>) -> Self {
        Self {
            id: HolderId::group(name),
            nodes: Vec::new(),
            username: None,
            primary_group: None,
            version: 0,
        }
    }

    /// The holder's stable identity.
    pub fn id(&self) -> &HolderId {
        &self.id
    }

    /// The group name, for group holders.
    pub fn group_name(&self) -> Option<&str> {
        match &self.id {
            HolderId::Group(name) => Some(name),
            HolderId::User(_) => None,
        }
    }

    /// The holder's nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The cached exact username, users only.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Records the exact username observed at login.
    pub fn set_username(&mut self, name: impl Into<String>) {
        self.username = Some(name.into());
        self.version += 1;
    }

    /// The stored primary group, users only.
    pub fn primary_group(&self) -> Option<&str> {
        self.primary_group.as_deref()
    }

    /// Sets the stored primary group.
    pub fn set_primary_group(&mut self, group: impl AsRef<str>) {
        self.primary_group = Some(group.as_ref().to_ascii_lowercase());
        self.version += 1;
    }

    /// The holder's current mutation count.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The group's inheritance weight: the maximum of its unexpired weight
    /// nodes, defaulting to 0. Users have no weight of their own; their
    /// explicit nodes always outrank inherited ones regardless.
    pub fn weight(&self, now: DateTime<Utc>) -> i64 {
        self.nodes
            .iter()
            .filter(|n| !n.is_expired(now))
            .filter_map(|n| match n.kind() {
                NodeKind::Weight(w) => Some(*w),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Iterates the holder's unexpired inheritance nodes.
    pub fn inheritance_nodes(
        &self,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = (&Node, &str)> + '_ {
        self.nodes
            .iter()
            .filter(move |n| !n.is_expired(now))
            .filter_map(|n| match n.kind() {
                NodeKind::Inheritance { group } => Some((n, group.as_str())),
                _ => None,
            })
    }

    /// True if the holder owns any unexpired inheritance node, in any
    /// context. Users failing this check fall back to the default group.
    pub fn has_inheritance_node(&self, now: DateTime<Utc>) -> bool {
        self.inheritance_nodes(now).next().is_some()
    }

    /// Adds a node, replacing any equal node (same key, value, context)
    /// so the collection never accumulates duplicates. Replacement still
    /// counts as a change when expiry or priority differ, since those
    /// affect resolution even though they are outside node identity.
    pub fn set_node(&mut self, node: Node) -> MutateResult {
        if let Some(existing) = self.nodes.iter_mut().find(|n| **n == node) {
            let refreshed =
                existing.expiry() != node.expiry() || existing.priority() != node.priority();
            if !refreshed {
                return MutateResult::Unchanged;
            }
            *existing = node;
        } else {
            self.nodes.push(node);
        }
        self.version += 1;
        MutateResult::Changed
    }

    /// Removes every node matching the key and context, ignoring value,
    /// expiry and priority.
    pub fn unset_node(&mut self, key: &str, context: &ContextSet) -> MutateResult {
        let before = self.nodes.len();
        self.nodes.retain(|n| !n.matches_key_context(key, context));
        if self.nodes.len() == before {
            return MutateResult::Unchanged;
        }
        self.version += 1;
        MutateResult::Changed
    }

    /// Removes every node. Returns how many were dropped.
    pub fn clear_nodes(&mut self) -> usize {
        let dropped = self.nodes.len();
        if dropped > 0 {
            self.nodes.clear();
            self.version += 1;
        }
        dropped
    }

    /// Removes every node whose context equals the given one exactly.
    pub fn clear_nodes_in_context(&mut self, context: &ContextSet) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.context() != context);
        let dropped = before - self.nodes.len();
        if dropped > 0 {
            self.version += 1;
        }
        dropped
    }

    /// Drops expired nodes from the collection. Read paths filter lazily
    /// and never require this; it exists for the background sweep.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|n| !n.is_expired(now));
        let dropped = before - self.nodes.len();
        if dropped > 0 {
            self.version += 1;
        }
        dropped
    }
}
