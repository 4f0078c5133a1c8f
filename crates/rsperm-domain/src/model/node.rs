//! Permission nodes: atomic, immutable permission facts.
//!
//! A node pairs a permission key with a boolean value, a context filter, an
//! optional expiry and a priority. Structured sub-kinds (group inheritance,
//! prefix/suffix, meta, weight, display name) share the same envelope and
//! are recognized from the key's encoding, so the calculator can fold all
//! kinds uniformly and special-case only the tag.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ContextSet;
use crate::validation::{validate_permission_key, ValidationError};

/// The structured sub-kind of a node, derived from its key encoding:
///
/// - `group.<name>`: inherit all nodes of the named group
/// - `prefix.<weight>.<text>` / `suffix.<weight>.<text>`: chat decoration
/// - `meta.<key>.<value>`: arbitrary key/value metadata
/// - `weight.<n>`: the owning group's inheritance weight
/// - `displayname.<name>`: the owning holder's display name
///
/// Any other key is a plain permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A plain permission key.
    Permission,
    /// Inherit all nodes of the referenced group.
    Inheritance { group: String },
    /// A chat prefix with its own weight.
    Prefix { weight: i64, text: String },
    /// A chat suffix with its own weight.
    Suffix { weight: i64, text: String },
    /// An arbitrary meta key/value pair.
    Meta { key: String, value: String },
    /// The owning group's inheritance weight.
    Weight(i64),
    /// The owning holder's display name.
    DisplayName(String),
}

impl NodeKind {
    /// Classifies a canonical key string.
    ///
    /// Markers match case-insensitively; payload casing is preserved for
    /// the kinds that carry display text (prefix/suffix text, meta value,
    /// display name). Encodings that fail to parse (e.g.
    /// `prefix.notanumber.x`) fall back to `Permission`: stored data must
    /// never make resolution fail.
    pub fn parse(key: &str) -> NodeKind {
        if let Some(group) = strip_marker(key, "group.") {
            if !group.is_empty() {
                return NodeKind::Inheritance {
                    group: group.to_ascii_lowercase(),
                };
            }
        }
        if let Some(rest) = strip_marker(key, "weight.") {
            if let Ok(weight) = rest.parse::<i64>() {
                return NodeKind::Weight(weight);
            }
        }
        if let Some(name) = strip_marker(key, "displayname.") {
            if !name.is_empty() {
                return NodeKind::DisplayName(name.to_string());
            }
        }
        if let Some(kind) = parse_chat_meta(key, "prefix.") {
            return kind;
        }
        if let Some(kind) = parse_chat_meta(key, "suffix.") {
            return kind;
        }
        if let Some(rest) = strip_marker(key, "meta.") {
            if let Some((meta_key, meta_value)) = rest.split_once('.') {
                if !meta_key.is_empty() {
                    return NodeKind::Meta {
                        key: meta_key.to_ascii_lowercase(),
                        value: meta_value.to_string(),
                    };
                }
            }
        }
        NodeKind::Permission
    }
}

/// Strips a structured-kind marker case-insensitively, preserving the
/// tail's casing.
fn strip_marker<'a>(key: &'a str, marker: &str) -> Option<&'a str> {
    let head = key.get(..marker.len())?;
    if head.eq_ignore_ascii_case(marker) {
        key.get(marker.len()..)
    } else {
        None
    }
}

fn parse_chat_meta(key: &str, marker: &str) -> Option<NodeKind> {
    let rest = strip_marker(key, marker)?;
    let (weight, text) = rest.split_once('.')?;
    let weight = weight.parse::<i64>().ok()?;
    let text = text.to_string();
    Some(if marker == "prefix." {
        NodeKind::Prefix { weight, text }
    } else {
        NodeKind::Suffix { weight, text }
    })
}

/// An atomic permission fact.
///
/// Two nodes are equal when key, value and context match; expiry and
/// priority are tie-break metadata, not identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    key: String,
    kind: NodeKind,
    value: bool,
    context: ContextSet,
    expiry: Option<DateTime<Utc>>,
    priority: i64,
}

impl Node {
    /// Starts building a node for the given key.
    pub fn builder(key: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(key)
    }

    /// Shorthand: a true permission node in the global context.
    pub fn permission(key: impl Into<String>) -> Result<Node, ValidationError> {
        Self::builder(key).build()
    }

    /// Shorthand: a group-inheritance node in the global context.
    pub fn inheritance(group: impl AsRef<str>) -> Result<Node, ValidationError> {
        Self::builder(format!("group.{}", group.as_ref().to_ascii_lowercase())).build()
    }

    /// The canonical key string.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The parsed structured kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The boolean value of the fact.
    pub fn value(&self) -> bool {
        self.value
    }

    /// The context filter this node applies under.
    pub fn context(&self) -> &ContextSet {
        &self.context
    }

    /// The absolute expiry instant, if any.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Tie-break priority between nodes with identical key and context.
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Returns true once the expiry instant has passed. Expired nodes are
    /// filtered lazily by every read path; storage may still hold them.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|at| at <= now)
    }

    /// Returns the implied prefix when this key is a wildcard
    /// (`foo.*` -> `foo`, bare `*` -> empty prefix), or `None`.
    pub fn wildcard_prefix(&self) -> Option<&str> {
        if self.key == "*" {
            Some("")
        } else {
            self.key.strip_suffix(".*")
        }
    }

    /// Returns true if this node's key and context match another node's.
    /// Used by unset operations, which ignore value and metadata.
    pub fn matches_key_context(&self, key: &str, context: &ContextSet) -> bool {
        self.key.eq_ignore_ascii_case(key) && self.context == *context
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value && self.context == other.context
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.value.hash(state);
        self.context.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.key, self.value, self.context)
    }
}

/// Builder for [`Node`]. Validates the key at `build` time; the built node
/// is immutable.
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    key: String,
    value: bool,
    context: ContextSet,
    expiry: Option<DateTime<Utc>>,
    priority: i64,
}

impl NodeBuilder {
    fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: true,
            context: ContextSet::empty(),
            expiry: None,
            priority: 0,
        }
    }

    /// Sets the boolean value (default true).
    pub fn value(mut self, value: bool) -> Self {
        self.value = value;
        self
    }

    /// Sets the context filter (default global).
    pub fn context(mut self, context: ContextSet) -> Self {
        self.context = context;
        self
    }

    /// Sets an absolute expiry instant.
    pub fn expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expiry = Some(at);
        self
    }

    /// Sets the tie-break priority (default 0).
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Validates and builds the node. Permission keys are lowercased for
    /// canonical lookup; kinds carrying display text keep the original
    /// key so the payload's casing survives round-trips.
    pub fn build(self) -> Result<Node, ValidationError> {
        validate_permission_key(&self.key)?;
        let kind = NodeKind::parse(&self.key);
        let key = match kind {
            NodeKind::Prefix { .. }
            | NodeKind::Suffix { .. }
            | NodeKind::Meta { .. }
            | NodeKind::DisplayName(_) => self.key,
            _ => self.key.to_ascii_lowercase(),
        };
        Ok(Node {
            key,
            kind,
            value: self.value,
            context: self.context,
            expiry: self.expiry,
            priority: self.priority,
        })
    }
}
