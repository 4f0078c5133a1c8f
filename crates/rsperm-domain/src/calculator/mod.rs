//! The permission calculator: folds a precedence-ordered node list into a
//! final permission view for one query context.
//!
//! Resolution is a pure function of (node list, query context, clock
//! instant) with no hidden state, which is what makes cached results safe
//! to share across concurrent readers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{ContextSet, NodeKind};
use crate::resolver::ResolvedNode;

/// Outcome of a single permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    True,
    False,
    /// No node (exact or wildcard) covers the permission.
    Undefined,
}

impl Tristate {
    /// Collapses to a boolean, treating `Undefined` as false.
    pub fn as_bool(self) -> bool {
        matches!(self, Tristate::True)
    }

    /// Returns the defined value, if any.
    pub fn value(self) -> Option<bool> {
        match self {
            Tristate::True => Some(true),
            Tristate::False => Some(false),
            Tristate::Undefined => None,
        }
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

/// A selected chat-meta entry (prefix or suffix) with its selection rank.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChatMeta {
    text: String,
    /// (kind weight, node priority, owner weight); higher wins, earlier
    /// list position wins ties.
    rank: (i64, i64, i64),
}

/// A selected meta entry with its selection rank.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MetaCandidate {
    value: String,
    /// (node priority, owner weight); higher wins, earlier wins ties.
    rank: (i64, i64),
}

/// The resolved permission view for one (holder, context) pair.
///
/// Immutable once built; shared behind `Arc` by the cache.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPermissions {
    /// Exact permission key -> value, first-write-wins.
    permissions: HashMap<String, bool>,
    /// Wildcard prefixes (`essentials.*` stored as `essentials`, bare `*`
    /// as the empty string) -> value; sorted longest-first after the fold.
    wildcards: Vec<(String, bool)>,
    meta: HashMap<String, MetaCandidate>,
    prefix: Option<ChatMeta>,
    suffix: Option<ChatMeta>,
}

impl ResolvedPermissions {
    /// Checks a permission key against the resolved view: exact entry
    /// first, then the longest matching wildcard prefix.
    pub fn check(&self, permission: &str) -> Tristate {
        let key = permission.to_ascii_lowercase();
        if let Some(value) = self.permissions.get(&key) {
            return (*value).into();
        }
        for (prefix, value) in &self.wildcards {
            if wildcard_covers(prefix, &key) {
                return (*value).into();
            }
        }
        Tristate::Undefined
    }

    /// The flattened exact permission map.
    pub fn permission_map(&self) -> &HashMap<String, bool> {
        &self.permissions
    }

    /// The highest-precedence meta value for a key, if any.
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta
            .get(&key.to_ascii_lowercase())
            .map(|c| c.value.as_str())
    }

    /// The selected chat prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_ref().map(|p| p.text.as_str())
    }

    /// The selected chat suffix, if any.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_ref().map(|s| s.text.as_str())
    }

    /// Number of exact entries (wildcards excluded).
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.wildcards.is_empty()
    }
}

/// True when a wildcard prefix covers the key: `essentials` covers
/// `essentials.spawn` (but not `essentialsx`), the empty prefix (bare `*`)
/// covers everything.
fn wildcard_covers(prefix: &str, key: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Folds precedence-ordered node lists into [`ResolvedPermissions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionCalculator;

impl PermissionCalculator {
    /// Resolves the node list against a query context.
    ///
    /// The list must already be precedence-ordered (the resolver's
    /// contract); within it, the first matching write for a permission key
    /// is authoritative and later, lower-precedence writes never overwrite
    /// it. Expired and context-mismatched nodes are skipped.
    pub fn resolve(
        nodes: &[ResolvedNode],
        query: &ContextSet,
        now: DateTime<Utc>,
    ) -> ResolvedPermissions {
        let mut out = ResolvedPermissions::default();

        for resolved in nodes {
            let node = &resolved.node;
            if node.is_expired(now) || !node.context().satisfied_by(query) {
                continue;
            }

            match node.kind() {
                NodeKind::Permission | NodeKind::Inheritance { .. } => {
                    out.permissions
                        .entry(node.key().to_string())
                        .or_insert_with(|| node.value());
                    if let Some(prefix) = node.wildcard_prefix() {
                        if !out.wildcards.iter().any(|(p, _)| p == prefix) {
                            out.wildcards.push((prefix.to_string(), node.value()));
                        }
                    }
                }
                NodeKind::Meta { key, value } => {
                    if !node.value() {
                        continue;
                    }
                    let rank = (node.priority(), resolved.owner_weight);
                    match out.meta.get_mut(key) {
                        Some(current) if current.rank >= rank => {}
                        Some(current) => {
                            *current = MetaCandidate {
                                value: value.clone(),
                                rank,
                            };
                        }
                        None => {
                            out.meta.insert(
                                key.clone(),
                                MetaCandidate {
                                    value: value.clone(),
                                    rank,
                                },
                            );
                        }
                    }
                }
                NodeKind::Prefix { weight, text } => {
                    if node.value() {
                        let candidate = ChatMeta {
                            text: text.clone(),
                            rank: (*weight, node.priority(), resolved.owner_weight),
                        };
                        replace_if_higher(&mut out.prefix, candidate);
                    }
                }
                NodeKind::Suffix { weight, text } => {
                    if node.value() {
                        let candidate = ChatMeta {
                            text: text.clone(),
                            rank: (*weight, node.priority(), resolved.owner_weight),
                        };
                        replace_if_higher(&mut out.suffix, candidate);
                    }
                }
                // Structural kinds: consumed by the resolver (weight) or by
                // display layers (displayname); nothing to flatten.
                NodeKind::Weight(_) | NodeKind::DisplayName(_) => {}
            }
        }

        // Longest prefix first so `check` finds the most specific wildcard.
        out.wildcards
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

/// Strictly-higher rank replaces; equal rank keeps the earlier candidate
/// (list order is the last tie-break).
fn replace_if_higher(slot: &mut Option<ChatMeta>, candidate: ChatMeta) {
    match slot {
        Some(current) if current.rank >= candidate.rank => {}
        _ => *slot = Some(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HolderId, Node};

    fn entry(node: Node, owner_weight: i64) -> ResolvedNode {
        ResolvedNode {
            node,
            owner: HolderId::group("test"),
            owner_weight,
        }
    }

    fn plain(key: &str, value: bool) -> ResolvedNode {
        entry(Node::builder(key).value(value).build().unwrap(), 0)
    }

    #[test]
    fn test_first_write_wins() {
        // Arrange - two conflicting writes; the earlier one is from the
        // higher-precedence holder by the resolver's ordering contract.
        let nodes = vec![plain("perm.a", false), plain("perm.a", true)];

        // Act
        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());

        // Assert
        assert_eq!(resolved.check("perm.a"), Tristate::False);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_context_mismatch_skipped() {
        let nether_only = entry(
            Node::builder("perm.a")
                .context(ContextSet::of("world", "nether"))
                .build()
                .unwrap(),
            0,
        );
        let nodes = vec![nether_only];

        let global = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());
        let nether =
            PermissionCalculator::resolve(&nodes, &ContextSet::of("world", "nether"), Utc::now());

        assert_eq!(global.check("perm.a"), Tristate::Undefined);
        assert_eq!(nether.check("perm.a"), Tristate::True);
    }

    #[test]
    fn test_expired_node_skipped() {
        let now = Utc::now();
        let nodes = vec![entry(
            Node::builder("perm.a")
                .expiry(now - chrono::Duration::seconds(1))
                .build()
                .unwrap(),
            0,
        )];

        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), now);
        assert_eq!(resolved.check("perm.a"), Tristate::Undefined);
    }

    #[test]
    fn test_wildcard_implies_prefixed_permissions() {
        let nodes = vec![plain("essentials.*", true)];
        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());

        assert_eq!(resolved.check("essentials.spawn"), Tristate::True);
        assert_eq!(resolved.check("essentials.home.set"), Tristate::True);
        // Sibling key sharing only the string prefix is not implied.
        assert_eq!(resolved.check("essentialsx.spawn"), Tristate::Undefined);
        assert_eq!(resolved.check("other.perm"), Tristate::Undefined);
    }

    #[test]
    fn test_exact_node_beats_wildcard() {
        let nodes = vec![plain("essentials.spawn", false), plain("essentials.*", true)];
        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());

        assert_eq!(resolved.check("essentials.spawn"), Tristate::False);
        assert_eq!(resolved.check("essentials.home"), Tristate::True);
    }

    #[test]
    fn test_longest_wildcard_wins() {
        let nodes = vec![plain("*", true), plain("essentials.admin.*", false)];
        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());

        assert_eq!(resolved.check("essentials.admin.ban"), Tristate::False);
        assert_eq!(resolved.check("anything.else"), Tristate::True);
    }

    #[test]
    fn test_wildcard_first_write_wins_per_prefix() {
        let nodes = vec![plain("essentials.*", false), plain("essentials.*", true)];
        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());

        assert_eq!(resolved.check("essentials.spawn"), Tristate::False);
    }

    #[test]
    fn test_membership_key_queryable_as_permission() {
        let nodes = vec![entry(Node::inheritance("admin").unwrap(), 0)];
        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());

        assert_eq!(resolved.check("group.admin"), Tristate::True);
    }

    #[test]
    fn test_meta_precedence_priority_then_owner_weight() {
        // Arrange - later entries with higher priority/owner weight must
        // displace earlier ones; ties keep the earlier (closer) one.
        let low = entry(Node::permission("meta.rank.junior").unwrap(), 10);
        let high_priority = entry(
            Node::builder("meta.rank.senior")
                .priority(5)
                .build()
                .unwrap(),
            0,
        );
        let nodes = vec![low, high_priority];

        // Act
        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());

        // Assert
        assert_eq!(resolved.meta_value("rank"), Some("senior"));
    }

    #[test]
    fn test_meta_tie_keeps_earlier_entry() {
        let first = entry(Node::permission("meta.rank.first").unwrap(), 0);
        let second = entry(Node::permission("meta.rank.second").unwrap(), 0);
        let resolved =
            PermissionCalculator::resolve(&[first, second], &ContextSet::empty(), Utc::now());

        assert_eq!(resolved.meta_value("rank"), Some("first"));
    }

    #[test]
    fn test_prefix_selected_by_kind_weight() {
        let light = entry(Node::permission("prefix.10.[Member]").unwrap(), 100);
        let heavy = entry(Node::permission("prefix.100.[Admin]").unwrap(), 0);
        let resolved =
            PermissionCalculator::resolve(&[light, heavy], &ContextSet::empty(), Utc::now());

        assert_eq!(resolved.prefix(), Some("[Admin]"));
    }

    #[test]
    fn test_suffix_independent_of_prefix() {
        let nodes = vec![
            entry(Node::permission("prefix.1.[P]").unwrap(), 0),
            entry(Node::permission("suffix.1.~star").unwrap(), 0),
        ];
        let resolved = PermissionCalculator::resolve(&nodes, &ContextSet::empty(), Utc::now());

        assert_eq!(resolved.prefix(), Some("[P]"));
        assert_eq!(resolved.suffix(), Some("~star"));
    }

    #[test]
    fn test_empty_input_resolves_empty() {
        let resolved = PermissionCalculator::resolve(&[], &ContextSet::empty(), Utc::now());
        assert!(resolved.is_empty());
        assert_eq!(resolved.check("anything"), Tristate::Undefined);
    }

    #[test]
    fn test_tristate_conversions() {
        assert_eq!(Tristate::True.value(), Some(true));
        assert_eq!(Tristate::False.value(), Some(false));
        assert_eq!(Tristate::Undefined.value(), None);
        assert!(Tristate::True.as_bool());
        assert!(!Tristate::Undefined.as_bool());
    }
}
