//! The inheritance graph walk.
//!
//! Flattens a holder's inheritance closure into a precedence-ordered node
//! list. The ordering is the precedence law the calculator relies on: the
//! origin holder's own nodes first, then each inherited holder's nodes in
//! traversal order, so a first-write-wins fold gives own nodes priority
//! over inherited ones and closer ancestors priority over farther ones.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::model::{ContextSet, Holder, HolderId, Node};

use super::config::ResolverConfig;
use super::traits::HolderIndex;

/// A node annotated with its owning holder, as produced by the walk.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub node: Node,
    pub owner: HolderId,
    /// The owning holder's inheritance weight at walk time, used by the
    /// calculator to break meta/prefix/suffix ties.
    pub owner_weight: i64,
}

/// The flattened result of an inheritance walk.
#[derive(Debug, Clone)]
pub struct InheritanceList {
    /// Precedence-ordered nodes of every holder in the closure.
    pub nodes: Vec<ResolvedNode>,
    /// Every holder identity the walk touched, origin included. This is
    /// the cache entry's dependency set: a mutation of any of these
    /// invalidates resolutions built from this list.
    pub visited: HashSet<HolderId>,
}

/// Walks the directed inheritance graph of holders.
#[derive(Debug, Clone, Default)]
pub struct InheritanceResolver {
    config: ResolverConfig,
}

impl InheritanceResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Computes the ordered closure of holders reachable from `origin` via
    /// inheritance nodes whose context filters match `query`, flattened
    /// into a single node list.
    ///
    /// Guarantees:
    /// - terminates on cyclic graphs (visited-set guard, marked before
    ///   recursing);
    /// - dangling references (group absent from the index) are skipped
    ///   silently;
    /// - a user with no inheritance node at all implicitly inherits the
    ///   configured default group.
    pub fn resolve_inheritance_list(
        &self,
        index: &dyn HolderIndex,
        origin: &Holder,
        query: &ContextSet,
        now: DateTime<Utc>,
    ) -> InheritanceList {
        let mut visited = HashSet::new();
        visited.insert(origin.id().clone());
        let mut nodes = Vec::new();

        self.collect(index, origin, query, now, 0, &mut visited, &mut nodes);

        // Fallback membership: every user belongs to at least one group.
        if origin.id().is_user() && !origin.has_inheritance_node(now) {
            if let Some(default) = &self.config.default_group {
                let default_id = HolderId::group(default);
                if !visited.contains(&default_id) {
                    if let Some(group) = index.holder(&default_id) {
                        visited.insert(default_id);
                        self.collect(index, &group, query, now, 1, &mut visited, &mut nodes);
                    }
                }
            }
        }

        InheritanceList { nodes, visited }
    }

    /// Appends `holder`'s own nodes, then recurses into its matching
    /// inheritance edges in precedence order.
    fn collect(
        &self,
        index: &dyn HolderIndex,
        holder: &Holder,
        query: &ContextSet,
        now: DateTime<Utc>,
        depth: u32,
        visited: &mut HashSet<HolderId>,
        out: &mut Vec<ResolvedNode>,
    ) {
        let owner_weight = holder.weight(now);
        for node in holder.nodes() {
            out.push(ResolvedNode {
                node: node.clone(),
                owner: holder.id().clone(),
                owner_weight,
            });
        }

        if depth >= self.config.max_depth {
            trace!(holder = %holder.id(), depth, "max depth reached, not expanding");
            return;
        }

        for target in self.matched_edges(index, holder, query, now) {
            let target_id = target.id().clone();
            if !visited.insert(target_id) {
                // Second encounter of a holder in this walk: cycle or
                // diamond. Its nodes are already in the list.
                continue;
            }
            self.collect(index, &target, query, now, depth + 1, visited, out);
        }
    }

    /// Collects the holder's inheritance edges that apply under `query`,
    /// resolved against the index and ordered by descending target-group
    /// weight, then descending node priority, then insertion order.
    fn matched_edges(
        &self,
        index: &dyn HolderIndex,
        holder: &Holder,
        query: &ContextSet,
        now: DateTime<Utc>,
    ) -> Vec<Arc<Holder>> {
        let mut edges: Vec<(i64, i64, Arc<Holder>)> = Vec::new();
        for (node, group) in holder.inheritance_nodes(now) {
            // A negated inheritance node revokes the membership grant; it
            // still resolves as a false `group.<name>` permission, but it
            // is not an edge.
            if !node.value() || !node.context().satisfied_by(query) {
                continue;
            }
            let target_id = HolderId::group(group);
            let Some(target) = index.holder(&target_id) else {
                trace!(holder = %holder.id(), group, "skipping dangling inheritance reference");
                continue;
            };
            edges.push((target.weight(now), node.priority(), target));
        }
        // Stable sort keeps insertion order as the final tie-break.
        edges.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        edges.into_iter().map(|(_, _, target)| target).collect()
    }
}
