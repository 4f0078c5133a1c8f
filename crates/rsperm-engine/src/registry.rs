//! The resident holder registry.
//!
//! Resolution is CPU-bound and never touches storage, so every holder a
//! walk may need must already be in memory: groups are loaded eagerly at
//! startup, users on demand. The registry stores immutable snapshots
//! behind `Arc`; mutations swap in a fresh snapshot rather than mutating
//! in place, so concurrent readers always see a consistent holder.

use std::sync::Arc;

use dashmap::DashMap;

use rsperm_domain::model::{Holder, HolderId};
use rsperm_domain::resolver::HolderIndex;

/// Concurrent map of resident holder snapshots.
#[derive(Debug, Default)]
pub struct ResidentRegistry {
    holders: DashMap<HolderId, Arc<Holder>>,
}

impl ResidentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resident snapshot, if any.
    pub fn get(&self, id: &HolderId) -> Option<Arc<Holder>> {
        self.holders.get(id).map(|h| Arc::clone(h.value()))
    }

    /// Returns true if the holder is resident.
    pub fn contains(&self, id: &HolderId) -> bool {
        self.holders.contains_key(id)
    }

    /// Makes a holder snapshot resident, replacing any previous snapshot.
    pub fn insert(&self, holder: Arc<Holder>) {
        self.holders.insert(holder.id().clone(), holder);
    }

    /// Evicts a holder.
    pub fn remove(&self, id: &HolderId) -> Option<Arc<Holder>> {
        self.holders.remove(id).map(|(_, h)| h)
    }

    /// Ids of all resident holders.
    pub fn ids(&self) -> Vec<HolderId> {
        self.holders.iter().map(|h| h.key().clone()).collect()
    }

    /// Ids of all resident groups.
    pub fn group_ids(&self) -> Vec<HolderId> {
        self.holders
            .iter()
            .filter(|h| h.key().is_group())
            .map(|h| h.key().clone())
            .collect()
    }

    /// Number of resident holders.
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

impl HolderIndex for ResidentRegistry {
    fn holder(&self, id: &HolderId) -> Option<Arc<Holder>> {
        self.get(id)
    }
}
