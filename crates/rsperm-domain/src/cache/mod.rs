//! Resolved-permission caching with version validation and precise
//! transitive invalidation.
//!
//! Permission checks happen on every request path, so repeated lookups for
//! the same (holder, context) pair must not re-walk the inheritance graph.
//! The cache uses Moka's async cache for lock-free concurrent reads with
//! TTL-based eviction, plus a DashMap secondary index from every holder a
//! resolution traversed to the cache keys built from it, so invalidating
//! a holder drops exactly the entries whose resolution could have seen its
//! nodes, in O(K) for K affected entries rather than a full scan.
//!
//! Stale entries are fenced twice: eagerly by invalidation, and lazily by
//! a per-holder version stamp checked on every hit. An entry built from
//! holder version N is never returned once the holder has moved past N,
//! even if an invalidation message was lost.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use moka::future::Cache;

use crate::calculator::ResolvedPermissions;
use crate::model::{ContextSet, HolderId};

/// Configuration for the resolution cache.
#[derive(Debug, Clone)]
pub struct ResolutionCacheConfig {
    /// Whether caching is enabled. When disabled, `get` always misses and
    /// `insert` is a no-op, so callers need no separate code path.
    pub enabled: bool,
    /// Maximum number of (holder, context) entries.
    pub max_capacity: u64,
    /// TTL for entries. Expiry here is a memory bound, not a correctness
    /// mechanism; correctness comes from invalidation + version stamps.
    pub time_to_live: Duration,
}

impl Default for ResolutionCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 50_000,
            time_to_live: Duration::from_secs(600),
        }
    }
}

impl ResolutionCacheConfig {
    /// Enables or disables caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = ttl;
        self
    }
}

/// Cache key: the holder a resolution was computed for, in one normalized
/// query context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub holder: HolderId,
    pub context: ContextSet,
}

impl CacheKey {
    pub fn new(holder: HolderId, context: ContextSet) -> Self {
        Self { holder, context }
    }
}

/// A cached resolution: the flattened permission view plus the provenance
/// needed to decide whether it is still valid.
#[derive(Debug)]
pub struct CachedResolution {
    /// The resolved permission view.
    pub permissions: ResolvedPermissions,
    /// Every holder the resolution traversed (origin included).
    pub dependencies: HashSet<HolderId>,
    /// The origin holder's version when this entry was built.
    pub origin_version: u64,
}

/// Concurrent resolved-permission cache.
///
/// Thread-safe; share behind `Arc` across tasks without external locking.
pub struct ResolutionCache {
    cache: Cache<CacheKey, Arc<CachedResolution>>,
    config: ResolutionCacheConfig,
    /// Secondary index: holder -> cache keys whose resolution traversed it.
    by_holder: DashMap<HolderId, HashSet<CacheKey>>,
    /// Current version stamp per resident holder.
    versions: DashMap<HolderId, u64>,
}

impl std::fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .field("holder_index_size", &self.by_holder.len())
            .finish()
    }
}

impl ResolutionCache {
    /// Creates a new cache with the given configuration.
    pub fn new(config: ResolutionCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.time_to_live)
            .build();
        Self {
            cache,
            config,
            by_holder: DashMap::new(),
            versions: DashMap::new(),
        }
    }

    /// Returns the configuration for this cache.
    pub fn config(&self) -> &ResolutionCacheConfig {
        &self.config
    }

    /// Records the current version of a holder. Called whenever a holder
    /// snapshot becomes resident or is replaced after a mutation.
    pub fn note_version(&self, holder: HolderId, version: u64) {
        self.versions.insert(holder, version);
    }

    /// Forgets a holder's version stamp (holder evicted or deleted).
    pub fn forget_version(&self, holder: &HolderId) {
        self.versions.remove(holder);
    }

    /// Retrieves a cached resolution, re-validating its version stamp.
    ///
    /// An entry whose origin holder has moved past the recorded version
    /// (or whose origin is no longer version-tracked at all) is treated
    /// as a miss and dropped.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<CachedResolution>> {
        if !self.config.enabled {
            return None;
        }
        let entry = self.cache.get(key).await;
        let entry = match entry {
            Some(entry) => {
                let current = self.versions.get(&key.holder).map(|v| *v);
                if current == Some(entry.origin_version) {
                    Some(entry)
                } else {
                    self.remove_entry(key, &entry).await;
                    None
                }
            }
            None => None,
        };
        if entry.is_some() {
            metrics::counter!("rsperm_resolution_cache_hits_total").increment(1);
        } else {
            metrics::counter!("rsperm_resolution_cache_misses_total").increment(1);
        }
        entry
    }

    /// Inserts a resolution, indexing it under every holder it depends on.
    pub async fn insert(&self, key: CacheKey, resolution: Arc<CachedResolution>) {
        if !self.config.enabled {
            return;
        }
        for dependency in &resolution.dependencies {
            self.by_holder
                .entry(dependency.clone())
                .or_default()
                .insert(key.clone());
        }
        self.cache.insert(key, resolution).await;
    }

    /// Invalidates every entry whose resolution traversed the holder:
    /// its own entries and, transitively, those of every holder that
    /// inherited through it.
    ///
    /// Uses atomic `remove()` on the index so no concurrent insert can
    /// slip keys in between reading and clearing the set.
    pub async fn invalidate(&self, holder: &HolderId) {
        if let Some((_, keys)) = self.by_holder.remove(holder) {
            for key in &keys {
                if let Some(entry) = self.cache.get(key).await {
                    self.remove_entry(key, &entry).await;
                } else {
                    self.cache.invalidate(key).await;
                }
            }
        }
    }

    /// Drops every entry and the whole index.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.by_holder.clear();
    }

    /// Returns the approximate number of entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance tasks. Useful for testing eviction.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Removes one entry and scrubs it from every dependency's index set.
    async fn remove_entry(&self, key: &CacheKey, entry: &CachedResolution) {
        for dependency in &entry.dependencies {
            if let Some(mut keys) = self.by_holder.get_mut(dependency) {
                keys.remove(key);
            }
        }
        self.cache.invalidate(key).await;
    }
}
