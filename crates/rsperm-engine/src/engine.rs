//! The permission engine: orchestration of registry, resolver, cache,
//! storage and messenger.
//!
//! Read path: registry snapshot -> cache get -> on miss, inheritance walk +
//! calculator fold -> cache insert. Reads never take locks and never touch
//! storage.
//!
//! Mutation path, serialized per holder: clone the resident snapshot ->
//! apply the mutation -> persist -> swap the snapshot in -> invalidate ->
//! fire-and-forget publish. A failed save re-loads the holder from
//! storage so in-memory and persisted state never diverge.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use rsperm_domain::cache::{CacheKey, CachedResolution, ResolutionCache};
use rsperm_domain::calculator::{PermissionCalculator, Tristate};
use rsperm_domain::error::DomainError;
use rsperm_domain::model::{ContextSet, Holder, HolderId, LogEntry, Node, NodeKind};
use rsperm_domain::resolver::InheritanceResolver;
use rsperm_domain::validation::validate_group_name;
use rsperm_storage::traits::HolderStore;
use rsperm_sync::{BusSubscription, Message, MessageDispatcher, Messenger};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::registry::ResidentRegistry;

/// The central permission engine for one process.
///
/// Cheap to share: wrap in `Arc` and call from any task. Permission
/// checks are safe from many concurrent tasks; mutations of the same
/// holder are serialized internally, mutations of unrelated holders run
/// in parallel.
pub struct PermissionEngine<S, M> {
    store: Arc<S>,
    messenger: Arc<M>,
    config: EngineConfig,
    registry: Arc<ResidentRegistry>,
    /// Per-holder mutation locks; never taken by the read path.
    locks: DashMap<HolderId, Arc<Mutex<()>>>,
    cache: Arc<ResolutionCache>,
    resolver: InheritanceResolver,
    dispatcher: Arc<MessageDispatcher>,
    /// Bounded ring of recently received audit entries, for display.
    recent_log: StdMutex<VecDeque<LogEntry>>,
}

impl<S, M> PermissionEngine<S, M>
where
    S: HolderStore,
    M: Messenger,
{
    /// Creates an engine over the given storage and messenger.
    pub fn new(store: Arc<S>, messenger: Arc<M>, config: EngineConfig) -> Self {
        let cache = Arc::new(ResolutionCache::new((&config.cache).into()));
        let resolver = InheritanceResolver::new((&config.policy).into());
        Self {
            store,
            messenger,
            config,
            registry: Arc::new(ResidentRegistry::new()),
            locks: DashMap::new(),
            cache,
            resolver,
            dispatcher: Arc::new(MessageDispatcher::default()),
            recent_log: StdMutex::new(VecDeque::new()),
        }
    }

    /// Loads every stored group into residency. Call once at startup,
    /// before serving checks.
    pub async fn init(&self) -> EngineResult<()> {
        let groups = self.store.load_all_groups().await?;
        let count = groups.len();
        for group in groups {
            self.make_resident(group);
        }
        info!(groups = count, "engine initialized");
        Ok(())
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The resolution cache (exposed for monitoring).
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Residency
    // ------------------------------------------------------------------

    /// Loads a user into residency, creating a fresh record on first
    /// sight. Returns the resident snapshot.
    pub async fn load_user(&self, id: Uuid) -> EngineResult<Arc<Holder>> {
        let holder_id = HolderId::User(id);
        if let Some(holder) = self.registry.get(&holder_id) {
            return Ok(holder);
        }
        let lock = self.lock_for(&holder_id);
        let _guard = lock.lock().await;
        // Re-check under the lock: a concurrent loader may have won.
        if let Some(holder) = self.registry.get(&holder_id) {
            return Ok(holder);
        }
        let holder = match self.store.load_user(id).await? {
            Some(holder) => holder,
            None => {
                let fresh = Holder::new_user(id);
                self.store.save_holder(&fresh).await?;
                fresh
            }
        };
        Ok(self.make_resident(holder))
    }

    /// Evicts a user from residency (e.g. on disconnect), dropping their
    /// cache entries.
    pub async fn unload_user(&self, id: Uuid) {
        let holder_id = HolderId::User(id);
        self.registry.remove(&holder_id);
        self.cache.forget_version(&holder_id);
        self.cache.invalidate(&holder_id).await;
    }

    /// Returns a resident group snapshot.
    pub fn group(&self, name: &str) -> Option<Arc<Holder>> {
        self.registry.get(&HolderId::group(name))
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Resolves the full permission view for a holder in a context,
    /// serving from cache when possible.
    pub async fn resolved_permissions(
        &self,
        id: &HolderId,
        context: &ContextSet,
    ) -> EngineResult<Arc<CachedResolution>> {
        let holder = self.registry.get(id).ok_or_else(|| EngineError::NotFound {
            id: id.to_string(),
        })?;

        let key = CacheKey::new(id.clone(), context.clone());
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let now = Utc::now();
        let list = self
            .resolver
            .resolve_inheritance_list(self.registry.as_ref(), &holder, context, now);
        let permissions = PermissionCalculator::resolve(&list.nodes, context, now);
        let resolution = Arc::new(CachedResolution {
            permissions,
            dependencies: list.visited,
            origin_version: holder.version(),
        });
        self.cache.insert(key, Arc::clone(&resolution)).await;
        Ok(resolution)
    }

    /// Checks one permission for a holder in a context.
    pub async fn check(
        &self,
        id: &HolderId,
        permission: &str,
        context: &ContextSet,
    ) -> EngineResult<Tristate> {
        let resolution = self.resolved_permissions(id, context).await?;
        Ok(resolution.permissions.check(permission))
    }

    // ------------------------------------------------------------------
    // Mutation path
    // ------------------------------------------------------------------

    /// Adds (or refreshes) a node on a holder. Returns false when the
    /// holder already carried it unchanged.
    pub async fn set_node(&self, id: &HolderId, node: Node) -> EngineResult<bool> {
        self.mutate(id, |holder| {
            let changed = holder.set_node(node).changed();
            Ok((changed, changed))
        })
        .await
    }

    /// Removes every node matching key and context. Subject to the
    /// primary-group removal policy for users.
    pub async fn unset_node(
        &self,
        id: &HolderId,
        key: &str,
        context: &ContextSet,
    ) -> EngineResult<bool> {
        let prevent_primary_removal = self.config.policy.prevent_primary_group_removal;
        let default_group = self.config.policy.default_group.clone();
        self.mutate(id, move |holder| {
            if prevent_primary_removal && holder.id().is_user() && context.is_empty() {
                if let NodeKind::Inheritance { group } = NodeKind::parse(key) {
                    let primary = holder.primary_group().unwrap_or(&default_group);
                    if group.eq_ignore_ascii_case(primary) {
                        return Err(EngineError::Domain(DomainError::Consistency {
                            message: format!(
                                "cannot remove primary group membership '{group}'"
                            ),
                        }));
                    }
                }
            }
            let changed = holder.unset_node(key, context).changed();
            Ok((changed, changed))
        })
        .await
    }

    /// Removes every node from a holder. Returns how many were dropped.
    pub async fn clear_nodes(&self, id: &HolderId) -> EngineResult<usize> {
        self.mutate(id, |holder| {
            let dropped = holder.clear_nodes();
            Ok((dropped > 0, dropped))
        })
        .await
    }

    /// Removes every node in one exact context. Returns how many were
    /// dropped.
    pub async fn clear_nodes_in_context(
        &self,
        id: &HolderId,
        context: &ContextSet,
    ) -> EngineResult<usize> {
        self.mutate(id, |holder| {
            let dropped = holder.clear_nodes_in_context(context);
            Ok((dropped > 0, dropped))
        })
        .await
    }

    /// Drops expired nodes from a holder's stored record. Read paths
    /// filter expired nodes lazily, so this is purely a storage sweep;
    /// run it from a background task if storage growth matters.
    pub async fn purge_expired_nodes(&self, id: &HolderId) -> EngineResult<usize> {
        self.mutate(id, |holder| {
            let dropped = holder.purge_expired(Utc::now());
            Ok((dropped > 0, dropped))
        })
        .await
    }

    /// Sets a user's stored primary group. The group must exist.
    pub async fn set_primary_group(&self, user: Uuid, group: &str) -> EngineResult<bool> {
        let group_id = HolderId::group(group);
        if !self.registry.contains(&group_id) {
            return Err(EngineError::Domain(DomainError::GroupNotFound {
                name: group.to_ascii_lowercase(),
            }));
        }
        let group = group.to_string();
        self.mutate(&HolderId::User(user), move |holder| {
            let changed = holder.primary_group() != Some(group.to_ascii_lowercase().as_str());
            if changed {
                holder.set_primary_group(&group);
            }
            Ok((changed, changed))
        })
        .await
    }

    /// Records a user's exact username as observed at login.
    pub async fn update_username(&self, user: Uuid, name: &str) -> EngineResult<bool> {
        let name = name.to_string();
        self.mutate(&HolderId::User(user), move |holder| {
            let changed = holder.username() != Some(name.as_str());
            if changed {
                holder.set_username(&name);
            }
            Ok((changed, changed))
        })
        .await
    }

    /// Creates a group (idempotent) and makes it resident.
    ///
    /// Creation invalidates the whole cache: resolutions that skipped the
    /// name as a dangling reference may now resolve through it.
    pub async fn create_group(&self, name: &str) -> EngineResult<Arc<Holder>> {
        validate_group_name(name)?;
        let group_id = HolderId::group(name);
        let lock = self.lock_for(&group_id);
        let _guard = lock.lock().await;
        let group = self.store.create_group(name).await?;
        let snapshot = self.make_resident(group);
        self.cache.invalidate_all().await;
        Ok(snapshot)
    }

    /// Deletes a group. Inheritance nodes referencing it become dangling
    /// and are skipped at resolution time.
    pub async fn delete_group(&self, name: &str) -> EngineResult<()> {
        let group_id = HolderId::group(name);
        let lock = self.lock_for(&group_id);
        let _guard = lock.lock().await;
        self.store.delete_group(name).await?;
        self.registry.remove(&group_id);
        self.cache.forget_version(&group_id);
        // Precise: exactly the resolutions that traversed this group.
        self.cache.invalidate(&group_id).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Audit log
    // ------------------------------------------------------------------

    /// Records an action-log entry locally and broadcasts it.
    pub async fn submit_log(&self, entry: LogEntry) {
        self.push_recent_log(entry.clone());
        let message = Message::log(entry);
        self.dispatcher.mark_own(message.id());
        self.publish(message);
    }

    /// Recently received audit entries, newest last.
    pub fn recent_log(&self) -> Vec<LogEntry> {
        self.recent_log
            .lock()
            .expect("recent log lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    fn push_recent_log(&self, entry: LogEntry) {
        let mut ring = self.recent_log.lock().expect("recent log lock poisoned");
        ring.push_back(entry);
        let capacity = self.config.sync.recent_log_capacity.max(1);
        while ring.len() > capacity {
            ring.pop_front();
        }
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Applies one incoming message. Idempotent: the listener gates
    /// duplicates, and re-applying an invalidation is a no-op anyway.
    pub async fn handle_message(&self, message: Message) {
        match message {
            Message::UserUpdate { user_id, .. } => {
                debug!(%user_id, "remote user update received");
                self.reload_user_from_storage(user_id).await;
            }
            Message::Log { entry, .. } => {
                self.push_recent_log(entry);
            }
            Message::Custom { channel, .. } => {
                debug!(channel = %channel, "ignoring custom message");
            }
        }
    }

    /// Spawns the incoming-message loop over a bus subscription.
    pub fn spawn_listener(self: &Arc<Self>, mut subscription: BusSubscription) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                if engine.dispatcher.should_process(message.id()) {
                    engine.handle_message(message).await;
                }
            }
            debug!("message listener stopped: bus closed");
        })
    }

    /// Spawns the periodic full resync with storage, the backstop that
    /// bounds divergence when messages are lost.
    pub fn spawn_resync_task(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let period = engine.config.sync.resync_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it, init() already
            // loaded everything.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = engine.resync().await {
                    error!(error = %e, "periodic resync failed");
                }
            }
        })
    }

    /// Reloads every group (and resident user) from storage and drops the
    /// whole cache.
    pub async fn resync(&self) -> EngineResult<()> {
        let groups = self.store.load_all_groups().await?;
        let fresh: std::collections::HashSet<HolderId> =
            groups.iter().map(|g| g.id().clone()).collect();

        // Groups deleted remotely disappear from residency.
        for stale in self
            .registry
            .group_ids()
            .into_iter()
            .filter(|id| !fresh.contains(id))
        {
            self.registry.remove(&stale);
            self.cache.forget_version(&stale);
        }
        for group in groups {
            self.make_resident(group);
        }

        for id in self.registry.ids() {
            if let HolderId::User(user_id) = id {
                self.reload_user_from_storage(user_id).await;
            }
        }

        self.cache.invalidate_all().await;
        debug!("full resync complete");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lock_for(&self, id: &HolderId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Inserts a holder snapshot and records its version stamp.
    fn make_resident(&self, holder: Holder) -> Arc<Holder> {
        let snapshot = Arc::new(holder);
        self.cache
            .note_version(snapshot.id().clone(), snapshot.version());
        self.registry.insert(Arc::clone(&snapshot));
        snapshot
    }

    /// Runs one mutation under the holder's lock: clone, apply, persist,
    /// swap, invalidate, publish.
    async fn mutate<T, F>(&self, id: &HolderId, apply: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Holder) -> EngineResult<(bool, T)>,
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let current = match self.registry.get(id) {
            Some(holder) => holder,
            None => self.load_for_mutation(id).await?,
        };
        let mut working = (*current).clone();
        let (changed, result) = apply(&mut working)?;
        if !changed {
            return Ok(result);
        }

        if let Err(e) = self.store.save_holder(&working).await {
            warn!(holder = %id, error = %e, "save failed, re-syncing holder from storage");
            self.reconcile_after_failed_save(id).await;
            return Err(e.into());
        }

        self.make_resident(working);
        self.cache.invalidate(id).await;

        if let HolderId::User(user_id) = id {
            let message = Message::user_update(*user_id);
            self.dispatcher.mark_own(message.id());
            self.publish(message);
        }
        Ok(result)
    }

    /// Brings a holder into residency for a mutation. Users are created
    /// on first sight; mutating an unknown group is an error.
    async fn load_for_mutation(&self, id: &HolderId) -> EngineResult<Arc<Holder>> {
        let holder = match id {
            HolderId::User(user_id) => match self.store.load_user(*user_id).await? {
                Some(holder) => holder,
                None => Holder::new_user(*user_id),
            },
            HolderId::Group(name) => {
                self.store
                    .load_group(name)
                    .await?
                    .ok_or_else(|| EngineError::NotFound {
                        id: id.to_string(),
                    })?
            }
        };
        Ok(self.make_resident(holder))
    }

    /// After a failed save, the in-memory snapshot may be ahead of
    /// storage. Re-load so both sides agree again.
    async fn reconcile_after_failed_save(&self, id: &HolderId) {
        let reloaded = match id {
            HolderId::User(user_id) => self.store.load_user(*user_id).await,
            HolderId::Group(name) => self.store.load_group(name).await,
        };
        match reloaded {
            Ok(Some(holder)) => {
                self.make_resident(holder);
            }
            Ok(None) => {
                self.registry.remove(id);
                self.cache.forget_version(id);
            }
            Err(e) => {
                // Storage is down; evict so the next read cannot serve a
                // state that was never persisted.
                error!(holder = %id, error = %e, "reconciliation load failed, evicting holder");
                self.registry.remove(id);
                self.cache.forget_version(id);
            }
        }
        self.cache.invalidate(id).await;
    }

    /// Replaces a resident user with the stored state and drops their
    /// cache entries. No-op for non-resident users.
    async fn reload_user_from_storage(&self, user_id: Uuid) {
        let holder_id = HolderId::User(user_id);
        if !self.registry.contains(&holder_id) {
            return;
        }
        let lock = self.lock_for(&holder_id);
        let _guard = lock.lock().await;
        match self.store.load_user(user_id).await {
            Ok(Some(holder)) => {
                self.make_resident(holder);
            }
            Ok(None) => {
                self.registry.remove(&holder_id);
                self.cache.forget_version(&holder_id);
            }
            Err(e) => {
                warn!(%user_id, error = %e, "reload after remote update failed");
            }
        }
        self.cache.invalidate(&holder_id).await;
    }

    /// Fire-and-forget publish with a bounded timeout: the mutation path
    /// never waits on the transport.
    fn publish(&self, message: Message) {
        let messenger = Arc::clone(&self.messenger);
        let bound = self.config.sync.publish_timeout();
        tokio::spawn(async move {
            match timeout(bound, messenger.publish(&message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "publish failed, relying on periodic resync"),
                Err(_) => warn!(timeout_ms = bound.as_millis() as u64, "publish timed out"),
            }
        });
    }
}
