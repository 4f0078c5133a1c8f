//! In-memory storage implementation.
//!
//! The reference backend for tests and single-process deployments. Uses
//! DashMap for thread-safe concurrent access without locks. Carries an
//! injectable failure switch so engine tests can exercise the
//! save-failure reconciliation path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::instrument;
use uuid::Uuid;

use rsperm_domain::model::{Holder, HolderId};

use crate::error::{StorageError, StorageResult};
use crate::traits::HolderStore;

/// In-memory implementation of [`HolderStore`].
///
/// # Performance Characteristics
///
/// - **Load / save holder**: O(1) (DashMap lookup)
/// - **Load all groups**: O(G) where G is the number of groups
#[derive(Debug, Default)]
pub struct MemoryHolderStore {
    users: DashMap<Uuid, Holder>,
    groups: DashMap<String, Holder>,
    /// When set, every save fails with an I/O error. Test hook.
    fail_saves: AtomicBool,
}

impl MemoryHolderStore {
    /// Creates a new in-memory holder store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory holder store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes every subsequent save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn check_save_allowed(&self) -> StorageResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                message: "save failure injected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HolderStore for MemoryHolderStore {
    async fn load_user(&self, id: Uuid) -> StorageResult<Option<Holder>> {
        Ok(self.users.get(&id).map(|h| h.value().clone()))
    }

    async fn load_group(&self, name: &str) -> StorageResult<Option<Holder>> {
        let name = name.to_ascii_lowercase();
        Ok(self.groups.get(&name).map(|h| h.value().clone()))
    }

    #[instrument(skip(self, holder), fields(holder = %holder.id()))]
    async fn save_holder(&self, holder: &Holder) -> StorageResult<()> {
        self.check_save_allowed()?;
        match holder.id() {
            HolderId::User(id) => {
                self.users.insert(*id, holder.clone());
            }
            HolderId::Group(name) => {
                self.groups.insert(name.clone(), holder.clone());
            }
        }
        Ok(())
    }

    async fn create_group(&self, name: &str) -> StorageResult<Holder> {
        let name = name.to_ascii_lowercase();
        // Entry API keeps concurrent creators converging on one record.
        let entry = self
            .groups
            .entry(name.clone())
            .or_insert_with(|| Holder::new_group(&name));
        Ok(entry.value().clone())
    }

    async fn delete_group(&self, name: &str) -> StorageResult<()> {
        let name = name.to_ascii_lowercase();
        if self.groups.remove(&name).is_none() {
            return Err(StorageError::NotFound {
                id: format!("group:{name}"),
            });
        }
        Ok(())
    }

    async fn load_all_groups(&self) -> StorageResult<Vec<Holder>> {
        Ok(self.groups.iter().map(|g| g.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsperm_domain::model::Node;

    #[tokio::test]
    async fn test_user_round_trip() {
        // Arrange
        let store = MemoryHolderStore::new();
        let id = Uuid::new_v4();
        let mut user = Holder::new_user(id);
        user.set_node(Node::permission("perm.a").unwrap());

        // Act
        store.save_holder(&user).await.unwrap();
        let loaded = store.load_user(id).await.unwrap();

        // Assert
        let loaded = loaded.expect("user should be stored");
        assert_eq!(loaded.nodes(), user.nodes());
        assert_eq!(loaded.version(), user.version());
    }

    #[tokio::test]
    async fn test_load_missing_user_is_none() {
        let store = MemoryHolderStore::new();
        assert!(store.load_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_group_is_idempotent() {
        // Arrange
        let store = MemoryHolderStore::new();
        let mut first = store.create_group("Admin").await.unwrap();
        first.set_node(Node::permission("perm.a").unwrap());
        store.save_holder(&first).await.unwrap();

        // Act - a second create must not wipe the saved nodes.
        let second = store.create_group("admin").await.unwrap();

        // Assert
        assert_eq!(second.nodes().len(), 1);
    }

    #[tokio::test]
    async fn test_group_names_normalized() {
        let store = MemoryHolderStore::new();
        store.create_group("ADMIN").await.unwrap();

        assert!(store.load_group("admin").await.unwrap().is_some());
        assert!(store.load_group("Admin").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_group() {
        let store = MemoryHolderStore::new();
        store.create_group("doomed").await.unwrap();

        store.delete_group("doomed").await.unwrap();
        assert!(store.load_group("doomed").await.unwrap().is_none());

        let err = store.delete_group("doomed").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_all_groups() {
        let store = MemoryHolderStore::new();
        store.create_group("a").await.unwrap();
        store.create_group("b").await.unwrap();

        let groups = store.load_all_groups().await.unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_save_failure() {
        let store = MemoryHolderStore::new();
        let user = Holder::new_user(Uuid::new_v4());

        store.set_fail_saves(true);
        let err = store.save_holder(&user).await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));

        store.set_fail_saves(false);
        store.save_holder(&user).await.unwrap();
    }
}
