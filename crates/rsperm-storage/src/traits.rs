//! HolderStore trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use rsperm_domain::model::Holder;

use crate::error::StorageResult;

/// Abstract durable storage for permission holders.
///
/// The engine treats implementations as the async source of truth, never a
/// cache: nothing in the resolution path reads storage, and every mutation
/// is persisted before it becomes visible to checks.
///
/// Implementations must be thread-safe (Send + Sync) and support async
/// operations.
#[async_trait]
pub trait HolderStore: Send + Sync + 'static {
    /// Loads a user's holder record. `Ok(None)` means the user has no
    /// stored data yet; the engine creates a fresh holder in that case.
    async fn load_user(&self, id: Uuid) -> StorageResult<Option<Holder>>;

    /// Loads a group by (lowercase) name.
    async fn load_group(&self, name: &str) -> StorageResult<Option<Holder>>;

    /// Persists a holder record, replacing any previous state.
    async fn save_holder(&self, holder: &Holder) -> StorageResult<()>;

    /// Creates a group, or returns the existing record. Load-or-create is
    /// idempotent so concurrent creators converge on one record.
    async fn create_group(&self, name: &str) -> StorageResult<Holder>;

    /// Deletes a group. Inheritance nodes in other holders that reference
    /// it become dangling; the resolver skips them.
    async fn delete_group(&self, name: &str) -> StorageResult<()>;

    /// Loads every stored group, for eager residency at startup and for
    /// the periodic full resync.
    async fn load_all_groups(&self) -> StorageResult<Vec<Holder>>;
}
