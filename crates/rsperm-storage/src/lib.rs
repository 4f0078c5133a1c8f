//! rsperm-storage: durable holder storage boundary
//!
//! Defines the [`HolderStore`] trait the engine persists through, plus the
//! in-memory reference implementation. Durable backends (flat-file,
//! relational, document-store) implement the same trait out of tree.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryHolderStore;
pub use traits::HolderStore;
