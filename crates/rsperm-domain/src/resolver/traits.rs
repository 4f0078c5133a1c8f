//! Traits the resolver needs from its surroundings.

use std::sync::Arc;

use crate::model::{Holder, HolderId};

/// Synchronous lookup of resident holders.
///
/// Resolution is CPU-bound and never performs I/O: every holder needed
/// mid-walk must already be in memory. The engine implements this over its
/// resident registry; a holder absent from the index is treated as a
/// dangling inheritance reference and skipped.
pub trait HolderIndex: Send + Sync {
    /// Returns the resident snapshot for a holder, if loaded.
    fn holder(&self, id: &HolderId) -> Option<Arc<Holder>>;
}
