//! Mock holder index for resolver tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Holder, HolderId};
use crate::resolver::HolderIndex;

/// A fixed in-memory holder index.
#[derive(Debug, Default)]
pub struct MockIndex {
    holders: HashMap<HolderId, Arc<Holder>>,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a holder snapshot to the index.
    pub fn with(mut self, holder: Holder) -> Self {
        self.holders.insert(holder.id().clone(), Arc::new(holder));
        self
    }
}

impl HolderIndex for MockIndex {
    fn holder(&self, id: &HolderId) -> Option<Arc<Holder>> {
        self.holders.get(id).cloned()
    }
}
