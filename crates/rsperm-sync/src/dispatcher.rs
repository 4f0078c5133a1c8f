//! Idempotent incoming-message gating.
//!
//! Transports give no cross-process ordering and may redeliver through
//! overlapping channels, so every handler must tolerate duplicates. The
//! dispatcher remembers recently seen message ids (including the ids of
//! messages this process published itself) and lets each id through at
//! most once.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use uuid::Uuid;

/// Default number of remembered message ids.
const DEFAULT_SEEN_CAPACITY: usize = 2048;

/// Deduplicating gate for incoming messages.
#[derive(Debug)]
pub struct MessageDispatcher {
    seen: Mutex<SeenIds>,
}

#[derive(Debug)]
struct SeenIds {
    set: HashSet<Uuid>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SEEN_CAPACITY)
    }
}

impl MessageDispatcher {
    /// Creates a dispatcher remembering up to `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(SeenIds {
                set: HashSet::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Returns true exactly once per id: the first caller should process
    /// the message, later callers (duplicates) should drop it.
    pub fn should_process(&self, id: Uuid) -> bool {
        let mut seen = self.seen.lock().expect("seen-id lock poisoned");
        if !seen.set.insert(id) {
            return false;
        }
        seen.order.push_back(id);
        while seen.order.len() > seen.capacity {
            if let Some(evicted) = seen.order.pop_front() {
                seen.set.remove(&evicted);
            }
        }
        true
    }

    /// Pre-marks an id as seen. Publishers call this with their own
    /// outgoing message ids so the echo from the shared channel is
    /// dropped instead of re-applied.
    pub fn mark_own(&self, id: Uuid) {
        let _ = self.should_process(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delivery_processes() {
        let dispatcher = MessageDispatcher::default();
        assert!(dispatcher.should_process(Uuid::new_v4()));
    }

    #[test]
    fn test_duplicate_delivery_dropped() {
        let dispatcher = MessageDispatcher::default();
        let id = Uuid::new_v4();

        assert!(dispatcher.should_process(id));
        assert!(!dispatcher.should_process(id));
        assert!(!dispatcher.should_process(id));
    }

    #[test]
    fn test_own_messages_not_reprocessed() {
        let dispatcher = MessageDispatcher::default();
        let id = Uuid::new_v4();

        dispatcher.mark_own(id);
        assert!(!dispatcher.should_process(id));
    }

    #[test]
    fn test_memory_bounded_eviction() {
        // Arrange - tiny capacity so the first id gets evicted.
        let dispatcher = MessageDispatcher::with_capacity(2);
        let first = Uuid::new_v4();
        assert!(dispatcher.should_process(first));
        assert!(dispatcher.should_process(Uuid::new_v4()));
        assert!(dispatcher.should_process(Uuid::new_v4()));

        // Act & Assert - forgotten after eviction; reprocessing a very
        // old duplicate is acceptable because handlers are idempotent.
        assert!(dispatcher.should_process(first));
    }
}
