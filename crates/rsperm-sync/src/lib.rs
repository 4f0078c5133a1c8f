//! rsperm-sync: cross-instance synchronization
//!
//! The messenger keeps cooperating engine processes convergent: mutations
//! broadcast invalidation notifications (and audit records) over an
//! at-most-once pub/sub channel, and receivers apply them idempotently.
//!
//! - `message` - the tagged message union, one UUID per message
//! - `codec`   - JSON wire framing, exact round-trips
//! - `bus`     - the `Messenger` trait, `LocalBus`, `NullMessenger`
//! - `dispatcher` - duplicate/self-echo suppression

pub mod bus;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod message;

pub use bus::{BusSubscription, LocalBus, Messenger, NullMessenger};
pub use dispatcher::MessageDispatcher;
pub use error::{SyncError, SyncResult};
pub use message::Message;
