//! The Messenger abstraction and the in-process broadcast bus.
//!
//! The messenger is transport-agnostic: anything that can fan a frame out
//! to the other cooperating processes works. Delivery is at-most-once and
//! best-effort; a lost message only delays convergence (the periodic
//! resync is the backstop), so publishers never wait for acknowledgement.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::codec;
use crate::error::{SyncError, SyncResult};
use crate::message::Message;

/// A pub/sub transport for mutation notifications and audit records.
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    /// Publishes a message to every other cooperating process.
    ///
    /// Must be non-blocking best-effort: implementations bound their own
    /// I/O, and callers additionally wrap publishes in a timeout so a
    /// broken transport cannot stall the mutation path.
    async fn publish(&self, message: &Message) -> SyncResult<()>;
}

/// A no-op messenger for single-process deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMessenger;

#[async_trait]
impl Messenger for NullMessenger {
    async fn publish(&self, _message: &Message) -> SyncResult<()> {
        Ok(())
    }
}

/// In-process broadcast bus.
///
/// Backs the engine's integration tests and co-located engine instances.
/// Built on `tokio::sync::broadcast`: subscribers that fall behind the
/// channel capacity lose the oldest frames (at-most-once delivery, which
/// is exactly the semantics remote transports provide).
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<String>,
}

impl LocalBus {
    /// Creates a bus retaining up to `capacity` in-flight frames.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attaches a new subscriber. Only frames published after this call
    /// are delivered.
    pub fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Messenger for LocalBus {
    async fn publish(&self, message: &Message) -> SyncResult<()> {
        let frame = codec::encode(message)?;
        // No subscribers is not an error: a lone instance publishes into
        // the void and stays correct.
        let _ = self.tx.send(frame);
        Ok(())
    }
}

/// A receiving endpoint of a [`LocalBus`].
#[derive(Debug)]
pub struct BusSubscription {
    rx: broadcast::Receiver<String>,
}

impl BusSubscription {
    /// Receives the next decodable message. Lagged or undecodable frames
    /// are skipped with a warning; `None` means the bus is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => match codec::decode(&frame) {
                    Ok(message) => return Some(message),
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable frame");
                    }
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Lost messages delay convergence only; the periodic
                    // resync picks the state up.
                    warn!(missed, "subscriber lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive for tests and polling callers.
    pub fn try_recv(&mut self) -> SyncResult<Option<Message>> {
        loop {
            match self.rx.try_recv() {
                Ok(frame) => return codec::decode(&frame).map(Some),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "subscriber lagged, frames dropped");
                }
                Err(broadcast::error::TryRecvError::Closed) => return Err(SyncError::Closed),
            }
        }
    }
}
