//! Process-wide fan-out of [`BroadcastEvent`]s to every connected subscriber.
//!
//! Backed by `tokio::sync::broadcast`. Delivery is fire-and-forget: publishing
//! with no subscribers drops the event, and subscribers that fall more than
//! the channel capacity behind receive `RecvError::Lagged` and skip ahead.

use tokio::sync::broadcast;
use tracing::trace;

use crate::event::BroadcastEvent;

/// Default broadcast channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BroadcastEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send `event` to all current subscribers; returns how many received it.
    pub fn publish(&self, event: BroadcastEvent) -> usize {
        let name = event.name();
        // send() returns Err if there are no receivers, which is fine.
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(event = name, delivered, "event published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
