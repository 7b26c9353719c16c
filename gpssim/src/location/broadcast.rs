//! Bridge from the synchronous fan-out to async subscribers.
//!
//! [`BroadcastObserver`] is an ordinary observer that forwards every event
//! into a `tokio::sync::broadcast` channel. Slow subscribers lag and lose
//! the oldest events; the engine never waits for them.

use tokio::sync::broadcast;

use super::fanout::{LocationEvent, LocationObserver, ObserverError};

/// Default channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 16;

/// Observer that re-publishes events on a broadcast channel.
pub struct BroadcastObserver {
    sender: broadcast::Sender<LocationEvent>,
}

impl BroadcastObserver {
    /// Create an observer with its own channel.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create an observer around an existing sender.
    pub fn from_sender(sender: broadcast::Sender<LocationEvent>) -> Self {
        Self { sender }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LocationEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl LocationObserver for BroadcastObserver {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn deliver(&self, event: &LocationEvent) -> Result<(), ObserverError> {
        // No subscribers is normal, not a failure
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
