//! Provider traits and shared wrapper for the engine.
//!
//! - [`LocationProvider`] - Query API (pull)
//! - [`LocationBroadcaster`] - Subscription API (push, async)
//! - [`SharedLocationEngine`] - Cloneable handle combining both

use std::sync::Arc;

use tokio::sync::broadcast;

use super::accessory::AccessoryLinkState;
use super::broadcast::BroadcastObserver;
use super::engine::ReconciliationEngine;
use super::fanout::LocationEvent;
use super::state::{LocationState, SourceKind};

/// Trait for querying the current location (pull API).
pub trait LocationProvider: Send + Sync {
    /// Current authoritative snapshot.
    fn state(&self) -> LocationState;

    /// Current position if known.
    fn position(&self) -> Option<(f64, f64)>;

    /// Live or simulated.
    fn source_kind(&self) -> SourceKind;

    /// Accessory link state.
    fn link_state(&self) -> AccessoryLinkState;

    /// Check if any location is known.
    fn has_position(&self) -> bool;
}

/// Trait for subscribing to engine events (push API).
pub trait LocationBroadcaster: Send + Sync {
    /// Subscribe to events published from now on.
    fn subscribe(&self) -> broadcast::Receiver<LocationEvent>;
}

/// Shared engine handle.
///
/// Cheap to clone; every clone drives the same engine. Creating the handle
/// registers a [`BroadcastObserver`] so async consumers can subscribe.
///
/// ```ignore
/// let shared = SharedLocationEngine::new(ReconciliationEngine::new(), 16);
///
/// let mut rx = shared.subscribe();
/// shared.engine().commit_map_pick(43.6, 1.4)?;
///
/// while let Ok(event) = rx.recv().await {
///     // Handle event
/// }
/// ```
#[derive(Clone)]
pub struct SharedLocationEngine {
    engine: Arc<ReconciliationEngine>,
    broadcast: Arc<BroadcastObserver>,
}

impl SharedLocationEngine {
    /// Wrap an engine, bridging its events to a broadcast channel of
    /// `capacity`.
    pub fn new(engine: ReconciliationEngine, capacity: usize) -> Self {
        Self::from_arc(Arc::new(engine), capacity)
    }

    /// Wrap an engine that is already shared.
    pub fn from_arc(engine: Arc<ReconciliationEngine>, capacity: usize) -> Self {
        let broadcast = Arc::new(BroadcastObserver::new(capacity));
        engine.register(broadcast.clone());
        Self { engine, broadcast }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// The underlying engine as a shared pointer.
    pub fn engine_arc(&self) -> Arc<ReconciliationEngine> {
        Arc::clone(&self.engine)
    }
}

impl LocationProvider for SharedLocationEngine {
    fn state(&self) -> LocationState {
        self.engine.state()
    }

    fn position(&self) -> Option<(f64, f64)> {
        self.engine.state().position()
    }

    fn source_kind(&self) -> SourceKind {
        self.engine.state().source_kind
    }

    fn link_state(&self) -> AccessoryLinkState {
        self.engine.link_state()
    }

    fn has_position(&self) -> bool {
        self.engine.state().active.is_some()
    }
}

impl LocationBroadcaster for SharedLocationEngine {
    fn subscribe(&self) -> broadcast::Receiver<LocationEvent> {
        self.broadcast.subscribe()
    }
}

// Allow Arc<SharedLocationEngine> to be used as provider
impl LocationProvider for Arc<SharedLocationEngine> {
    fn state(&self) -> LocationState {
        (**self).state()
    }

    fn position(&self) -> Option<(f64, f64)> {
        (**self).position()
    }

    fn source_kind(&self) -> SourceKind {
        (**self).source_kind()
    }

    fn link_state(&self) -> AccessoryLinkState {
        (**self).link_state()
    }

    fn has_position(&self) -> bool {
        (**self).has_position()
    }
}
