//! Observer fan-out.
//!
//! Delivers each [`LocationEvent`] to every registered observer:
//!
//! - in registration order
//! - synchronously, with the same immutable event for every observer
//! - with failures isolated: an observer that returns an error (or panics)
//!   is logged and skipped, and delivery continues with the next one
//!
//! The fan-out itself does not prevent nested publishes; the engine
//! guarantees that by queueing work triggered from inside a delivery.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::accessory::{AccessoryDescriptor, AccessoryLinkState};
use super::state::LocationState;
use super::tracker::{AuthorizationStatus, SourceError};

/// Link snapshot carried by [`LocationEvent::LinkChanged`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub state: AccessoryLinkState,
    pub accessories: Vec<AccessoryDescriptor>,
}

/// Everything a consumer can be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// The authoritative location state was replaced.
    StateChanged(LocationState),
    /// Attached accessories or session state changed.
    LinkChanged(LinkSnapshot),
    /// The last accessory was detached.
    LinkLost,
    /// The location service reported a failure (transient diagnostic).
    SourceFailed(SourceError),
    /// Location authorization changed.
    AuthorizationChanged(AuthorizationStatus),
    /// Location services were switched on or off system-wide.
    ServicesChanged(bool),
}

impl LocationEvent {
    /// Short event name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateChanged(_) => "state_changed",
            Self::LinkChanged(_) => "link_changed",
            Self::LinkLost => "link_lost",
            Self::SourceFailed(_) => "source_failed",
            Self::AuthorizationChanged(_) => "authorization_changed",
            Self::ServicesChanged(_) => "services_changed",
        }
    }
}

/// An observer's delivery failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ObserverError(String);

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A consumer of location events.
///
/// Observers get read-only events and must not assume they run on any
/// particular thread other than the one that published.
pub trait LocationObserver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Handle one event.
    fn deliver(&self, event: &LocationEvent) -> Result<(), ObserverError>;
}

/// Observer built from a closure.
pub struct FnObserver<F> {
    name: String,
    callback: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&LocationEvent) -> Result<(), ObserverError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl<F> LocationObserver for FnObserver<F>
where
    F: Fn(&LocationEvent) -> Result<(), ObserverError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, event: &LocationEvent) -> Result<(), ObserverError> {
        (self.callback)(event)
    }
}

/// Registration handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Result of one publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Observers that handled the event.
    pub delivered: usize,

    /// Observers that failed, with their error text.
    pub failed: Vec<(ObserverId, String)>,
}

/// Ordered set of observers.
pub struct ObserverFanout {
    observers: RwLock<Vec<(ObserverId, Arc<dyn LocationObserver>)>>,
    next_id: AtomicU64,
}

impl Default for ObserverFanout {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverFanout {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer. It receives every event published afterwards.
    pub fn register(&self, observer: Arc<dyn LocationObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(observer = observer.name(), id = id.0, "Observer registered");
        self.observers.write().push((id, observer));
        id
    }

    /// Remove an observer. Returns false if the id is unknown.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Deliver `event` to every registered observer in registration order.
    ///
    /// The observer list is copied before delivery, so observers may
    /// register or unregister from inside a callback; the change applies to
    /// the next publish.
    pub fn publish(&self, event: &LocationEvent) -> PublishReport {
        let observers: Vec<_> = self.observers.read().clone();
        let mut report = PublishReport::default();

        for (id, observer) in observers {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer.deliver(event)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(
                        observer = observer.name(),
                        event = event.kind(),
                        error = %e,
                        "Observer failed to handle event"
                    );
                    report.failed.push((id, e.to_string()));
                }
                Err(_) => {
                    tracing::error!(
                        observer = observer.name(),
                        event = event.kind(),
                        "Observer panicked while handling event"
                    );
                    report.failed.push((id, "observer panicked".to_string()));
                }
            }
        }

        report
    }
}
