//! Async event pump for location and accessory collaborators.
//!
//! The device location service and the accessory manager report events
//! whenever they like. They push [`SourceEvent`]s into an mpsc channel and
//! a single pump task feeds them to the engine one at a time, in the order
//! they were sent.
//!
//! Engine calls are synchronous and may wait for another thread's delivery
//! to finish, so each event is applied on the blocking pool and awaited
//! before the next is taken. Any runtime flavour works.
//!
//! ```ignore
//! let (tx, rx) = mpsc::channel(64);
//! let cancel = CancellationToken::new();
//! let handle = spawn_event_pump(shared.clone(), rx, cancel.clone());
//!
//! tx.send(SourceEvent::Sample(sample)).await?;
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::accessory::AccessoryDescriptor;
use super::provider::SharedLocationEngine;
use super::state::LocationSample;
use super::tracker::{AuthorizationStatus, SourceError};

/// An event from an external collaborator.
#[derive(Debug)]
pub enum SourceEvent {
    /// New device fix.
    Sample(LocationSample),
    /// The location service failed.
    Failure(SourceError),
    /// Authorization changed.
    Authorization(AuthorizationStatus),
    /// Location services switched on or off.
    ServicesEnabled(bool),
    /// The set of attached accessories changed.
    AccessoriesChanged(Vec<AccessoryDescriptor>),
    /// Acknowledged once every event sent before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// Summary returned when the pump stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    /// Events handed to the engine.
    pub events: u64,
}

/// Spawn a task that feeds `events` into the engine.
///
/// The task stops when the channel closes or `cancellation` fires.
pub fn spawn_event_pump(
    engine: SharedLocationEngine,
    mut events: mpsc::Receiver<SourceEvent>,
    cancellation: CancellationToken,
) -> JoinHandle<PumpSummary> {
    tokio::spawn(async move {
        let mut summary = PumpSummary::default();

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(SourceEvent::Flush(ack)) => {
                            let _ = ack.send(());
                        }
                        Some(event) => {
                            let target = engine.clone();
                            match tokio::task::spawn_blocking(move || apply(&target, event)).await {
                                Ok(()) => summary.events += 1,
                                Err(e) => tracing::error!(error = %e, "Source event task failed"),
                            }
                        }
                        None => {
                            tracing::debug!("Source event channel closed");
                            break;
                        }
                    }
                }
                _ = cancellation.cancelled() => {
                    tracing::debug!("Source event pump cancelled");
                    break;
                }
            }
        }

        summary
    })
}

fn apply(engine: &SharedLocationEngine, event: SourceEvent) {
    let engine = engine.engine();
    match event {
        SourceEvent::Sample(sample) => {
            engine.on_device_sample(sample);
        }
        SourceEvent::Failure(error) => engine.on_source_error(error),
        SourceEvent::Authorization(status) => engine.on_authorization_changed(status),
        SourceEvent::ServicesEnabled(enabled) => engine.set_services_enabled(enabled),
        SourceEvent::AccessoriesChanged(attached) => {
            engine.refresh_accessories(attached);
        }
        SourceEvent::Flush(ack) => {
            let _ = ack.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::engine::ReconciliationEngine;
    use crate::location::provider::LocationProvider;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_pump_applies_events_in_order() {
        let shared = SharedLocationEngine::new(ReconciliationEngine::new(), 16);
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_event_pump(shared.clone(), rx, CancellationToken::new());

        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
        tx.send(SourceEvent::Sample(LocationSample::new(1.0, 1.0, 0.0, at(5))))
            .await
            .unwrap();
        tx.send(SourceEvent::Sample(LocationSample::new(2.0, 2.0, 0.0, at(3))))
            .await
            .unwrap();
        tx.send(SourceEvent::AccessoriesChanged(vec![AccessoryDescriptor::new(
            "GPS Sim", "Acme",
        )]))
        .await
        .unwrap();
        drop(tx);

        let summary = handle.await.unwrap();

        assert_eq!(summary.events, 3);
        assert_eq!(shared.position(), Some((1.0, 1.0)));
        assert_eq!(shared.link_state().attached_count, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_pump_runs_while_another_thread_publishes() {
        use crate::location::fanout::{FnObserver, LocationEvent};
        use std::sync::mpsc as std_mpsc;
        use std::time::Duration;

        let shared = SharedLocationEngine::new(ReconciliationEngine::new(), 16);
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        let release_rx = parking_lot::Mutex::new(release_rx);

        // Holds the engine in delivery until released
        shared.engine().register(std::sync::Arc::new(FnObserver::new(
            "slow",
            move |e: &LocationEvent| {
                if let LocationEvent::AuthorizationChanged(_) = e {
                    let _ = entered_tx.send(());
                    let _ = release_rx.lock().recv();
                }
                Ok(())
            },
        )));

        let publisher = {
            let engine = shared.engine_arc();
            std::thread::spawn(move || {
                engine.on_authorization_changed(AuthorizationStatus::Denied);
            })
        };
        entered_rx.recv().unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_event_pump(shared.clone(), rx, CancellationToken::new());
        let at = Utc.timestamp_opt(5, 0).unwrap();
        tx.send(SourceEvent::Sample(LocationSample::new(1.0, 1.0, 0.0, at)))
            .await
            .unwrap();
        drop(tx);

        // The single runtime thread stays free while the pump waits
        tokio::time::sleep(Duration::from_millis(20)).await;
        release_tx.send(()).unwrap();

        assert_eq!(handle.await.unwrap().events, 1);
        publisher.join().unwrap();
        assert_eq!(shared.position(), Some((1.0, 1.0)));
    }

    #[tokio::test]
    async fn test_flush_waits_for_earlier_events() {
        let shared = SharedLocationEngine::new(ReconciliationEngine::new(), 16);
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_event_pump(shared.clone(), rx, CancellationToken::new());

        let at = Utc.timestamp_opt(5, 0).unwrap();
        tx.send(SourceEvent::Sample(LocationSample::new(3.0, 4.0, 0.0, at)))
            .await
            .unwrap();
        let (ack, done) = oneshot::channel();
        tx.send(SourceEvent::Flush(ack)).await.unwrap();
        done.await.unwrap();

        assert_eq!(shared.position(), Some((3.0, 4.0)));

        drop(tx);
        // Flushes are not counted as applied events
        assert_eq!(handle.await.unwrap().events, 1);
    }

    #[tokio::test]
    async fn test_pump_stops_on_cancel() {
        let shared = SharedLocationEngine::new(ReconciliationEngine::new(), 16);
        let (_tx, rx) = mpsc::channel::<SourceEvent>(8);
        let cancel = CancellationToken::new();
        let handle = spawn_event_pump(shared, rx, cancel.clone());

        cancel.cancel();

        assert_eq!(handle.await.unwrap(), PumpSummary::default());
    }
}
