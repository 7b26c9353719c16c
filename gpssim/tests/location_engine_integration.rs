//! Integration tests for the location reconciliation engine.
//!
//! These drive the engine through its public API with the real
//! presentation observers attached, covering the end-to-end flows:
//! device fixes, operator commits, accessory attach/detach, and the
//! async adapters.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use gpssim::config::MapSettings;
use gpssim::display::{DiagnosticsPanel, MapDisplay, StatusIndicator, NO_ACCESSORY_TEXT};
use gpssim::location::{
    spawn_event_pump, AccessoryDescriptor, ActionOutcome, DeliveryOutcome, FnObserver,
    InvalidReason, LinkError, LocationBroadcaster, LocationEvent, LocationObserver,
    LocationProvider, LocationSample, LocationState, ObserverError, OperatorAction,
    ReconciliationEngine, RecordingCommandSink, Scheduled, SharedLocationEngine, SourceEvent,
    SourceKind, StaticAccessoryProvider,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn fix(lat: f64, lon: f64, secs: i64) -> LocationSample {
    LocationSample::new(lat, lon, 25.0, at(secs)).with_accuracy(5.0, 8.0)
}

fn simulator() -> AccessoryDescriptor {
    AccessoryDescriptor::new("GPS Simulator", "Acme")
        .with_protocol("com.acme.gpssim")
        .with_serial_number("SN-0001")
}

struct Harness {
    engine: Arc<ReconciliationEngine>,
    sink: Arc<RecordingCommandSink>,
    map: Arc<MapDisplay>,
    diagnostics: Arc<DiagnosticsPanel>,
    status: Arc<StatusIndicator>,
    events: Arc<Mutex<Vec<LocationEvent>>>,
}

fn harness() -> Harness {
    let sink = Arc::new(RecordingCommandSink::new());
    let engine = Arc::new(ReconciliationEngine::with_sink(sink.clone()));

    let map = Arc::new(MapDisplay::new(&MapSettings::default()));
    let diagnostics = Arc::new(DiagnosticsPanel::new());
    let status = Arc::new(StatusIndicator::new());
    engine.register(map.clone());
    engine.register(diagnostics.clone());
    engine.register(status.clone());

    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = events.clone();
    engine.register(Arc::new(FnObserver::new("recorder", move |e: &LocationEvent| {
        recorded.lock().push(e.clone());
        Ok(())
    })));

    Harness {
        engine,
        sink,
        map,
        diagnostics,
        status,
        events,
    }
}

fn state_events(events: &[LocationEvent]) -> Vec<LocationState> {
    events
        .iter()
        .filter_map(|e| match e {
            LocationEvent::StateChanged(state) => Some(state.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Commit Scenarios
// ============================================================================

#[test]
fn test_commit_beijing_without_accessory() {
    let h = harness();

    let receipt = h
        .engine
        .commit_typed("39.9042", "116.4074", Some("50.0"))
        .unwrap()
        .applied()
        .unwrap();

    assert_eq!(receipt.state.source_kind, SourceKind::Simulated);
    assert_eq!(receipt.state.position(), Some((39.9042, 116.4074)));
    assert_eq!(receipt.delivery, DeliveryOutcome::NoDevice);
    assert_eq!(receipt.command.location_line(), "SETLOC 39.9042,116.4074");
    assert_eq!(receipt.command.altitude_line(), "SETALT 50.0");
    assert!(h.sink.sent().is_empty());

    // Display still updated
    let marker = h.map.view().marker.unwrap();
    assert_eq!(marker.subtitle, "39.904200, 116.407400");
}

#[test]
fn test_out_of_range_commit_is_invisible() {
    let h = harness();

    let result = h.engine.commit_typed("91", "0", None);

    assert_eq!(result, Err(InvalidReason::OutOfRangeLatitude));
    assert_eq!(h.engine.state(), LocationState::initial());
    assert!(h.events.lock().is_empty());
    assert_eq!(h.diagnostics.render_count(), 0);
    assert!(h.sink.sent().is_empty());
}

#[test]
fn test_rejection_messages_are_distinct() {
    let h = harness();
    let mut messages = Vec::new();

    for (lat, lon) in [("", "1"), ("1", ""), ("x", "1"), ("1", "y"), ("95", "1"), ("1", "185")] {
        let outcome = h.engine.dispatch(OperatorAction::SetLocation {
            latitude: lat.to_string(),
            longitude: lon.to_string(),
            altitude: None,
        });
        assert!(!outcome.is_success());
        messages.push(outcome.to_string());
    }

    let mut unique = messages.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), messages.len());
}

#[test]
fn test_commit_with_session_delivers_command() {
    let h = harness();
    let provider = StaticAccessoryProvider::with_accessories(vec![simulator()]);

    h.engine.refresh_from(&provider);
    assert!(h.engine.dispatch(OperatorAction::Connect).is_success());
    assert_eq!(h.status.label(), "Connected");

    let outcome = h.engine.dispatch(OperatorAction::MapLongPress {
        latitude: 48.8584,
        longitude: 2.2945,
    });

    match outcome {
        ActionOutcome::Commit(Scheduled::Applied(receipt)) => {
            assert_eq!(receipt.delivery, DeliveryOutcome::Delivered { accessories: 1 });
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(h.sink.sent(), vec!["SETLOC 48.8584,2.2945\nSETALT 50.0".to_string()]);
}

// ============================================================================
// Device Fix Scenarios
// ============================================================================

#[test]
fn test_out_of_order_fix_is_dropped() {
    let h = harness();

    h.engine.on_device_sample(fix(1.0, 1.0, 5));
    h.engine.on_device_sample(fix(2.0, 2.0, 3));

    let state = h.engine.state();
    assert_eq!(state.source_kind, SourceKind::Live);
    assert_eq!(state.position(), Some((1.0, 1.0)));
    assert_eq!(state.last_device_sample.unwrap().timestamp, at(5));
    assert_eq!(h.engine.stats().samples_dropped, 1);
}

#[test]
fn test_fix_after_commit_keeps_override() {
    let h = harness();
    h.engine.on_device_sample(fix(1.0, 1.0, 1));
    h.engine.commit_map_pick(43.6, 1.4).unwrap();

    h.engine.on_device_sample(fix(1.5, 1.5, 10));

    let state = h.engine.state();
    assert_eq!(state.source_kind, SourceKind::Simulated);
    assert_eq!(state.position(), Some((43.6, 1.4)));
    assert_eq!(state.last_device_sample.unwrap().latitude, 1.5);

    // Map stays on the override, diagnostics follow the device
    assert_eq!(h.map.view().region.center_latitude, 43.6);
    assert_eq!(
        h.diagnostics.sections()[0].value("Latitude"),
        Some("1.500000")
    );
}

#[test]
fn test_use_current_location_stays_simulated() {
    let h = harness();

    assert_eq!(
        h.engine.dispatch(OperatorAction::UseCurrentLocation),
        ActionOutcome::LocationUnavailable
    );

    h.engine.on_device_sample(fix(53.5, 10.0, 1));
    let outcome = h.engine.dispatch(OperatorAction::UseCurrentLocation);
    assert!(outcome.is_success());

    // A later fix does not revert to live
    h.engine.on_device_sample(fix(54.0, 11.0, 2));
    let state = h.engine.state();
    assert_eq!(state.source_kind, SourceKind::Simulated);
    assert_eq!(state.position(), Some((53.5, 10.0)));
}

// ============================================================================
// Accessory Link Scenarios
// ============================================================================

#[test]
fn test_detach_closes_session_and_reports_lost() {
    let h = harness();
    let provider = StaticAccessoryProvider::new();

    assert_eq!(
        h.engine.dispatch(OperatorAction::Connect),
        ActionOutcome::Link(Err(LinkError::NoAccessory))
    );

    provider.attach(simulator());
    h.engine.refresh_from(&provider);
    h.engine.open_session().unwrap();
    assert!(h.status.is_connected());

    provider.detach_all();
    h.engine.refresh_from(&provider);

    assert!(!h.engine.link_state().session_open);
    assert!(!h.status.is_connected());
    assert!(h.events.lock().contains(&LocationEvent::LinkLost));
    assert_eq!(
        h.diagnostics.sections()[2].value("Status"),
        Some(NO_ACCESSORY_TEXT)
    );

    // Reattaching does not reconnect by itself
    provider.attach(simulator());
    h.engine.refresh_from(&provider);
    assert!(!h.engine.link_state().session_open);
}

// ============================================================================
// Fan-out Scenarios
// ============================================================================

#[test]
fn test_all_observers_see_identical_snapshots() {
    let engine = ReconciliationEngine::new();
    let seen: Vec<Arc<Mutex<Vec<LocationEvent>>>> =
        (0..3).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();

    for (i, log) in seen.iter().enumerate() {
        let log = log.clone();
        engine.register(Arc::new(FnObserver::new(
            format!("observer-{}", i),
            move |e: &LocationEvent| {
                log.lock().push(e.clone());
                Ok(())
            },
        )));
    }

    engine.on_device_sample(fix(1.0, 1.0, 1));
    engine.commit_map_pick(2.0, 2.0).unwrap();
    engine.on_device_sample(fix(3.0, 3.0, 2));

    let first = seen[0].lock().clone();
    assert_eq!(first.len(), 3);
    for log in &seen[1..] {
        assert_eq!(*log.lock(), first);
    }
}

#[test]
fn test_failing_observer_does_not_block_others() {
    let h = harness();
    h.engine.register(Arc::new(FnObserver::new("broken", |_: &LocationEvent| {
        Err(ObserverError::new("widget gone"))
    })));
    let late = Arc::new(StatusIndicator::new());
    h.engine.register(late.clone());

    h.engine.refresh_accessories(vec![simulator()]);
    h.engine.open_session().unwrap();

    assert!(late.is_connected());
    assert_eq!(h.engine.stats().observer_failures, 2);
}

#[test]
fn test_reentrant_commit_applies_after_publish() {
    let h = harness();
    let engine = Arc::downgrade(&h.engine);

    // Auto-pin: the first live fix is immediately committed as an override
    h.engine.register(Arc::new(FnObserver::new("auto-pin", move |e: &LocationEvent| {
        if let (LocationEvent::StateChanged(state), Some(engine)) = (e, engine.upgrade()) {
            if state.source_kind == SourceKind::Live {
                let outcome = engine.use_current_location();
                assert!(matches!(outcome, Some(Scheduled::Queued)));
            }
        }
        Ok(())
    })));

    h.engine.on_device_sample(fix(10.0, 20.0, 1));

    let states = state_events(&h.events.lock());
    assert_eq!(states.len(), 2);
    assert_eq!(states[0].source_kind, SourceKind::Live);
    assert_eq!(states[1].source_kind, SourceKind::Simulated);
    assert!(states[1].revision > states[0].revision);
    assert_eq!(h.engine.stats().observer_failures, 0);
}

// ============================================================================
// Async Adapters
// ============================================================================

#[tokio::test]
async fn test_pump_and_broadcast_end_to_end() {
    let shared = SharedLocationEngine::new(ReconciliationEngine::new(), 16);
    let mut rx = shared.subscribe();
    let (tx, events) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let pump = spawn_event_pump(shared.clone(), events, cancel.clone());

    tx.send(SourceEvent::Sample(fix(1.0, 1.0, 5))).await.unwrap();
    tx.send(SourceEvent::Sample(fix(2.0, 2.0, 3))).await.unwrap();
    tx.send(SourceEvent::AccessoriesChanged(vec![simulator()]))
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, LocationEvent::StateChanged(ref s) if s.position() == Some((1.0, 1.0))));

    let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(second, LocationEvent::LinkChanged(ref l) if l.state.attached_count == 1));

    cancel.cancel();
    pump.await.unwrap();

    assert_eq!(shared.position(), Some((1.0, 1.0)));
    assert!(shared.has_position());
}

#[test]
fn test_concurrent_sources_are_serialized() {
    let h = harness();
    let engine = h.engine.clone();

    let device = {
        let engine = engine.clone();
        std::thread::spawn(move || {
            for secs in 1..=100 {
                engine.on_device_sample(fix(1.0, 1.0, secs));
            }
        })
    };
    let operator = {
        let engine = engine.clone();
        std::thread::spawn(move || {
            for i in 0..100 {
                engine.commit_map_pick(i as f64 / 10.0, 0.0).unwrap();
            }
        })
    };
    device.join().unwrap();
    operator.join().unwrap();

    let states = state_events(&h.events.lock());
    assert_eq!(states.len(), 200);
    assert!(states.windows(2).all(|w| w[1].revision == w[0].revision + 1));

    let last = h.engine.state();
    assert_eq!(last.source_kind, SourceKind::Simulated);
    assert_eq!(last.position(), Some((9.9, 0.0)));
}

#[test]
fn test_observer_trait_object_usable() {
    let status: Arc<dyn LocationObserver> = Arc::new(StatusIndicator::new());
    assert_eq!(status.name(), "status");
    let engine = ReconciliationEngine::new();
    let id = engine.register(status);
    assert!(engine.unregister(id));
}
