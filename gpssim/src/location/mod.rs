//! Location Reconciliation Engine
//!
//! This module owns the **single authoritative location** used for display
//! and for transmission to a GPS-simulation accessory. Three sources compete
//! for it:
//!
//! - **Device GPS** → pushed by the location service, tracked continuously
//! - **Map pick** → a long-press on the map
//! - **Typed input** → latitude/longitude/altitude fields
//!
//! # Live vs Simulated
//!
//! While `Live`, every accepted device fix becomes the active location.
//! The first valid operator commit switches to `Simulated`; from then on
//! device fixes are still recorded but never replace the override.
//!
//! # Usage
//!
//! ```ignore
//! use gpssim::location::{
//!     OperatorAction, ReconciliationEngine, SharedLocationEngine, LocationProvider,
//! };
//!
//! let shared = SharedLocationEngine::new(ReconciliationEngine::new(), 16);
//!
//! // Operator taps "set location"
//! let outcome = shared.engine().dispatch(OperatorAction::SetLocation {
//!     latitude: "39.9042".into(),
//!     longitude: "116.4074".into(),
//!     altitude: None,
//! });
//! println!("{}", outcome);
//!
//! // Async consumers
//! let mut rx = shared.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     // Handle event
//! }
//! ```
//!
//! # Components
//!
//! - [`state`] - Core types: `LocationSample`, `CandidateCoordinate`, `LocationState`
//! - [`validator`] - Coordinate validation rules
//! - [`tracker`] - `LocationSourceTracker` for device fixes and authorization
//! - [`accessory`] - `AccessoryLink` session state and accessory descriptors
//! - [`command`] - `SETLOC`/`SETALT` formatting and command sinks
//! - [`fanout`] - `ObserverFanout` and the observer contract
//! - [`engine`] - `ReconciliationEngine`, the serialization point
//! - [`action`] - Operator actions and their outcomes
//! - [`provider`] - `LocationProvider` trait and `SharedLocationEngine`

pub mod accessory;
pub mod action;
mod broadcast;
pub mod command;
pub mod engine;
pub mod fanout;
mod logger;
pub mod provider;
mod pump;
pub mod state;
pub mod tracker;
pub mod validator;

pub use accessory::{
    AccessoryDescriptor, AccessoryLink, AccessoryLinkState, AccessoryProvider, LinkError,
    LinkRefresh, StaticAccessoryProvider,
};
pub use action::{ActionOutcome, OperatorAction, LOCATION_UNAVAILABLE_MESSAGE};
pub use broadcast::{BroadcastObserver, DEFAULT_BROADCAST_CAPACITY};
pub use command::{
    format_command, CommandSink, DeliveryOutcome, LoggingCommandSink, OutboundCommand,
    RecordingCommandSink,
};
pub use engine::{
    CommitOutcome, CommitReceipt, EngineConfig, EngineStats, ReconciliationEngine, Scheduled,
    SourceStatus,
};
pub use fanout::{
    FnObserver, LinkSnapshot, LocationEvent, LocationObserver, ObserverError, ObserverFanout,
    ObserverId, PublishReport,
};
pub use logger::{spawn_location_logger, DEFAULT_LOG_INTERVAL};
pub use provider::{LocationBroadcaster, LocationProvider, SharedLocationEngine};
pub use pump::{spawn_event_pump, PumpSummary, SourceEvent};
pub use state::{
    ActiveLocation, CandidateCoordinate, CoordinateOrigin, LocationSample, LocationState,
    SourceKind, DEFAULT_ALTITUDE,
};
pub use tracker::{AuthorizationStatus, LocationSourceTracker, SampleDisposition, SourceError};
pub use validator::{
    validate, validate_coordinate, validate_text, CoordinateField, InvalidReason,
    ValidationResult,
};
