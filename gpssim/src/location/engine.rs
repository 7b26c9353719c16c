//! Reconciliation Engine - the single authority over the active location.
//!
//! The engine owns the authoritative [`LocationState`] together with the
//! [`LocationSourceTracker`] and [`AccessoryLink`], and is the only place
//! where any of them change.
//!
//! # State machine
//!
//! ```text
//!                 commit (valid)
//!   ┌──────┐ ─────────────────────────▶ ┌───────────┐
//!   │ Live │                            │ Simulated │ ◀─┐ commit (valid)
//!   └──────┘                            └───────────┘ ──┘
//!     ▲  │ device sample                  │ device sample
//!     └──┘ (active = sample)              └─ recorded, active unchanged
//! ```
//!
//! There is no transition back to `Live`: "use current location" commits
//! the latest device fix through the normal commit path and stays
//! `Simulated`.
//!
//! # Serialization
//!
//! Every operation runs under one mutex. State transitions append events
//! to an outbox, and the calling thread then drains the outbox with the
//! lock released, so observers can read the engine (and trigger new work)
//! from inside a callback. Work triggered from inside a callback is not
//! applied immediately: it is queued and applied once the current delivery
//! finishes, and the caller gets [`Scheduled::Queued`]. Other threads
//! wait until the draining thread is done, so commits and samples are
//! applied strictly one at a time in arrival order.
//!
//! An observer must not block on another thread that is itself calling
//! into the engine; that thread waits for the delivery to finish.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use chrono::Utc;
use parking_lot::{Condvar, Mutex, MutexGuard};

use super::accessory::{
    AccessoryDescriptor, AccessoryLink, AccessoryLinkState, AccessoryProvider, LinkError,
    LinkRefresh,
};
use super::action::{ActionOutcome, OperatorAction};
use super::command::{CommandSink, DeliveryOutcome, LoggingCommandSink, OutboundCommand};
use super::fanout::{LinkSnapshot, LocationEvent, LocationObserver, ObserverFanout, ObserverId};
use super::state::{CandidateCoordinate, CoordinateOrigin, LocationSample, LocationState};
use super::tracker::{AuthorizationStatus, LocationSourceTracker, SampleDisposition, SourceError};
use super::validator::{self, InvalidReason};

/// Result of an engine operation that may be deferred.
#[derive(Debug, Clone, PartialEq)]
pub enum Scheduled<T> {
    /// The operation ran and this is its result.
    Applied(T),
    /// The operation was called from inside an observer callback and will
    /// run after the current delivery completes.
    Queued,
}

impl<T> Scheduled<T> {
    /// The result if the operation already ran.
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Queued => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Everything a caller learns from an accepted commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    /// State after the commit.
    pub state: LocationState,

    /// Command produced for the accessory.
    pub command: OutboundCommand,

    /// Whether the command reached an accessory.
    pub delivery: DeliveryOutcome,
}

/// Outcome of an accepted commit.
pub type CommitOutcome = Scheduled<CommitReceipt>;

/// Counters for engine activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Device samples that became the current fix.
    pub samples_accepted: u64,

    /// Device samples dropped as out of order.
    pub samples_dropped: u64,

    /// Commits applied.
    pub commits: u64,

    /// Commits rejected by validation.
    pub commits_rejected: u64,

    /// Commands the sink accepted.
    pub commands_delivered: u64,

    /// Commands whose sink panicked.
    pub command_failures: u64,

    /// Events published to observers.
    pub events_published: u64,

    /// Individual observer failures.
    pub observer_failures: u64,
}

/// Source-side status for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub authorization: AuthorizationStatus,
    pub services_enabled: bool,
    pub last_error: Option<SourceError>,
}

/// Engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// Destination for outbound commands.
    pub sink: Arc<dyn CommandSink>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sink: Arc::new(LoggingCommandSink),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig").finish_non_exhaustive()
    }
}

/// Work deferred from inside an observer callback.
#[derive(Debug)]
enum Deferred {
    Sample(LocationSample),
    Commit(CandidateCoordinate),
    UseCurrentLocation,
    Failure(SourceError),
    Authorization(AuthorizationStatus),
    ServicesEnabled(bool),
    Accessories(Vec<AccessoryDescriptor>),
    OpenSession,
    CloseSession,
}

/// Side effect waiting to run outside the lock.
#[derive(Debug)]
enum Outgoing {
    Event(LocationEvent),
    Command(OutboundCommand),
}

/// Everything guarded by the engine mutex.
struct Core {
    state: LocationState,
    tracker: LocationSourceTracker,
    link: AccessoryLink,
    stats: EngineStats,
    outbox: VecDeque<Outgoing>,
    deferred: VecDeque<Deferred>,
    /// Thread currently draining the outbox.
    publishing: Option<ThreadId>,
}

impl Core {
    fn new() -> Self {
        Self {
            state: LocationState::initial(),
            tracker: LocationSourceTracker::new(),
            link: AccessoryLink::new(),
            stats: EngineStats::default(),
            outbox: VecDeque::new(),
            deferred: VecDeque::new(),
            publishing: None,
        }
    }

    fn emit(&mut self, event: LocationEvent) {
        self.outbox.push_back(Outgoing::Event(event));
    }

    fn apply_sample(&mut self, sample: LocationSample) -> SampleDisposition {
        let disposition = self.tracker.on_sample(sample);
        match disposition {
            SampleDisposition::Stale => {
                self.stats.samples_dropped += 1;
            }
            SampleDisposition::Accepted => {
                self.stats.samples_accepted += 1;
                self.state = self.state.with_device_sample(sample);
                self.emit(LocationEvent::StateChanged(self.state.clone()));
            }
        }
        disposition
    }

    fn apply_commit(&mut self, candidate: CandidateCoordinate) -> CommitReceipt {
        self.state = self.state.with_commit(candidate, Utc::now());
        self.stats.commits += 1;

        let command = OutboundCommand::from_candidate(&candidate);
        let delivery = DeliveryOutcome::for_link(self.link.state());

        tracing::info!(
            latitude = candidate.latitude,
            longitude = candidate.longitude,
            altitude = candidate.altitude,
            origin = %candidate.origin,
            delivery = %delivery,
            "Location committed"
        );

        self.emit(LocationEvent::StateChanged(self.state.clone()));
        if delivery.is_delivered() {
            self.outbox.push_back(Outgoing::Command(command));
        } else {
            tracing::debug!("No accessory attached, command not delivered");
        }

        CommitReceipt {
            state: self.state.clone(),
            command,
            delivery,
        }
    }

    /// Commit the newest fix as it stands now, not as it stood when the
    /// request was made.
    fn apply_use_current(&mut self) -> Option<CommitReceipt> {
        let sample = self.tracker.current().copied()?;
        Some(self.apply_commit(CandidateCoordinate::from_sample(&sample)))
    }

    fn apply_failure(&mut self, error: SourceError) {
        tracing::warn!(error = %error, "Location source failure");
        self.tracker.record_error(error.clone());
        self.emit(LocationEvent::SourceFailed(error));
    }

    fn apply_authorization(&mut self, status: AuthorizationStatus) {
        if self.tracker.authorization() == status {
            return;
        }
        tracing::info!(authorization = %status, "Location authorization changed");
        self.tracker.set_authorization(status);
        self.emit(LocationEvent::AuthorizationChanged(status));
    }

    fn apply_services_enabled(&mut self, enabled: bool) {
        if self.tracker.services_enabled() == enabled {
            return;
        }
        tracing::info!(enabled, "Location services changed");
        self.tracker.set_services_enabled(enabled);
        self.emit(LocationEvent::ServicesChanged(enabled));
    }

    fn apply_accessories(&mut self, attached: Vec<AccessoryDescriptor>) -> LinkRefresh {
        let descriptors_changed = self.link.attached() != attached.as_slice();
        let refresh = self.link.refresh(attached);

        if refresh.changed || descriptors_changed {
            self.emit_link_changed();
        }
        if refresh.lost {
            self.emit(LocationEvent::LinkLost);
        }
        refresh
    }

    fn apply_open_session(&mut self) -> Result<AccessoryLinkState, LinkError> {
        let before = self.link.state();
        let state = self.link.open_session()?;
        if state != before {
            tracing::info!(accessories = state.attached_count, "Accessory session opened");
            self.emit_link_changed();
        }
        Ok(state)
    }

    fn apply_close_session(&mut self) -> AccessoryLinkState {
        let before = self.link.state();
        let state = self.link.close_session();
        if state != before {
            tracing::info!("Accessory session closed");
            self.emit_link_changed();
        }
        state
    }

    fn emit_link_changed(&mut self) {
        let snapshot = LinkSnapshot {
            state: self.link.state(),
            accessories: self.link.attached().to_vec(),
        };
        self.emit(LocationEvent::LinkChanged(snapshot));
    }

    fn apply_deferred(&mut self, work: Deferred) {
        match work {
            Deferred::Sample(sample) => {
                self.apply_sample(sample);
            }
            Deferred::Commit(candidate) => {
                self.apply_commit(candidate);
            }
            Deferred::UseCurrentLocation => {
                if self.apply_use_current().is_none() {
                    tracing::debug!("Queued use-current-location found no fix");
                }
            }
            Deferred::Failure(error) => self.apply_failure(error),
            Deferred::Authorization(status) => self.apply_authorization(status),
            Deferred::ServicesEnabled(enabled) => self.apply_services_enabled(enabled),
            Deferred::Accessories(attached) => {
                self.apply_accessories(attached);
            }
            Deferred::OpenSession => {
                if let Err(e) = self.apply_open_session() {
                    tracing::warn!(error = %e, "Queued session open failed");
                }
            }
            Deferred::CloseSession => {
                self.apply_close_session();
            }
        }
    }
}

/// The Location Reconciliation Engine.
pub struct ReconciliationEngine {
    core: Mutex<Core>,
    idle: Condvar,
    fanout: ObserverFanout,
    sink: Arc<dyn CommandSink>,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    /// Create an engine that logs outbound commands.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            core: Mutex::new(Core::new()),
            idle: Condvar::new(),
            fanout: ObserverFanout::new(),
            sink: config.sink,
        }
    }

    /// Create an engine that sends commands to `sink`.
    pub fn with_sink(sink: Arc<dyn CommandSink>) -> Self {
        Self::with_config(EngineConfig { sink })
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register an observer for every future event.
    pub fn register(&self, observer: Arc<dyn LocationObserver>) -> ObserverId {
        self.fanout.register(observer)
    }

    /// Remove an observer.
    pub fn unregister(&self, id: ObserverId) -> bool {
        self.fanout.unregister(id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.fanout.len()
    }

    // =========================================================================
    // Inbound events
    // =========================================================================

    /// Ingest a device fix.
    pub fn on_device_sample(&self, sample: LocationSample) -> Scheduled<SampleDisposition> {
        self.submit(Deferred::Sample(sample), |core| core.apply_sample(sample))
    }

    /// Record a location source failure. The last fix is kept.
    pub fn on_source_error(&self, error: SourceError) {
        let queued = error.clone();
        self.submit(Deferred::Failure(queued), |core| core.apply_failure(error));
    }

    /// Record an authorization change.
    pub fn on_authorization_changed(&self, status: AuthorizationStatus) {
        self.submit(Deferred::Authorization(status), |core| {
            core.apply_authorization(status)
        });
    }

    /// Record whether location services are enabled system-wide.
    pub fn set_services_enabled(&self, enabled: bool) {
        self.submit(Deferred::ServicesEnabled(enabled), |core| {
            core.apply_services_enabled(enabled)
        });
    }

    /// Recompute the accessory link from a list of attached accessories.
    pub fn refresh_accessories(&self, attached: Vec<AccessoryDescriptor>) -> Scheduled<LinkRefresh> {
        let queued = attached.clone();
        self.submit(Deferred::Accessories(queued), |core| {
            core.apply_accessories(attached)
        })
    }

    /// Query `provider` and recompute the accessory link.
    pub fn refresh_from(&self, provider: &dyn AccessoryProvider) -> Scheduled<LinkRefresh> {
        self.refresh_accessories(provider.list_attached())
    }

    // =========================================================================
    // Operator operations
    // =========================================================================

    /// Commit a candidate coordinate.
    ///
    /// Candidates from [`CoordinateOrigin::DeviceGps`] skip validation.
    /// A rejected candidate changes nothing and reaches no observer.
    pub fn request_commit(
        &self,
        candidate: CandidateCoordinate,
    ) -> Result<CommitOutcome, InvalidReason> {
        let candidate = match validator::validate_candidate(candidate) {
            Ok(candidate) => candidate,
            Err(reason) => return Err(self.reject(reason)),
        };
        Ok(self.submit(Deferred::Commit(candidate), |core| {
            core.apply_commit(candidate)
        }))
    }

    /// Validate and commit typed text.
    pub fn commit_typed(
        &self,
        latitude: &str,
        longitude: &str,
        altitude: Option<&str>,
    ) -> Result<CommitOutcome, InvalidReason> {
        match validator::validate(latitude, longitude, altitude) {
            Ok(candidate) => self.request_commit(candidate),
            Err(reason) => Err(self.reject(reason)),
        }
    }

    /// Commit a coordinate picked on the map.
    pub fn commit_map_pick(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CommitOutcome, InvalidReason> {
        match validator::validate_coordinate(latitude, longitude, None, CoordinateOrigin::MapPick) {
            Ok(candidate) => self.request_commit(candidate),
            Err(reason) => Err(self.reject(reason)),
        }
    }

    /// Commit the latest device fix as the simulated location.
    ///
    /// The fix is read at the serialization point, so a sample applied or
    /// queued ahead of this call is the one committed. Returns `None` if no
    /// fix has been received (or queued) yet.
    pub fn use_current_location(&self) -> Option<CommitOutcome> {
        let mut core = self.core.lock();
        let me = thread::current().id();

        if core.publishing == Some(me) {
            let fix_queued = core
                .deferred
                .iter()
                .any(|work| matches!(work, Deferred::Sample(_)));
            if core.tracker.current().is_none() && !fix_queued {
                return None;
            }
            core.deferred.push_back(Deferred::UseCurrentLocation);
            return Some(Scheduled::Queued);
        }

        self.wait_idle(&mut core);
        let receipt = core.apply_use_current();
        self.drain(core, me);
        receipt.map(Scheduled::Applied)
    }

    /// Open a session with the attached accessories.
    pub fn open_session(&self) -> Result<Scheduled<AccessoryLinkState>, LinkError> {
        let mut core = self.core.lock();
        let me = thread::current().id();

        if core.publishing == Some(me) {
            if !core.link.state().has_accessory() {
                return Err(LinkError::NoAccessory);
            }
            core.deferred.push_back(Deferred::OpenSession);
            return Ok(Scheduled::Queued);
        }

        self.wait_idle(&mut core);
        let result = core.apply_open_session();
        self.drain(core, me);
        result.map(Scheduled::Applied)
    }

    /// Close the session. Always succeeds.
    pub fn close_session(&self) -> Scheduled<AccessoryLinkState> {
        self.submit(Deferred::CloseSession, Core::apply_close_session)
    }

    /// Route an operator action to the matching operation.
    pub fn dispatch(&self, action: OperatorAction) -> ActionOutcome {
        tracing::debug!(action = ?action, "Dispatching operator action");
        match action {
            OperatorAction::MapLongPress {
                latitude,
                longitude,
            } => ActionOutcome::from_commit(self.commit_map_pick(latitude, longitude)),
            OperatorAction::UseCurrentLocation => match self.use_current_location() {
                Some(outcome) => ActionOutcome::Commit(outcome),
                None => ActionOutcome::LocationUnavailable,
            },
            OperatorAction::SetLocation {
                latitude,
                longitude,
                altitude,
            } => ActionOutcome::from_commit(self.commit_typed(
                &latitude,
                &longitude,
                altitude.as_deref(),
            )),
            OperatorAction::Connect => ActionOutcome::Link(self.open_session()),
            OperatorAction::Disconnect => ActionOutcome::Link(Ok(self.close_session())),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current authoritative snapshot.
    pub fn state(&self) -> LocationState {
        self.core.lock().state.clone()
    }

    /// Current accessory link state.
    pub fn link_state(&self) -> AccessoryLinkState {
        self.core.lock().link.state()
    }

    /// Accessories seen at the last refresh.
    pub fn accessories(&self) -> Vec<AccessoryDescriptor> {
        self.core.lock().link.attached().to_vec()
    }

    /// Newest device fix, if any.
    pub fn current_sample(&self) -> Option<LocationSample> {
        self.core.lock().tracker.current().copied()
    }

    /// Authorization, services flag and last failure.
    pub fn source_status(&self) -> SourceStatus {
        let core = self.core.lock();
        SourceStatus {
            authorization: core.tracker.authorization(),
            services_enabled: core.tracker.services_enabled(),
            last_error: core.tracker.last_error().cloned(),
        }
    }

    /// Activity counters.
    pub fn stats(&self) -> EngineStats {
        self.core.lock().stats
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Run `apply` at the serialization point, or queue `deferred` if the
    /// calling thread is currently delivering events.
    fn submit<T>(&self, deferred: Deferred, apply: impl FnOnce(&mut Core) -> T) -> Scheduled<T> {
        let mut core = self.core.lock();
        let me = thread::current().id();

        if core.publishing == Some(me) {
            tracing::debug!(work = ?deferred, "Queueing work raised during delivery");
            core.deferred.push_back(deferred);
            return Scheduled::Queued;
        }

        self.wait_idle(&mut core);
        let value = apply(&mut core);
        self.drain(core, me);
        Scheduled::Applied(value)
    }

    fn wait_idle(&self, core: &mut MutexGuard<'_, Core>) {
        while core.publishing.is_some() {
            self.idle.wait(core);
        }
    }

    /// Deliver everything in the outbox, then apply queued work, until both
    /// are empty.
    fn drain(&self, mut core: MutexGuard<'_, Core>, me: ThreadId) {
        core.publishing = Some(me);

        loop {
            if let Some(item) = core.outbox.pop_front() {
                let failures = MutexGuard::unlocked(&mut core, || self.deliver(&item));
                match item {
                    Outgoing::Event(_) => {
                        core.stats.events_published += 1;
                        core.stats.observer_failures += failures;
                    }
                    Outgoing::Command(_) if failures == 0 => core.stats.commands_delivered += 1,
                    Outgoing::Command(_) => core.stats.command_failures += failures,
                }
                continue;
            }

            match core.deferred.pop_front() {
                Some(work) => core.apply_deferred(work),
                None => break,
            }
        }

        core.publishing = None;
        drop(core);
        self.idle.notify_all();
    }

    /// Returns the number of failed deliveries: failing observers for an
    /// event, 1 for a command whose sink panicked.
    fn deliver(&self, item: &Outgoing) -> u64 {
        match item {
            Outgoing::Event(event) => self.fanout.publish(event).failed.len() as u64,
            Outgoing::Command(command) => {
                let sent = catch_unwind(AssertUnwindSafe(|| self.sink.send(command)));
                if sent.is_err() {
                    tracing::error!(command = %command.text(), "Command sink panicked");
                    return 1;
                }
                0
            }
        }
    }

    fn reject(&self, reason: InvalidReason) -> InvalidReason {
        tracing::debug!(reason = %reason, "Commit rejected");
        self.core.lock().stats.commits_rejected += 1;
        reason
    }
}
