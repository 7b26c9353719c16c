//! Core state types for location reconciliation.
//!
//! This module defines the fundamental types used throughout the engine:
//!
//! - [`LocationSample`] - A raw fix reported by the device location service
//! - [`CandidateCoordinate`] - An operator-supplied coordinate awaiting commit
//! - [`CoordinateOrigin`] - Where a candidate coordinate came from
//! - [`SourceKind`] - Is the displayed location live or simulated?
//! - [`ActiveLocation`] - The value currently displayed and transmitted
//! - [`LocationState`] - The authoritative snapshot handed to every consumer

use chrono::{DateTime, Utc};

/// Altitude in meters used when the operator leaves the field empty or
/// types something unparsable.
pub const DEFAULT_ALTITUDE: f64 = 50.0;

/// A location fix reported by the device location service.
///
/// Samples are immutable once created. A newer sample supersedes an older
/// one; it never mutates it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Altitude in meters.
    pub altitude: f64,

    /// Radius of uncertainty for the horizontal position, in meters.
    pub horizontal_accuracy: f64,

    /// Uncertainty of the altitude, in meters.
    pub vertical_accuracy: f64,

    /// When the fix was measured by the device.
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    /// Create a sample with unknown (zero) accuracy.
    pub fn new(latitude: f64, longitude: f64, altitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            horizontal_accuracy: 0.0,
            vertical_accuracy: 0.0,
            timestamp,
        }
    }

    /// Attach horizontal and vertical accuracy in meters.
    pub fn with_accuracy(mut self, horizontal: f64, vertical: f64) -> Self {
        self.horizontal_accuracy = horizontal;
        self.vertical_accuracy = vertical;
        self
    }

    /// Returns true if this sample was measured strictly before `other`.
    #[inline]
    pub fn is_older_than(&self, other: &Self) -> bool {
        self.timestamp < other.timestamp
    }
}

/// Origin of a candidate coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateOrigin {
    /// Re-derived from the latest device fix ("use current location").
    DeviceGps,
    /// Picked with a long-press on the map.
    MapPick,
    /// Typed into the latitude/longitude/altitude fields.
    TypedInput,
}

impl std::fmt::Display for CoordinateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceGps => write!(f, "Device GPS"),
            Self::MapPick => write!(f, "Map pick"),
            Self::TypedInput => write!(f, "Typed input"),
        }
    }
}

/// A coordinate proposed by the operator.
///
/// Candidates are transient: they are either committed (and become the
/// active location) or rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateCoordinate {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Altitude in meters.
    pub altitude: f64,

    /// Where this coordinate came from.
    pub origin: CoordinateOrigin,
}

impl CandidateCoordinate {
    /// Create a candidate coordinate.
    pub fn new(latitude: f64, longitude: f64, altitude: f64, origin: CoordinateOrigin) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            origin,
        }
    }

    /// Derive a candidate from a device sample.
    ///
    /// Device samples are valid by construction, so the result is tagged
    /// [`CoordinateOrigin::DeviceGps`] and skips validation on commit.
    pub fn from_sample(sample: &LocationSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude: sample.altitude,
            origin: CoordinateOrigin::DeviceGps,
        }
    }
}

/// Whether the active location follows the device or an operator override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Displayed location equals the most recent device fix.
    #[default]
    Live,
    /// Displayed location equals an operator-committed override.
    Simulated,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "Live"),
            Self::Simulated => write!(f, "Simulated"),
        }
    }
}

/// The location currently displayed and transmitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActiveLocation {
    /// A device fix, shown while tracking live.
    Device(LocationSample),
    /// An operator commit, shown while simulating.
    Committed(CandidateCoordinate),
}

impl ActiveLocation {
    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        match self {
            Self::Device(sample) => sample.latitude,
            Self::Committed(candidate) => candidate.latitude,
        }
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        match self {
            Self::Device(sample) => sample.longitude,
            Self::Committed(candidate) => candidate.longitude,
        }
    }

    /// Altitude in meters.
    pub fn altitude(&self) -> f64 {
        match self {
            Self::Device(sample) => sample.altitude,
            Self::Committed(candidate) => candidate.altitude,
        }
    }

    /// Position as (lat, lon).
    pub fn position(&self) -> (f64, f64) {
        (self.latitude(), self.longitude())
    }

    /// Origin of the committed coordinate, `None` for a device fix.
    pub fn origin(&self) -> Option<CoordinateOrigin> {
        match self {
            Self::Device(_) => None,
            Self::Committed(candidate) => Some(candidate.origin),
        }
    }
}

/// Authoritative location snapshot.
///
/// Exactly one `LocationState` is current at any instant. The engine
/// replaces it wholesale on every accepted change; consumers only ever
/// see immutable copies.
///
/// # Invariants
///
/// - `active` is the most recently committed value (or the latest device
///   fix while `Live`).
/// - `last_device_sample` tracks the newest device reading regardless of
///   what is displayed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationState {
    /// Location currently displayed and transmitted (`None` until known).
    pub active: Option<ActiveLocation>,

    /// Live tracking or operator override.
    pub source_kind: SourceKind,

    /// Newest raw device reading.
    pub last_device_sample: Option<LocationSample>,

    /// When the operator last committed a location.
    pub last_commit: Option<DateTime<Utc>>,

    /// Monotonic revision, incremented on every replacement.
    pub revision: u64,
}

impl LocationState {
    /// Initial state: live, nothing known.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Current position as (lat, lon), if any.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.active.map(|active| active.position())
    }

    /// Returns true while an operator override is displayed.
    pub fn is_simulated(&self) -> bool {
        self.source_kind == SourceKind::Simulated
    }

    /// Next state after a device fix arrives.
    ///
    /// The fix always becomes `last_device_sample`. It becomes `active`
    /// only while live; a simulated override is never clobbered.
    pub(crate) fn with_device_sample(&self, sample: LocationSample) -> Self {
        let active = match self.source_kind {
            SourceKind::Live => Some(ActiveLocation::Device(sample)),
            SourceKind::Simulated => self.active,
        };
        Self {
            active,
            source_kind: self.source_kind,
            last_device_sample: Some(sample),
            last_commit: self.last_commit,
            revision: self.revision + 1,
        }
    }

    /// Next state after a commit is accepted.
    pub(crate) fn with_commit(&self, candidate: CandidateCoordinate, at: DateTime<Utc>) -> Self {
        Self {
            active: Some(ActiveLocation::Committed(candidate)),
            source_kind: SourceKind::Simulated,
            last_device_sample: self.last_device_sample,
            last_commit: Some(at),
            revision: self.revision + 1,
        }
    }
}
