//! Location Source Tracker - latest device fix plus liveness state.
//!
//! Ingests samples pushed by the device location service and keeps the
//! newest one. Samples that arrive out of order (older timestamp than the
//! current one) are dropped so stale data never overwrites newer data.
//!
//! Having no fix at all is a valid, permanent state: [`current`] returns
//! `None`, meaning "unknown".
//!
//! [`current`]: LocationSourceTracker::current

use std::time::Instant;

use super::state::LocationSample;

/// Authorization granted to the device location service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// Access is restricted by policy.
    Restricted,
    /// The user refused access.
    Denied,
    /// Access granted at all times.
    AuthorizedAlways,
    /// Access granted while the app is in use.
    AuthorizedWhenInUse,
}

impl AuthorizationStatus {
    /// Returns true if location updates may be delivered.
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::AuthorizedAlways | Self::AuthorizedWhenInUse)
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDetermined => write!(f, "Not determined"),
            Self::Restricted => write!(f, "Restricted"),
            Self::Denied => write!(f, "Denied"),
            Self::AuthorizedAlways => write!(f, "Always"),
            Self::AuthorizedWhenInUse => write!(f, "While in use"),
        }
    }
}

impl std::str::FromStr for AuthorizationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "notdetermined" => Ok(Self::NotDetermined),
            "restricted" => Ok(Self::Restricted),
            "denied" => Ok(Self::Denied),
            "always" | "authorizedalways" => Ok(Self::AuthorizedAlways),
            "wheninuse" | "authorizedwheninuse" => Ok(Self::AuthorizedWhenInUse),
            other => Err(format!("unknown authorization status '{}'", other)),
        }
    }
}

/// Failure reported by the device location service.
///
/// Source errors are informational: they never clear the last known fix
/// and never affect a simulated override.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Location services are switched off system-wide.
    #[error("Location services are disabled")]
    ServicesDisabled,

    /// The app is not allowed to read the location.
    #[error("Location access denied")]
    AccessDenied,

    /// A fix could not be obtained right now.
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// What the tracker did with a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDisposition {
    /// The sample is now the current fix.
    Accepted,
    /// The sample was older than the current fix and was dropped.
    Stale,
}

/// Tracks the newest device fix and the health of the location service.
#[derive(Debug)]
pub struct LocationSourceTracker {
    /// Newest fix (None until the first sample).
    current: Option<LocationSample>,

    /// When the current fix was received (local clock).
    received_at: Option<Instant>,

    /// Most recent failure, cleared by the next accepted sample.
    last_error: Option<SourceError>,

    /// Authorization as last reported by the service.
    authorization: AuthorizationStatus,

    /// Whether location services are enabled system-wide.
    services_enabled: bool,
}

impl Default for LocationSourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationSourceTracker {
    /// Create a tracker with no fix.
    pub fn new() -> Self {
        Self {
            current: None,
            received_at: None,
            last_error: None,
            authorization: AuthorizationStatus::NotDetermined,
            services_enabled: true,
        }
    }

    /// Ingest a sample from the location service.
    ///
    /// Equal timestamps are accepted (the later delivery wins); strictly
    /// older timestamps are dropped.
    pub fn on_sample(&mut self, sample: LocationSample) -> SampleDisposition {
        if let Some(current) = &self.current {
            if sample.is_older_than(current) {
                tracing::debug!(
                    sample_time = %sample.timestamp,
                    current_time = %current.timestamp,
                    "Dropping out-of-order location sample"
                );
                return SampleDisposition::Stale;
            }
        }

        self.current = Some(sample);
        self.received_at = Some(Instant::now());
        self.last_error = None;
        SampleDisposition::Accepted
    }

    /// Newest fix, or `None` if the location is unknown.
    pub fn current(&self) -> Option<&LocationSample> {
        self.current.as_ref()
    }

    /// Time since the current fix was received.
    pub fn age(&self) -> Option<std::time::Duration> {
        self.received_at.map(|at| at.elapsed())
    }

    /// Record a failure from the location service.
    ///
    /// The current fix is kept.
    pub fn record_error(&mut self, error: SourceError) {
        if error == SourceError::ServicesDisabled {
            self.services_enabled = false;
        }
        self.last_error = Some(error);
    }

    /// Most recent failure since the last accepted sample.
    pub fn last_error(&self) -> Option<&SourceError> {
        self.last_error.as_ref()
    }

    /// Record an authorization change.
    pub fn set_authorization(&mut self, status: AuthorizationStatus) {
        self.authorization = status;
    }

    /// Authorization as last reported.
    pub fn authorization(&self) -> AuthorizationStatus {
        self.authorization
    }

    /// Record whether location services are enabled.
    pub fn set_services_enabled(&mut self, enabled: bool) {
        self.services_enabled = enabled;
    }

    /// Whether location services are enabled.
    pub fn services_enabled(&self) -> bool {
        self.services_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(lat: f64, lon: f64, secs: i64) -> LocationSample {
        LocationSample::new(lat, lon, 0.0, Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn test_no_samples_is_unknown() {
        let tracker = LocationSourceTracker::new();
        assert!(tracker.current().is_none());
        assert!(tracker.age().is_none());
    }

    #[test]
    fn test_newer_sample_replaces_current() {
        let mut tracker = LocationSourceTracker::new();

        assert_eq!(tracker.on_sample(sample(1.0, 1.0, 3)), SampleDisposition::Accepted);
        assert_eq!(tracker.on_sample(sample(2.0, 2.0, 5)), SampleDisposition::Accepted);

        assert_eq!(tracker.current().unwrap().latitude, 2.0);
        assert!(tracker.age().is_some());
    }

    #[test]
    fn test_out_of_order_sample_is_dropped() {
        let mut tracker = LocationSourceTracker::new();

        tracker.on_sample(sample(1.0, 1.0, 5));
        assert_eq!(tracker.on_sample(sample(2.0, 2.0, 3)), SampleDisposition::Stale);

        assert_eq!(tracker.current().unwrap().latitude, 1.0);
    }

    #[test]
    fn test_equal_timestamp_is_accepted() {
        let mut tracker = LocationSourceTracker::new();

        tracker.on_sample(sample(1.0, 1.0, 5));
        assert_eq!(tracker.on_sample(sample(2.0, 2.0, 5)), SampleDisposition::Accepted);
        assert_eq!(tracker.current().unwrap().latitude, 2.0);
    }

    #[test]
    fn test_error_keeps_last_fix() {
        let mut tracker = LocationSourceTracker::new();
        tracker.on_sample(sample(1.0, 1.0, 5));

        tracker.record_error(SourceError::Unavailable("no signal".to_string()));

        assert_eq!(tracker.current().unwrap().latitude, 1.0);
        assert_eq!(
            tracker.last_error(),
            Some(&SourceError::Unavailable("no signal".to_string()))
        );

        // Next accepted sample clears the transient error
        tracker.on_sample(sample(2.0, 2.0, 6));
        assert!(tracker.last_error().is_none());
    }

    #[test]
    fn test_services_disabled_error_updates_flag() {
        let mut tracker = LocationSourceTracker::new();
        assert!(tracker.services_enabled());

        tracker.record_error(SourceError::ServicesDisabled);
        assert!(!tracker.services_enabled());
    }

    #[test]
    fn test_authorization_tracking() {
        let mut tracker = LocationSourceTracker::new();
        assert_eq!(tracker.authorization(), AuthorizationStatus::NotDetermined);
        assert!(!tracker.authorization().is_authorized());

        tracker.set_authorization(AuthorizationStatus::AuthorizedWhenInUse);
        assert!(tracker.authorization().is_authorized());
    }

    #[test]
    fn test_authorization_parse() {
        assert_eq!(
            "when-in-use".parse::<AuthorizationStatus>(),
            Ok(AuthorizationStatus::AuthorizedWhenInUse)
        );
        assert_eq!("Denied".parse::<AuthorizationStatus>(), Ok(AuthorizationStatus::Denied));
        assert_eq!(
            "not_determined".parse::<AuthorizationStatus>(),
            Ok(AuthorizationStatus::NotDetermined)
        );
        assert!("maybe".parse::<AuthorizationStatus>().is_err());
    }
}
