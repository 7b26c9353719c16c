//! Operator actions.
//!
//! Every control the operator can touch maps to one [`OperatorAction`],
//! routed through [`ReconciliationEngine::dispatch`]. The action carries the
//! raw input; the engine decides what it means.
//!
//! [`ReconciliationEngine::dispatch`]: super::ReconciliationEngine::dispatch

use super::accessory::{AccessoryLinkState, LinkError};
use super::engine::{CommitOutcome, Scheduled};
use super::validator::InvalidReason;

/// Message shown when "use current location" has no fix to work with.
pub const LOCATION_UNAVAILABLE_MESSAGE: &str =
    "Unable to get the current location. Grant location permission and wait for a fix.";

/// Something the operator asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorAction {
    /// Long-press on the map at a coordinate.
    MapLongPress { latitude: f64, longitude: f64 },

    /// Commit the latest device fix.
    UseCurrentLocation,

    /// Commit typed latitude/longitude/altitude text.
    SetLocation {
        latitude: String,
        longitude: String,
        altitude: Option<String>,
    },

    /// Open a session with the attached accessories.
    Connect,

    /// Close the accessory session.
    Disconnect,
}

/// What came of an operator action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// A coordinate was committed (or queued for commit).
    Commit(CommitOutcome),

    /// The coordinate was rejected; nothing changed.
    Rejected(InvalidReason),

    /// No device fix is known yet.
    LocationUnavailable,

    /// Result of a connect or disconnect.
    Link(Result<Scheduled<AccessoryLinkState>, LinkError>),
}

impl ActionOutcome {
    pub(crate) fn from_commit(result: Result<CommitOutcome, InvalidReason>) -> Self {
        match result {
            Ok(outcome) => Self::Commit(outcome),
            Err(reason) => Self::Rejected(reason),
        }
    }

    /// Returns true if the action was accepted.
    pub fn is_success(&self) -> bool {
        match self {
            Self::Commit(_) => true,
            Self::Link(result) => result.is_ok(),
            Self::Rejected(_) | Self::LocationUnavailable => false,
        }
    }
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit(Scheduled::Applied(receipt)) => match receipt.state.position() {
                Some((lat, lon)) => write!(
                    f,
                    "Location set to {:.6}, {:.6} ({})",
                    lat, lon, receipt.delivery
                ),
                None => write!(f, "Location set ({})", receipt.delivery),
            },
            Self::Commit(Scheduled::Queued) => write!(f, "Location queued"),
            Self::Rejected(reason) => write!(f, "{}", reason),
            Self::LocationUnavailable => write!(f, "{}", LOCATION_UNAVAILABLE_MESSAGE),
            Self::Link(Ok(Scheduled::Applied(state))) if state.session_open => {
                write!(f, "Connected")
            }
            Self::Link(Ok(Scheduled::Applied(_))) => write!(f, "Not connected"),
            Self::Link(Ok(Scheduled::Queued)) => write!(f, "Link change queued"),
            Self::Link(Err(e)) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            ActionOutcome::Rejected(InvalidReason::OutOfRangeLatitude).to_string(),
            "Latitude must be between -90 and 90 degrees"
        );
        assert_eq!(
            ActionOutcome::Link(Err(LinkError::NoAccessory)).to_string(),
            "No GPS simulator accessory connected"
        );
        assert_eq!(
            ActionOutcome::Link(Ok(Scheduled::Applied(AccessoryLinkState {
                attached_count: 1,
                session_open: true,
            })))
            .to_string(),
            "Connected"
        );
        assert_eq!(
            ActionOutcome::LocationUnavailable.to_string(),
            LOCATION_UNAVAILABLE_MESSAGE
        );
    }

    #[test]
    fn test_is_success() {
        assert!(ActionOutcome::Commit(Scheduled::Queued).is_success());
        assert!(!ActionOutcome::LocationUnavailable.is_success());
        assert!(!ActionOutcome::Link(Err(LinkError::NoAccessory)).is_success());
        assert!(!ActionOutcome::Rejected(InvalidReason::OutOfRangeLongitude).is_success());
    }
}
