//! Outbound command formatting and delivery.
//!
//! A committed simulated location is serialized into the two-line text
//! directive understood by the accessory:
//!
//! ```text
//! SETLOC <lat>,<lon>
//! SETALT <alt>
//! ```
//!
//! Numbers are written in fixed-point notation with the shortest
//! representation that round-trips, and always carry a decimal point
//! (`50` is written `50.0`).
//!
//! Delivery is fire-and-forget: there is no acknowledgement or retry.

use parking_lot::Mutex;

use super::accessory::AccessoryLinkState;
use super::state::{CandidateCoordinate, LocationState, DEFAULT_ALTITUDE};

/// A location-update directive for the accessory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutboundCommand {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl OutboundCommand {
    /// Build the command for a committed coordinate.
    pub fn from_candidate(candidate: &CandidateCoordinate) -> Self {
        Self {
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            altitude: candidate.altitude,
        }
    }

    /// Build the command for the active location of a state snapshot.
    ///
    /// Returns `None` if no location is known. A non-finite altitude falls
    /// back to [`DEFAULT_ALTITUDE`].
    pub fn from_state(state: &LocationState) -> Option<Self> {
        state.active.map(|active| Self {
            latitude: active.latitude(),
            longitude: active.longitude(),
            altitude: if active.altitude().is_finite() {
                active.altitude()
            } else {
                DEFAULT_ALTITUDE
            },
        })
    }

    /// The `SETLOC` line.
    pub fn location_line(&self) -> String {
        format!(
            "SETLOC {},{}",
            fixed_point(self.latitude),
            fixed_point(self.longitude)
        )
    }

    /// The `SETALT` line.
    pub fn altitude_line(&self) -> String {
        format!("SETALT {}", fixed_point(self.altitude))
    }

    /// Full two-line command text.
    pub fn text(&self) -> String {
        format!("{}\n{}", self.location_line(), self.altitude_line())
    }
}

impl std::fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}", self.location_line(), self.altitude_line())
    }
}

/// Format the command for a state snapshot.
pub fn format_command(state: &LocationState) -> Option<String> {
    OutboundCommand::from_state(state).map(|command| command.text())
}

fn fixed_point(value: f64) -> String {
    let text = value.to_string();
    if !value.is_finite() || text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Outcome of delivering a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Handed to the sink with this many accessories attached.
    Delivered { accessories: usize },
    /// No accessory attached; the state still updated for display.
    NoDevice,
}

impl DeliveryOutcome {
    /// Decide the outcome from the link state.
    pub fn for_link(link: AccessoryLinkState) -> Self {
        if link.attached_count == 0 {
            Self::NoDevice
        } else {
            Self::Delivered {
                accessories: link.attached_count,
            }
        }
    }

    /// Returns true if the command was handed to the sink.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivered { accessories } => write!(f, "Delivered to {} accessory(s)", accessories),
            Self::NoDevice => write!(f, "No device"),
        }
    }
}

/// Destination for outbound commands.
pub trait CommandSink: Send + Sync {
    /// Send a command to the attached accessories.
    fn send(&self, command: &OutboundCommand);
}

/// Sink that logs each command at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCommandSink;

impl CommandSink for LoggingCommandSink {
    fn send(&self, command: &OutboundCommand) {
        tracing::info!(command = %command.text(), "Sending location command");
    }
}

/// Sink that keeps every command text in memory.
#[derive(Debug, Default)]
pub struct RecordingCommandSink {
    sent: Mutex<Vec<String>>,
}

impl RecordingCommandSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl CommandSink for RecordingCommandSink {
    fn send(&self, command: &OutboundCommand) {
        self.sent.lock().push(command.text());
    }
}
