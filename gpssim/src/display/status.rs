//! Connection status indicator.

use parking_lot::Mutex;

use crate::location::{LocationEvent, LocationObserver, ObserverError};

/// Label while a session is open.
pub const CONNECTED_LABEL: &str = "Connected";

/// Label otherwise.
pub const NOT_CONNECTED_LABEL: &str = "Not connected";

/// Status indicator observer. Flips on link events only.
#[derive(Debug, Default)]
pub struct StatusIndicator {
    connected: Mutex<bool>,
}

impl StatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    pub fn label(&self) -> &'static str {
        if self.is_connected() {
            CONNECTED_LABEL
        } else {
            NOT_CONNECTED_LABEL
        }
    }
}

impl LocationObserver for StatusIndicator {
    fn name(&self) -> &str {
        "status"
    }

    fn deliver(&self, event: &LocationEvent) -> Result<(), ObserverError> {
        match event {
            LocationEvent::LinkChanged(snapshot) => {
                *self.connected.lock() = snapshot.state.session_open;
            }
            LocationEvent::LinkLost => *self.connected.lock() = false,
            _ => {}
        }
        Ok(())
    }
}
