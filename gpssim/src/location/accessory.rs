//! Accessory link state.
//!
//! Tracks how many GPS-simulation accessories are attached and whether the
//! operator has opened a session with them. The physical transport is an
//! external collaborator reached through [`AccessoryProvider`].
//!
//! # Invariant
//!
//! `session_open` is only ever true while `attached_count > 0`. When the
//! count drops to zero the session is forced closed and the refresh reports
//! the link as lost. Reconnection is always an explicit operator action.

use parking_lot::RwLock;

/// Description of an attached accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryDescriptor {
    /// Product name.
    pub name: String,

    /// Manufacturer name.
    pub manufacturer: String,

    /// Protocol identifiers the accessory speaks.
    pub protocols: Vec<String>,

    /// Serial number.
    pub serial_number: String,
}

impl AccessoryDescriptor {
    /// Create a descriptor with no protocols and an empty serial number.
    pub fn new(name: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manufacturer: manufacturer.into(),
            protocols: Vec::new(),
            serial_number: String::new(),
        }
    }

    /// Add a protocol identifier.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Set the serial number.
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = serial_number.into();
        self
    }
}

/// Capability to enumerate attached accessories.
pub trait AccessoryProvider: Send + Sync {
    /// List the accessories attached right now.
    fn list_attached(&self) -> Vec<AccessoryDescriptor>;
}

/// In-memory accessory provider.
///
/// Used by the CLI replay harness and by tests; attach and detach are
/// driven explicitly.
#[derive(Debug, Default)]
pub struct StaticAccessoryProvider {
    accessories: RwLock<Vec<AccessoryDescriptor>>,
}

impl StaticAccessoryProvider {
    /// Create a provider with nothing attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with the given accessories attached.
    pub fn with_accessories(accessories: Vec<AccessoryDescriptor>) -> Self {
        Self {
            accessories: RwLock::new(accessories),
        }
    }

    /// Attach an accessory.
    pub fn attach(&self, accessory: AccessoryDescriptor) {
        self.accessories.write().push(accessory);
    }

    /// Detach every accessory with the given name. Returns how many were removed.
    pub fn detach(&self, name: &str) -> usize {
        let mut accessories = self.accessories.write();
        let before = accessories.len();
        accessories.retain(|a| a.name != name);
        before - accessories.len()
    }

    /// Detach everything.
    pub fn detach_all(&self) {
        self.accessories.write().clear();
    }
}

impl AccessoryProvider for StaticAccessoryProvider {
    fn list_attached(&self) -> Vec<AccessoryDescriptor> {
        self.accessories.read().clone()
    }
}

/// Snapshot of the accessory link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessoryLinkState {
    /// Number of accessories attached at the last refresh.
    pub attached_count: usize,

    /// Whether the operator opened a session.
    pub session_open: bool,
}

impl AccessoryLinkState {
    /// Returns true if at least one accessory is attached.
    pub fn has_accessory(&self) -> bool {
        self.attached_count > 0
    }
}

/// Accessory link errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// No accessory is attached.
    #[error("No GPS simulator accessory connected")]
    NoAccessory,
}

/// Result of a link refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRefresh {
    /// Link state after the refresh.
    pub state: AccessoryLinkState,

    /// The attached count went from non-zero to zero.
    pub lost: bool,

    /// The refresh changed the link state.
    pub changed: bool,
}

/// Owner of the accessory link state.
#[derive(Debug, Default)]
pub struct AccessoryLink {
    state: AccessoryLinkState,
    attached: Vec<AccessoryDescriptor>,
}

impl AccessoryLink {
    /// Create a link with nothing attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current link state.
    pub fn state(&self) -> AccessoryLinkState {
        self.state
    }

    /// Accessories seen at the last refresh.
    pub fn attached(&self) -> &[AccessoryDescriptor] {
        &self.attached
    }

    /// Recompute the link from the currently attached accessories.
    pub fn refresh(&mut self, attached: Vec<AccessoryDescriptor>) -> LinkRefresh {
        let previous = self.state;
        let attached_count = attached.len();
        let lost = previous.attached_count > 0 && attached_count == 0;

        self.attached = attached;
        self.state = AccessoryLinkState {
            attached_count,
            session_open: previous.session_open && attached_count > 0,
        };

        if lost {
            tracing::warn!(
                previous = previous.attached_count,
                session_was_open = previous.session_open,
                "Accessory link lost"
            );
        } else if previous.attached_count != attached_count {
            tracing::info!(
                previous = previous.attached_count,
                attached = attached_count,
                "Accessory count changed"
            );
        }

        LinkRefresh {
            state: self.state,
            lost,
            changed: self.state != previous,
        }
    }

    /// Open a session with the attached accessories.
    ///
    /// Fails without changing anything if nothing is attached.
    pub fn open_session(&mut self) -> Result<AccessoryLinkState, LinkError> {
        if self.state.attached_count == 0 {
            return Err(LinkError::NoAccessory);
        }
        self.state.session_open = true;
        Ok(self.state)
    }

    /// Close the session. Always succeeds.
    pub fn close_session(&mut self) -> AccessoryLinkState {
        self.state.session_open = false;
        self.state
    }
}
