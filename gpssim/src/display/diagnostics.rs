//! Diagnostics panel presentation model.
//!
//! Re-renders on every event regardless of live/simulated state. Sections:
//! location (services, authorization, device fix), simulation (active
//! location and source), and external accessories.

use parking_lot::Mutex;

use crate::location::{
    AccessoryDescriptor, AuthorizationStatus, LocationEvent, LocationObserver, LocationSample,
    LocationState, ObserverError, SourceError, SourceKind,
};

/// Shown when no accessory is attached.
pub const NO_ACCESSORY_TEXT: &str = "No external accessory connected";

/// One titled group of label/value rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsSection {
    pub title: String,
    pub items: Vec<(String, String)>,
}

impl DiagnosticsSection {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, value: impl Into<String>) {
        self.items.push((label.to_string(), value.into()));
    }

    /// Value of the first row with `label`.
    pub fn value(&self, label: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct PanelState {
    services_enabled: bool,
    authorization: AuthorizationStatus,
    device: Option<LocationSample>,
    state: LocationState,
    last_error: Option<SourceError>,
    accessories: Vec<AccessoryDescriptor>,
    renders: u64,
}

/// Diagnostics observer.
pub struct DiagnosticsPanel {
    inner: Mutex<PanelState>,
}

impl Default for DiagnosticsPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsPanel {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PanelState {
                services_enabled: true,
                ..PanelState::default()
            }),
        }
    }

    /// Number of times the panel re-rendered.
    pub fn render_count(&self) -> u64 {
        self.inner.lock().renders
    }

    /// Current sections.
    pub fn sections(&self) -> Vec<DiagnosticsSection> {
        let inner = self.inner.lock();
        vec![
            location_section(&inner),
            simulation_section(&inner),
            accessory_section(&inner.accessories),
        ]
    }

    /// Plain-text rendering, one row per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in self.sections() {
            out.push_str(&format!("[{}]\n", section.title));
            for (label, value) in &section.items {
                out.push_str(&format!("  {}: {}\n", label, value));
            }
        }
        out
    }
}

fn location_section(panel: &PanelState) -> DiagnosticsSection {
    let mut section = DiagnosticsSection::new("Location");
    section.push(
        "Location services",
        if panel.services_enabled { "Enabled" } else { "Disabled" },
    );
    section.push("Authorization", panel.authorization.to_string());

    if let Some(sample) = &panel.device {
        section.push("Latitude", format!("{:.6}", sample.latitude));
        section.push("Longitude", format!("{:.6}", sample.longitude));
        section.push("Altitude", format!("{:.1} m", sample.altitude));
        section.push("Horizontal accuracy", format!("{:.1} m", sample.horizontal_accuracy));
        section.push("Vertical accuracy", format!("{:.1} m", sample.vertical_accuracy));
    }
    if let Some(error) = &panel.last_error {
        section.push("Last error", error.to_string());
    }
    section
}

fn simulation_section(panel: &PanelState) -> DiagnosticsSection {
    let mut section = DiagnosticsSection::new("Simulation");
    match panel.state.active {
        Some(active) => {
            section.push(
                "Active location",
                format!("{:.6}, {:.6}", active.latitude(), active.longitude()),
            );
            section.push("Altitude", format!("{:.1} m", active.altitude()));
        }
        None => section.push("Active location", "Unknown"),
    }
    section.push("Source", panel.state.source_kind.to_string());
    if panel.state.source_kind == SourceKind::Simulated {
        if let Some(at) = panel.state.last_commit {
            section.push("Committed at", at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        }
    }
    section
}

fn accessory_section(accessories: &[AccessoryDescriptor]) -> DiagnosticsSection {
    let mut section = DiagnosticsSection::new("External accessories");
    if accessories.is_empty() {
        section.push("Status", NO_ACCESSORY_TEXT);
        return section;
    }

    section.push("Connected accessories", accessories.len().to_string());
    for accessory in accessories {
        section.push(&accessory.name, accessory.manufacturer.clone());
        if !accessory.protocols.is_empty() {
            section.push("Protocols", accessory.protocols.join(", "));
        }
        if !accessory.serial_number.is_empty() {
            section.push("Serial number", accessory.serial_number.clone());
        }
    }
    section
}

impl LocationObserver for DiagnosticsPanel {
    fn name(&self) -> &str {
        "diagnostics"
    }

    fn deliver(&self, event: &LocationEvent) -> Result<(), ObserverError> {
        let mut inner = self.inner.lock();
        match event {
            LocationEvent::StateChanged(state) => {
                // A new fix supersedes a transient source error
                if state.last_device_sample != inner.device {
                    inner.last_error = None;
                }
                inner.device = state.last_device_sample;
                inner.state = state.clone();
            }
            LocationEvent::LinkChanged(snapshot) => {
                inner.accessories = snapshot.accessories.clone();
            }
            LocationEvent::LinkLost => inner.accessories.clear(),
            LocationEvent::SourceFailed(error) => {
                if *error == SourceError::ServicesDisabled {
                    inner.services_enabled = false;
                }
                inner.last_error = Some(error.clone());
            }
            LocationEvent::AuthorizationChanged(status) => inner.authorization = *status,
            LocationEvent::ServicesChanged(enabled) => inner.services_enabled = *enabled,
        }
        inner.renders += 1;
        Ok(())
    }
}
