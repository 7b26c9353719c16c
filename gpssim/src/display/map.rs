//! Map presentation model.
//!
//! Holds the visible region and the single "simulated location" marker.
//! The map only follows simulated locations; the device's own position dot
//! is drawn by the map widget and is not modelled here.

use parking_lot::Mutex;

use crate::config::MapSettings;
use crate::location::{LocationEvent, LocationObserver, LocationState, ObserverError};

/// Title of the simulated-location marker.
pub const MARKER_TITLE: &str = "Simulated location";

/// Visible map region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapRegion {
    pub center_latitude: f64,
    pub center_longitude: f64,
    /// Degrees of latitude and longitude visible.
    pub span: f64,
}

/// A pin on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub subtitle: String,
}

impl MapMarker {
    fn simulated(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            title: MARKER_TITLE.to_string(),
            subtitle: format!("{:.6}, {:.6}", latitude, longitude),
        }
    }
}

/// What the map shows.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub region: MapRegion,
    pub marker: Option<MapMarker>,
}

/// Map observer.
pub struct MapDisplay {
    focus_span: f64,
    view: Mutex<MapView>,
}

impl MapDisplay {
    /// Create a map centred on the configured default location.
    pub fn new(settings: &MapSettings) -> Self {
        Self {
            focus_span: settings.focus_span,
            view: Mutex::new(MapView {
                region: MapRegion {
                    center_latitude: settings.default_latitude,
                    center_longitude: settings.default_longitude,
                    span: settings.overview_span,
                },
                marker: None,
            }),
        }
    }

    /// Current view.
    pub fn view(&self) -> MapView {
        self.view.lock().clone()
    }

    /// One-line description of the view.
    pub fn render(&self) -> String {
        let view = self.view.lock();
        let region = format!(
            "Map centred on {:.6}, {:.6} (span {})",
            view.region.center_latitude, view.region.center_longitude, view.region.span
        );
        match &view.marker {
            Some(marker) => format!("{}; marker \"{}\" at {}", region, marker.title, marker.subtitle),
            None => format!("{}; no marker", region),
        }
    }

    fn show(&self, state: &LocationState) {
        if !state.is_simulated() {
            return;
        }
        let Some((latitude, longitude)) = state.position() else {
            return;
        };

        let mut view = self.view.lock();
        let unchanged = view
            .marker
            .as_ref()
            .is_some_and(|m| m.latitude == latitude && m.longitude == longitude);
        if unchanged {
            return;
        }

        view.region = MapRegion {
            center_latitude: latitude,
            center_longitude: longitude,
            span: self.focus_span,
        };
        view.marker = Some(MapMarker::simulated(latitude, longitude));
    }
}

impl LocationObserver for MapDisplay {
    fn name(&self) -> &str {
        "map"
    }

    fn deliver(&self, event: &LocationEvent) -> Result<(), ObserverError> {
        if let LocationEvent::StateChanged(state) = event {
            self.show(state);
        }
        Ok(())
    }
}
