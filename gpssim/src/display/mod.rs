//! Presentation models driven by the engine's fan-out.
//!
//! Each model is a [`LocationObserver`](crate::location::LocationObserver)
//! that keeps what a screen would show:
//!
//! - [`MapDisplay`] - region and simulated-location marker
//! - [`DiagnosticsPanel`] - device fix, authorization, accessories
//! - [`StatusIndicator`] - "Connected" / "Not connected"

mod diagnostics;
mod map;
mod status;

pub use diagnostics::{DiagnosticsPanel, DiagnosticsSection, NO_ACCESSORY_TEXT};
pub use map::{MapDisplay, MapMarker, MapRegion, MapView, MARKER_TITLE};
pub use status::{StatusIndicator, CONNECTED_LABEL, NOT_CONNECTED_LABEL};
