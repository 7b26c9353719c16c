//! gpssim - control panel core for an external GPS-simulation accessory
//!
//! The library keeps one authoritative location for display and
//! transmission, reconciling live device fixes with operator overrides
//! (map picks and typed coordinates), and fans every change out to the
//! map, diagnostics panel, status indicator, and outbound command stream.
//!
//! ```ignore
//! use gpssim::location::{ReconciliationEngine, SharedLocationEngine};
//! use gpssim::display::MapDisplay;
//!
//! let config = gpssim::config::ConfigFile::load()?;
//! let shared = SharedLocationEngine::new(
//!     ReconciliationEngine::new(),
//!     config.engine.broadcast_capacity,
//! );
//! shared.engine().register(Arc::new(MapDisplay::new(&config.map)));
//! ```

pub mod config;
pub mod display;
pub mod location;
pub mod logging;

/// Version of the gpssim library and CLI.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
