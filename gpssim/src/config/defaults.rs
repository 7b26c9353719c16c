//! Default values for all configuration settings.
//!
//! Contains the `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::settings::*;
use crate::location::DEFAULT_BROADCAST_CAPACITY;
use crate::logging::DEFAULT_LOG_FILE;

/// Default map centre latitude (Beijing).
pub const DEFAULT_MAP_LATITUDE: f64 = 39.9042;

/// Default map centre longitude (Beijing).
pub const DEFAULT_MAP_LONGITUDE: f64 = 116.4074;

/// Default span at the map's default centre, in degrees.
pub const DEFAULT_OVERVIEW_SPAN: f64 = 0.1;

/// Default span when focused on a simulated location, in degrees.
pub const DEFAULT_FOCUS_SPAN: f64 = 0.01;

/// Default seconds between periodic location log records.
pub const DEFAULT_LOCATION_LOG_INTERVAL_SECS: u64 = 20;

/// Default log directory (~/.gpssim/logs).
pub fn default_log_directory() -> PathBuf {
    super::file::config_directory().join("logs")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            map: MapSettings::default(),
            engine: EngineSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            default_latitude: DEFAULT_MAP_LATITUDE,
            default_longitude: DEFAULT_MAP_LONGITUDE,
            overview_span: DEFAULT_OVERVIEW_SPAN,
            focus_span: DEFAULT_FOCUS_SPAN,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file: DEFAULT_LOG_FILE.to_string(),
            location_log_interval: DEFAULT_LOCATION_LOG_INTERVAL_SECS,
        }
    }
}
