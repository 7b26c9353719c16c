//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Map display settings
    pub map: MapSettings,
    /// Engine settings
    pub engine: EngineSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Map display configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    /// Map centre latitude before any location is known
    pub default_latitude: f64,
    /// Map centre longitude before any location is known
    pub default_longitude: f64,
    /// Span in degrees at the default centre
    pub overview_span: f64,
    /// Span in degrees when focused on a simulated location
    pub focus_span: f64,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Capacity of the async broadcast channel
    pub broadcast_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log directory
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
    /// Seconds between periodic location log records
    pub location_log_interval: u64,
}
