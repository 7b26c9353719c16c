//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct
//! fields. Unknown sections and keys are ignored.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::location::validator::{LATITUDE_RANGE, LONGITUDE_RANGE};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [map] section
    if let Some(section) = ini.section(Some("map")) {
        if let Some(v) = section.get("default_latitude") {
            let lat = parse_f64("map", "default_latitude", v)?;
            if !LATITUDE_RANGE.contains(&lat) {
                return Err(invalid(
                    "map",
                    "default_latitude",
                    v,
                    "must be between -90 and 90",
                ));
            }
            config.map.default_latitude = lat;
        }
        if let Some(v) = section.get("default_longitude") {
            let lon = parse_f64("map", "default_longitude", v)?;
            if !LONGITUDE_RANGE.contains(&lon) {
                return Err(invalid(
                    "map",
                    "default_longitude",
                    v,
                    "must be between -180 and 180",
                ));
            }
            config.map.default_longitude = lon;
        }
        if let Some(v) = section.get("overview_span") {
            config.map.overview_span = parse_span("overview_span", v)?;
        }
        if let Some(v) = section.get("focus_span") {
            config.map.focus_span = parse_span("focus_span", v)?;
        }
    }

    // [engine] section
    if let Some(section) = ini.section(Some("engine")) {
        if let Some(v) = section.get("broadcast_capacity") {
            config.engine.broadcast_capacity = v
                .trim()
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .ok_or_else(|| {
                    invalid("engine", "broadcast_capacity", v, "must be a positive integer")
                })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
        if let Some(v) = section.get("location_log_interval") {
            config.logging.location_log_interval = v
                .trim()
                .parse()
                .ok()
                .filter(|n: &u64| *n > 0)
                .ok_or_else(|| {
                    invalid(
                        "logging",
                        "location_log_interval",
                        v,
                        "must be a positive integer (seconds)",
                    )
                })?;
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_f64(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(section, key, value, "must be a number"))
}

fn parse_span(key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let span = parse_f64("map", key, value)?;
    if span <= 0.0 || span > 180.0 {
        return Err(invalid("map", key, value, "must be greater than 0 and at most 180"));
    }
    Ok(span)
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
