//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[map]
; Map centre before any location is known (decimal degrees)
default_latitude = {}
default_longitude = {}
; Degrees of latitude/longitude visible at the default centre
overview_span = {}
; Degrees visible when the map focuses on a simulated location
focus_span = {}

[engine]
; Events buffered for async subscribers before slow ones start lagging
broadcast_capacity = {}

[logging]
; Log directory and file (the file is truncated at each start)
directory = {}
file = {}
; Seconds between periodic location records (DEBUG level)
location_log_interval = {}
"#,
        config.map.default_latitude,
        config.map.default_longitude,
        config.map.overview_span,
        config.map.focus_span,
        config.engine.broadcast_capacity,
        path_to_string(&config.logging.directory),
        config.logging.file,
        config.logging.location_log_interval,
    )
}

/// Render a path, abbreviating the home directory as `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_contains_every_key() {
        let text = to_config_string(&ConfigFile::default());

        for key in [
            "default_latitude = 39.9042",
            "default_longitude = 116.4074",
            "overview_span = 0.1",
            "focus_span = 0.01",
            "broadcast_capacity = 16",
            "file = gpssim.log",
            "location_log_interval = 20",
        ] {
            assert!(text.contains(key), "missing '{}'", key);
        }
    }

    #[test]
    fn test_home_directory_abbreviated() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("logs")), "~/logs");
        }
        assert_eq!(path_to_string(&PathBuf::from("/tmp/logs")), "/tmp/logs");
    }
}
