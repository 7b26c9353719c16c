//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path`, and `config show`.

use std::path::Path;

use clap::Subcommand;
use gpssim::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    let path = config_file_path();
    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(&path),
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    let written = if force {
        ConfigFile::default().save_to(path)?;
        true
    } else {
        ConfigFile::ensure_exists_at(path)?
    };

    if written {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!("Configuration already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
    }
    Ok(())
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "defaults (no config file)".to_string()
    };

    println!("# {}", source);
    for (key, value) in settings_list(&config) {
        println!("{} = {}", key, value);
    }
    Ok(())
}

/// Flattened `section.key` / value pairs in file order.
fn settings_list(config: &ConfigFile) -> Vec<(&'static str, String)> {
    vec![
        ("map.default_latitude", config.map.default_latitude.to_string()),
        ("map.default_longitude", config.map.default_longitude.to_string()),
        ("map.overview_span", config.map.overview_span.to_string()),
        ("map.focus_span", config.map.focus_span.to_string()),
        (
            "engine.broadcast_capacity",
            config.engine.broadcast_capacity.to_string(),
        ),
        (
            "logging.directory",
            config.logging.directory.display().to_string(),
        ),
        ("logging.file", config.logging.file.clone()),
        (
            "logging.location_log_interval",
            config.logging.location_log_interval.to_string(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_respects_force() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        run_init(&path, false).unwrap();
        assert!(path.exists());

        std::fs::write(&path, "[map]\nfocus_span = 0.5\n").unwrap();
        run_init(&path, false).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap().map.focus_span, 0.5);

        run_init(&path, true).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_show_reports_invalid_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[map]\ndefault_latitude = 95\n").unwrap();

        assert!(matches!(run_show(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_settings_list_covers_every_key() {
        let list = settings_list(&ConfigFile::default());
        assert_eq!(list.len(), 8);
        assert!(list.contains(&("logging.file", "gpssim.log".to_string())));
    }
}
