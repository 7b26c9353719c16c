//! Configuration for gpssim.
//!
//! User settings live in an INI file at `~/.gpssim/config.ini`. A missing
//! file means defaults; a present file overlays only the keys it contains.
//!
//! # Example
//!
//! ```no_run
//! use gpssim::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! println!("Map centre: {}, {}", config.map.default_latitude, config.map.default_longitude);
//! # Ok::<(), gpssim::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, EngineSettings, LoggingSettings, MapSettings};
