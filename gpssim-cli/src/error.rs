//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and a non-zero exit code.

use std::fmt;
use std::process;

use gpssim::config::ConfigFileError;
use gpssim::location::{InvalidReason, LinkError};

use crate::commands::replay::ScriptError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigFileError),
    /// Coordinate rejected by validation
    InvalidInput(InvalidReason),
    /// Accessory link refused an operation
    Link(LinkError),
    /// Failed to read a file
    FileRead { path: String, error: std::io::Error },
    /// Replay script could not be parsed
    Script(ScriptError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::InvalidInput(_) => {
                eprintln!();
                eprintln!("Latitude must be within -90..90 and longitude within -180..180,");
                eprintln!("both in decimal degrees (e.g. 39.9042 116.4074).");
            }
            CliError::Config(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Fix the value or regenerate the file with: gpssim config init --force");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidInput(reason) => write!(f, "Invalid coordinate: {}", reason),
            CliError::Link(e) => write!(f, "{}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path, error)
            }
            CliError::Script(e) => write!(f, "Invalid replay script: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::InvalidInput(e) => Some(e),
            CliError::Link(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Script(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::LoggingInit(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<InvalidReason> for CliError {
    fn from(e: InvalidReason) -> Self {
        CliError::InvalidInput(e)
    }
}

impl From<ScriptError> for CliError {
    fn from(e: ScriptError) -> Self {
        CliError::Script(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            CliError::InvalidInput(InvalidReason::OutOfRangeLatitude).to_string(),
            "Invalid coordinate: Latitude must be between -90 and 90 degrees"
        );
        assert_eq!(
            CliError::Link(LinkError::NoAccessory).to_string(),
            "No GPS simulator accessory connected"
        );
    }
}
