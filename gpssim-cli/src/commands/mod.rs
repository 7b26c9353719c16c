//! CLI command implementations.
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`replay`] - Run a scripted event stream through the engine
//! - [`set`] - Commit one coordinate and print the outbound command
//! - [`validate`] - Check a typed coordinate

pub mod config;
pub mod replay;
pub mod set;
pub mod validate;
