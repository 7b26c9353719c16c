//! gpssim CLI - operator harness for the location engine
//!
//! Stands in for the control-panel screens when running headless: validate
//! or commit a coordinate, replay a scripted event stream, and manage the
//! configuration file.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use gpssim::config::ConfigFile;
use gpssim::logging::{init_logging, LoggingGuard};

use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use commands::set::SetArgs;
use commands::validate::ValidateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "gpssim")]
#[command(version = gpssim::VERSION)]
#[command(about = "Control panel for an external GPS-simulation accessory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a typed coordinate
    Validate(ValidateArgs),

    /// Commit a coordinate and print the outbound command
    Set(SetArgs),

    /// Replay a scripted event stream through the engine
    Replay(ReplayArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli.command) {
        err.exit();
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Set(args) => {
            let config = ConfigFile::load()?;
            let _guard = start_logging(&config)?;
            commands::set::run(args)
        }
        Commands::Replay(args) => {
            let config = ConfigFile::load()?;
            let _guard = start_logging(&config)?;
            commands::replay::run(args, &config)
        }
        Commands::Config(command) => commands::config::run(command),
    }
}

fn start_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    let guard = init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    tracing::info!(version = gpssim::VERSION, "gpssim starting");
    Ok(guard)
}
