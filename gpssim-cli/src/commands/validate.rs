//! Validate command - check a typed coordinate without touching any state.

use clap::Args;
use gpssim::location::validate;

use crate::error::CliError;

/// Arguments for `gpssim validate`.
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Latitude in decimal degrees
    #[arg(allow_hyphen_values = true)]
    pub latitude: String,

    /// Longitude in decimal degrees
    #[arg(allow_hyphen_values = true)]
    pub longitude: String,

    /// Altitude in meters (defaults to 50)
    #[arg(allow_hyphen_values = true)]
    pub altitude: Option<String>,
}

/// Run the validate command.
pub fn run(args: ValidateArgs) -> Result<(), CliError> {
    let candidate = validate(&args.latitude, &args.longitude, args.altitude.as_deref())?;

    println!("Valid coordinate:");
    println!("  Latitude:  {:.6}", candidate.latitude);
    println!("  Longitude: {:.6}", candidate.longitude);
    println!("  Altitude:  {} m", candidate.altitude);

    Ok(())
}
