//! Set command - commit one coordinate and print the outbound command.

use std::sync::Arc;

use clap::Args;
use gpssim::location::{
    AccessoryDescriptor, CommandSink, CommitOutcome, OutboundCommand, ReconciliationEngine,
    Scheduled, StaticAccessoryProvider,
};

use crate::error::CliError;

/// Arguments for `gpssim set`.
#[derive(Debug, Args)]
pub struct SetArgs {
    /// Latitude in decimal degrees
    #[arg(allow_hyphen_values = true)]
    pub latitude: String,

    /// Longitude in decimal degrees
    #[arg(allow_hyphen_values = true)]
    pub longitude: String,

    /// Altitude in meters (defaults to 50)
    #[arg(allow_hyphen_values = true)]
    pub altitude: Option<String>,

    /// Treat an accessory with this name as attached (repeatable)
    #[arg(long = "accessory", value_name = "NAME")]
    pub accessories: Vec<String>,

    /// Open a session with the attached accessories before committing
    #[arg(long)]
    pub connect: bool,
}

/// Sink that writes each command to stdout.
struct StdoutCommandSink;

impl CommandSink for StdoutCommandSink {
    fn send(&self, command: &OutboundCommand) {
        println!("Sent:");
        for line in command.text().lines() {
            println!("  {}", line);
        }
    }
}

/// Run the set command.
pub fn run(args: SetArgs) -> Result<(), CliError> {
    let receipt = match commit(&args, Arc::new(StdoutCommandSink))? {
        Scheduled::Applied(receipt) => receipt,
        Scheduled::Queued => {
            println!("Commit queued");
            return Ok(());
        }
    };

    println!(
        "Location set to {:.6}, {:.6} (altitude {} m)",
        receipt.command.latitude, receipt.command.longitude, receipt.command.altitude
    );
    println!("Source: {}", receipt.state.source_kind);
    println!("Delivery: {}", receipt.delivery);
    if !receipt.delivery.is_delivered() {
        println!("Command (not sent):");
        for line in receipt.command.text().lines() {
            println!("  {}", line);
        }
    }

    Ok(())
}

fn commit(args: &SetArgs, sink: Arc<dyn CommandSink>) -> Result<CommitOutcome, CliError> {
    let engine = ReconciliationEngine::with_sink(sink);

    if !args.accessories.is_empty() {
        let provider = StaticAccessoryProvider::with_accessories(
            args.accessories
                .iter()
                .map(|name| AccessoryDescriptor::new(name.as_str(), ""))
                .collect(),
        );
        engine.refresh_from(&provider);
    }

    if args.connect {
        engine.open_session().map_err(CliError::Link)?;
    }

    Ok(engine.commit_typed(&args.latitude, &args.longitude, args.altitude.as_deref())?)
}
