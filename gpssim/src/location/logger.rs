//! Periodic location logging.
//!
//! A background task that records the current location state at a fixed
//! interval, for reviewing a simulation session after the fact.
//!
//! # Output Format
//!
//! Logs are emitted at DEBUG level with structured fields:
//! - `lat`, `lon` - Active position in decimal degrees
//! - `alt_m` - Active altitude in meters
//! - `source` - `Live` or `Simulated`
//! - `device_lat`, `device_lon` - Newest device fix, if any
//! - `session` - Whether an accessory session is open

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::accessory::AccessoryLinkState;
use super::provider::LocationProvider;
use super::state::LocationState;

/// Default logging interval (20 seconds).
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(20);

/// Spawns a background task that periodically logs the location state.
///
/// Stops when `cancellation` fires. Callers may skip spawning when DEBUG is
/// disabled:
///
/// ```ignore
/// if tracing::enabled!(tracing::Level::DEBUG) {
///     spawn_location_logger(shared, cancel, DEFAULT_LOG_INTERVAL);
/// }
/// ```
pub fn spawn_location_logger<P>(
    provider: P,
    cancellation: CancellationToken,
    interval: Duration,
) -> JoinHandle<()>
where
    P: LocationProvider + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    log_state(&provider.state(), provider.link_state());
                }
                _ = cancellation.cancelled() => {
                    tracing::debug!("Location logger stopped");
                    break;
                }
            }
        }
    })
}

fn log_state(state: &LocationState, link: AccessoryLinkState) {
    let device = state
        .last_device_sample
        .map(|s| (format!("{:.6}", s.latitude), format!("{:.6}", s.longitude)));

    match state.active {
        Some(active) => {
            tracing::debug!(
                lat = format!("{:.6}", active.latitude()),
                lon = format!("{:.6}", active.longitude()),
                alt_m = format!("{:.1}", active.altitude()),
                source = %state.source_kind,
                device_lat = device.as_ref().map(|d| d.0.as_str()),
                device_lon = device.as_ref().map(|d| d.1.as_str()),
                session = link.session_open,
                revision = state.revision,
                "Location state"
            );
        }
        None => {
            tracing::debug!(
                session = link.session_open,
                "Location state (no location known)"
            );
        }
    }
}
