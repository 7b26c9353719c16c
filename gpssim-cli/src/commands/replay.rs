//! Replay command - drive the engine from a scripted event stream.
//!
//! A script has one event per line; blank lines and `#` comments are
//! ignored:
//!
//! ```text
//! # device fixes arrive
//! sample 39.9042 116.4074 45.0 1700000000
//! attach "GPS Sim" Acme
//! connect
//! pick 43.6 1.4
//! set 48.8584 2.2945 35
//! current
//! fail no satellites
//! auth when-in-use
//! detach
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use clap::Args;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use gpssim::config::ConfigFile;
use gpssim::display::{DiagnosticsPanel, MapDisplay, StatusIndicator};
use gpssim::location::{
    spawn_event_pump, spawn_location_logger, AccessoryDescriptor, AccessoryProvider,
    ActionOutcome, AuthorizationStatus, EngineStats, LocationBroadcaster, LocationSample,
    LocationState, OperatorAction, PumpSummary, ReconciliationEngine, Scheduled,
    SharedLocationEngine, SourceError, SourceEvent, StaticAccessoryProvider,
};

use crate::error::CliError;

/// Arguments for `gpssim replay`.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Script file to replay
    pub file: PathBuf,

    /// Only print the step log, not the final map/diagnostics render
    #[arg(long)]
    pub quiet: bool,
}

/// A malformed script line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

/// One scripted event.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Sample(LocationSample),
    Pick { latitude: f64, longitude: f64 },
    Set {
        latitude: String,
        longitude: String,
        altitude: Option<String>,
    },
    Current,
    Attach { name: String, manufacturer: String },
    Detach { name: Option<String> },
    Connect,
    Disconnect,
    Fail(String),
    Auth(AuthorizationStatus),
}

/// Parse a whole script.
pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    let mut steps = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = parse_line(line).map_err(|message| ScriptError {
            line: index + 1,
            message,
        })?;
        steps.push(step);
    }
    Ok(steps)
}

fn parse_line(line: &str) -> Result<ScriptStep, String> {
    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };
    let keyword = keyword.to_lowercase();

    // The failure message is free text, quotes included
    if keyword == "fail" {
        if rest.is_empty() {
            return Err("'fail' needs a message".to_string());
        }
        return Ok(ScriptStep::Fail(rest.to_string()));
    }

    let args = split_args(rest)?;
    match keyword.as_str() {
        "sample" => {
            expect_args(&keyword, &args, 4, 4)?;
            let timestamp = parse_timestamp(&args[3])?;
            Ok(ScriptStep::Sample(LocationSample::new(
                parse_number("latitude", &args[0])?,
                parse_number("longitude", &args[1])?,
                parse_number("altitude", &args[2])?,
                timestamp,
            )))
        }
        "pick" => {
            expect_args(&keyword, &args, 2, 2)?;
            Ok(ScriptStep::Pick {
                latitude: parse_number("latitude", &args[0])?,
                longitude: parse_number("longitude", &args[1])?,
            })
        }
        "set" => {
            expect_args(&keyword, &args, 2, 3)?;
            Ok(ScriptStep::Set {
                latitude: args[0].clone(),
                longitude: args[1].clone(),
                altitude: args.get(2).cloned(),
            })
        }
        "current" => {
            expect_args(&keyword, &args, 0, 0)?;
            Ok(ScriptStep::Current)
        }
        "attach" => {
            expect_args(&keyword, &args, 1, 2)?;
            Ok(ScriptStep::Attach {
                name: args[0].clone(),
                manufacturer: args.get(1).cloned().unwrap_or_default(),
            })
        }
        "detach" => {
            expect_args(&keyword, &args, 0, 1)?;
            Ok(ScriptStep::Detach {
                name: args.first().cloned(),
            })
        }
        "connect" => {
            expect_args(&keyword, &args, 0, 0)?;
            Ok(ScriptStep::Connect)
        }
        "disconnect" => {
            expect_args(&keyword, &args, 0, 0)?;
            Ok(ScriptStep::Disconnect)
        }
        "auth" => {
            expect_args(&keyword, &args, 1, 1)?;
            Ok(ScriptStep::Auth(args[0].parse()?))
        }
        other => Err(format!("unknown event '{}'", other)),
    }
}

/// Split on whitespace, keeping double-quoted runs together.
fn split_args(text: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if quoted {
        return Err("unterminated quote".to_string());
    }
    if has_token {
        args.push(current);
    }
    Ok(args)
}

fn expect_args(keyword: &str, args: &[String], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(format!(
            "'{}' takes {} argument(s), got {}",
            keyword,
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn parse_number(field: &str, text: &str) -> Result<f64, String> {
    text.parse()
        .map_err(|_| format!("{} '{}' is not a number", field, text))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, String> {
    let secs: i64 = text
        .parse()
        .map_err(|_| format!("timestamp '{}' is not whole unix seconds", text))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| format!("timestamp '{}' is out of range", text))
}

/// Outcome of a replay.
#[derive(Debug)]
pub struct ReplayReport {
    /// One line per step, plus any command text sent.
    pub lines: Vec<String>,
    pub state: LocationState,
    pub stats: EngineStats,
    pub map: String,
    pub status: String,
    pub diagnostics: String,
    /// Source events the pump applied.
    pub pump: PumpSummary,
    /// Events received by the async subscriber.
    pub broadcast_received: u64,
    /// Events the async subscriber missed because the channel was full.
    pub broadcast_missed: u64,
}

/// Buffer between the script reader and the event pump.
const SOURCE_CHANNEL_CAPACITY: usize = 64;

/// Run `steps` through a fresh engine with the presentation observers attached.
///
/// Device and accessory events travel through the async event pump, as
/// they would from real collaborators; operator actions call the engine
/// directly. Each source event is flushed before the next step runs.
pub async fn execute(steps: &[ScriptStep], config: &ConfigFile) -> ReplayReport {
    let shared = SharedLocationEngine::new(
        ReconciliationEngine::new(),
        config.engine.broadcast_capacity,
    );
    let engine = shared.engine_arc();

    let map = Arc::new(MapDisplay::new(&config.map));
    let diagnostics = Arc::new(DiagnosticsPanel::new());
    let status = Arc::new(StatusIndicator::new());
    engine.register(map.clone());
    engine.register(diagnostics.clone());
    engine.register(status.clone());

    let mut subscriber = shared.subscribe();
    let mut broadcast_received = 0;
    let mut broadcast_missed = 0;

    let cancellation = CancellationToken::new();
    let (events, receiver) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
    let pump = spawn_event_pump(shared.clone(), receiver, cancellation.clone());
    let logger = spawn_location_logger(
        shared.clone(),
        cancellation.clone(),
        Duration::from_secs(config.logging.location_log_interval),
    );

    let provider = StaticAccessoryProvider::new();
    let mut lines = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        let result = match source_event(step, &provider) {
            Some(event) => feed(&events, &engine, step, event).await,
            None => {
                let target = engine.clone();
                let step = step.clone();
                tokio::task::spawn_blocking(move || apply_action(&target, &step))
                    .await
                    .unwrap_or_else(|e| StepResult::text(format!("action failed: {}", e)))
            }
        };

        lines.push(format!("[{:>3}] {:<40} {}", index + 1, describe(step), result.summary));
        if let Some(command) = result.command {
            for line in command.lines() {
                lines.push(format!("      -> {}", line));
            }
        }

        loop {
            match subscriber.try_recv() {
                Ok(_) => broadcast_received += 1,
                Err(TryRecvError::Lagged(missed)) => broadcast_missed += missed,
                Err(_) => break,
            }
        }
    }

    drop(events);
    let pump = pump.await.unwrap_or_default();
    cancellation.cancel();
    if let Err(e) = logger.await {
        tracing::warn!(error = %e, "Location logger task failed");
    }

    ReplayReport {
        lines,
        state: engine.state(),
        stats: engine.stats(),
        map: map.render(),
        status: status.label().to_string(),
        diagnostics: diagnostics.render(),
        pump,
        broadcast_received,
        broadcast_missed,
    }
}

struct StepResult {
    summary: String,
    command: Option<String>,
}

impl StepResult {
    fn text(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            command: None,
        }
    }
}

/// The collaborator event for a device or accessory step, or `None` for an
/// operator action. Attach and detach update `provider` first.
fn source_event(step: &ScriptStep, provider: &StaticAccessoryProvider) -> Option<SourceEvent> {
    match step {
        ScriptStep::Sample(sample) => Some(SourceEvent::Sample(*sample)),
        ScriptStep::Fail(message) => Some(SourceEvent::Failure(SourceError::Unavailable(
            message.clone(),
        ))),
        ScriptStep::Auth(status) => Some(SourceEvent::Authorization(*status)),
        ScriptStep::Attach { name, manufacturer } => {
            provider.attach(AccessoryDescriptor::new(name.clone(), manufacturer.clone()));
            Some(SourceEvent::AccessoriesChanged(provider.list_attached()))
        }
        ScriptStep::Detach { name } => {
            match name {
                Some(name) => {
                    provider.detach(name);
                }
                None => provider.detach_all(),
            }
            Some(SourceEvent::AccessoriesChanged(provider.list_attached()))
        }
        _ => None,
    }
}

/// Send a source event through the pump and wait until it has been applied.
async fn feed(
    events: &mpsc::Sender<SourceEvent>,
    engine: &ReconciliationEngine,
    step: &ScriptStep,
    event: SourceEvent,
) -> StepResult {
    let stats_before = engine.stats();
    let link_before = engine.link_state();

    let (ack, applied) = oneshot::channel();
    if events.send(event).await.is_err() || events.send(SourceEvent::Flush(ack)).await.is_err() {
        return StepResult::text("source channel closed");
    }
    if applied.await.is_err() {
        return StepResult::text("source event not applied");
    }

    match step {
        ScriptStep::Sample(_) => {
            if engine.stats().samples_accepted > stats_before.samples_accepted {
                StepResult::text("fix accepted")
            } else {
                StepResult::text("fix dropped (older than current)")
            }
        }
        ScriptStep::Attach { .. } | ScriptStep::Detach { .. } => {
            let link = engine.link_state();
            if link_before.attached_count > 0 && link.attached_count == 0 {
                StepResult::text("link lost, session closed")
            } else {
                StepResult::text(format!("{} accessory(s) attached", link.attached_count))
            }
        }
        ScriptStep::Fail(_) => StepResult::text("source error recorded"),
        ScriptStep::Auth(status) => StepResult::text(format!("authorization: {}", status)),
        _ => StepResult::text("applied"),
    }
}

fn apply_action(engine: &ReconciliationEngine, step: &ScriptStep) -> StepResult {
    let action = match step {
        ScriptStep::Pick {
            latitude,
            longitude,
        } => OperatorAction::MapLongPress {
            latitude: *latitude,
            longitude: *longitude,
        },
        ScriptStep::Set {
            latitude,
            longitude,
            altitude,
        } => OperatorAction::SetLocation {
            latitude: latitude.clone(),
            longitude: longitude.clone(),
            altitude: altitude.clone(),
        },
        ScriptStep::Current => OperatorAction::UseCurrentLocation,
        ScriptStep::Connect => OperatorAction::Connect,
        ScriptStep::Disconnect => OperatorAction::Disconnect,
        _ => return StepResult::text("not an operator action"),
    };

    let outcome = engine.dispatch(action);
    let command = match &outcome {
        ActionOutcome::Commit(Scheduled::Applied(receipt)) if receipt.delivery.is_delivered() => {
            Some(receipt.command.text())
        }
        _ => None,
    };
    StepResult {
        summary: outcome.to_string(),
        command,
    }
}

fn describe(step: &ScriptStep) -> String {
    match step {
        ScriptStep::Sample(s) => format!(
            "sample {}, {} @ {}",
            s.latitude,
            s.longitude,
            s.timestamp.timestamp()
        ),
        ScriptStep::Pick {
            latitude,
            longitude,
        } => format!("pick {}, {}", latitude, longitude),
        ScriptStep::Set {
            latitude,
            longitude,
            altitude,
        } => match altitude {
            Some(alt) => format!("set '{}', '{}', '{}'", latitude, longitude, alt),
            None => format!("set '{}', '{}'", latitude, longitude),
        },
        ScriptStep::Current => "current".to_string(),
        ScriptStep::Attach { name, .. } => format!("attach {}", name),
        ScriptStep::Detach { name: Some(name) } => format!("detach {}", name),
        ScriptStep::Detach { name: None } => "detach all".to_string(),
        ScriptStep::Connect => "connect".to_string(),
        ScriptStep::Disconnect => "disconnect".to_string(),
        ScriptStep::Fail(message) => format!("fail {}", message),
        ScriptStep::Auth(status) => format!("auth {}", status),
    }
}

/// Run the replay command.
pub fn run(args: ReplayArgs, config: &ConfigFile) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&args.file).map_err(|error| CliError::FileRead {
        path: args.file.display().to_string(),
        error,
    })?;
    let steps = parse_script(&text)?;
    tracing::info!(steps = steps.len(), file = %args.file.display(), "Replaying script");

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let report = runtime.block_on(execute(&steps, config));

    for line in &report.lines {
        println!("{}", line);
    }

    if !args.quiet {
        println!();
        println!("{}", report.map);
        println!("Status: {}", report.status);
        println!();
        print!("{}", report.diagnostics);
        println!();
        println!(
            "Samples: {} accepted, {} dropped | Commits: {} applied, {} rejected | Commands sent: {} ({} failed)",
            report.stats.samples_accepted,
            report.stats.samples_dropped,
            report.stats.commits,
            report.stats.commits_rejected,
            report.stats.commands_delivered,
            report.stats.command_failures
        );
        println!(
            "Source events: {} | Broadcast: {} received, {} missed",
            report.pump.events, report.broadcast_received, report.broadcast_missed
        );
    }

    Ok(())
}
