//! Run command - listen for telemetry and record flights.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Interval;
use tracing::{info, warn};

use igcbridge::config::{positive_duration, ConfigFile};
use igcbridge::igc::{format_duration, RecordingMetadata};
use igcbridge::session::{Session, SessionStatus, SettingsUpdate};

use super::prompt::{PromptCommand, HELP};
use crate::error::CliError;
use crate::runner::CliRunner;

/// How long runtime shutdown waits for the blocking stdin reader.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Arguments for the run command.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub record: bool,
    pub port: Option<u16>,
    pub output_dir: Option<PathBuf>,
    pub interval: Option<f64>,
    pub pilot: Option<String>,
    pub status_every: u64,
    pub debug: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("run");
    let config = apply_overrides(runner.config().clone(), &args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let result = runtime.block_on(run_session(config, &args));

    // stdin is read on a blocking thread that only returns on the next line
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(mut config: ConfigFile, args: &RunArgs) -> Result<ConfigFile, CliError> {
    if let Some(port) = args.port {
        config.network.udp_port = port;
    }
    if let Some(dir) = &args.output_dir {
        config.recording.directory = dir.clone();
    }
    if let Some(interval) = args.interval {
        if positive_duration(interval).is_none() {
            return Err(CliError::Config(
                "--interval must be a positive number of seconds".to_string(),
            ));
        }
        config.recording.interval = interval;
    }
    if let Some(pilot) = &args.pilot {
        config.pilot.name = pilot.clone();
    }
    Ok(config)
}

async fn run_session(config: ConfigFile, args: &RunArgs) -> Result<(), CliError> {
    let session = Arc::new(Session::new(config.to_session_config()));
    session.start().await?;

    let signal_session = Arc::clone(&session);
    if let Err(e) = ctrlc::set_handler(move || signal_session.request_shutdown()) {
        session.stop().await;
        return Err(CliError::Config(format!(
            "Failed to set signal handler: {}",
            e
        )));
    }

    print_banner(&session, &config);

    if args.record {
        start_recording(&session, None).await;
    }

    command_loop(&session, args.status_every).await;

    session.stop().await;
    println!("Stopped.");
    Ok(())
}

fn print_banner(session: &Session, config: &ConfigFile) {
    let port = session
        .listener()
        .local_addr()
        .map_or(config.network.udp_port, |addr| addr.port());

    println!("igcbridge v{}", igcbridge::VERSION);
    println!();
    println!("  Listening on UDP port {}", style(port).cyan());
    println!(
        "  Flight logs:  {}",
        config.recording.directory.display()
    );
    println!("  Pilot:        {}", config.pilot.name);
    println!();
    println!("Enable telemetry broadcast in the simulator, then type 'start'.");
    println!("Type 'help' for commands. Press Ctrl+C to exit.");
    println!();
}

/// Read prompt commands until quit, Ctrl+C, or a shutdown request.
async fn command_loop(session: &Session, status_every: u64) {
    let shutdown = session.shutdown_token();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = (status_every > 0)
        .then(|| tokio::time::interval(Duration::from_secs(status_every)));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                println!();
                println!("Shutting down...");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_line(session, &line).await {
                        break;
                    }
                }
                Ok(None) => {
                    info!("stdin closed, waiting for Ctrl+C");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read command");
                    stdin_open = false;
                }
            },
            _ = tick(&mut ticker) => {
                println!("{}", status_line(&session.status().await));
            }
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Execute one prompt line. Returns `false` when the loop should end.
async fn handle_line(session: &Session, line: &str) -> bool {
    match PromptCommand::parse(line) {
        PromptCommand::Start { pilot } => {
            let metadata = pilot.map(|pilot_name| RecordingMetadata {
                pilot_name,
                glider_type: String::new(),
                glider_id: String::new(),
                competition_class: None,
            });
            start_recording(session, metadata).await;
        }
        PromptCommand::Stop => stop_recording(session).await,
        PromptCommand::Status => println!("{}", session.status().await),
        PromptCommand::StatusJson => match serde_json::to_string_pretty(&session.status().await) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!(error = %e, "Failed to serialize status"),
        },
        PromptCommand::Interval(interval) => {
            session.update_settings(SettingsUpdate {
                recording_interval: Some(interval),
                ..Default::default()
            });
            println!("Recording interval set to {}s", interval.as_secs_f64());
        }
        PromptCommand::Help => println!("{}", HELP),
        PromptCommand::Quit => return false,
        PromptCommand::Empty => {}
        PromptCommand::Invalid(reason) => println!("{}", style(reason).yellow()),
        PromptCommand::Unknown(word) => {
            println!("Unknown command '{}'. Type 'help' for commands.", word)
        }
    }
    true
}

async fn start_recording(session: &Session, metadata: Option<RecordingMetadata>) {
    if !session.listener().has_connection() {
        println!(
            "{}",
            style("No telemetry received yet; recording will start with the first position.")
                .yellow()
        );
    }
    match session.start_recording(metadata).await {
        Ok(path) => println!("{} {}", style("● Recording").red().bold(), path.display()),
        Err(e) => println!("{} {}", style("Cannot start recording:").yellow(), e),
    }
}

async fn stop_recording(session: &Session) {
    match session.stop_recording().await {
        Ok(summary) => match summary.path {
            Some(path) => println!(
                "Saved {} ({} fixes, {})",
                path.display(),
                summary.fix_count,
                format_duration(summary.duration)
            ),
            None => println!("No positions were recorded; nothing saved."),
        },
        Err(e) => println!("{} {}", style("Cannot stop recording:").yellow(), e),
    }
}

/// One-line status for periodic output.
fn status_line(status: &SessionStatus) -> String {
    let link = if status.connection.has_connection {
        "connected"
    } else {
        "no data"
    };
    let mut line = format!("[{}] {}", link, status.recorder.writer);
    if let Some(position) = &status.recorder.latest_position {
        line.push_str(&format!(
            " | {:.5}, {:.5} {:.0} m",
            position.latitude, position.longitude, position.altitude
        ));
    }
    line
}
