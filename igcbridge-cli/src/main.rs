//! igcbridge CLI - Command-line interface
//!
//! Headless front end for the igcbridge library: listens for simulator
//! telemetry and records IGC flight logs.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "igcbridge")]
#[command(version = igcbridge::VERSION)]
#[command(about = "Record flight simulator telemetry as IGC flight logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for telemetry and record flights (interactive prompt)
    Run {
        /// Start recording immediately
        #[arg(long)]
        record: bool,

        /// UDP port to listen on (overrides network.udp_port)
        #[arg(long)]
        port: Option<u16>,

        /// Directory for flight logs (overrides recording.directory)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Seconds between recorded fixes (overrides recording.interval)
        #[arg(long)]
        interval: Option<f64>,

        /// Pilot name for new recordings (overrides pilot.name)
        #[arg(long)]
        pilot: Option<String>,

        /// Print a status line every N seconds (0 disables)
        #[arg(long, default_value = "0")]
        status_every: u64,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// View or change configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Create ~/.igcbridge/config.ini with default settings
    Init,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            record,
            port,
            output_dir,
            interval,
            pilot,
            status_every,
            debug,
        } => commands::run::run(RunArgs {
            record,
            port,
            output_dir,
            interval,
            pilot,
            status_every,
            debug,
        }),
        Commands::Config { command } => commands::config::run(command),
        Commands::Init => commands::config::run_init(),
    };

    if let Err(e) = result {
        e.exit();
    }
}
