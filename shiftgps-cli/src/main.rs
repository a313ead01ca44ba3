//! ShiftGPS CLI - Command-line host for the tracking engine
//!
//! Runs the engine as a worker process: commands in on stdin, events out on
//! stdout, both as JSON lines.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shiftgps::tracking::source::Platform;

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "shiftgps")]
#[command(version = shiftgps::VERSION)]
#[command(about = "Adaptive background position tracking for work shifts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking engine against a recorded location trace
    ///
    /// Reads commands (JSON, one per line) from stdin and writes events
    /// (JSON, one per line) to stdout. Ctrl+C stops the engine.
    Run {
        /// Startup context JSON file (shift_id, employee_id, intervals, ...)
        #[arg(long)]
        context: PathBuf,

        /// Location trace, JSON lines with at_secs offsets
        #[arg(long)]
        trace: PathBuf,

        /// Location API flavour (overrides config.ini)
        #[arg(long)]
        platform: Option<Platform>,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// Manage ~/.shiftgps/config.ini
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            context,
            trace,
            platform,
            debug,
        } => commands::run::run(RunArgs {
            context,
            trace,
            platform,
            debug,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
