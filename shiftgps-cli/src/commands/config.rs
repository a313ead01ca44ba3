//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init` for inspecting
//! and creating `~/.shiftgps/config.ini`.

use clap::Subcommand;
use shiftgps::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration (file values over defaults)
    Show,

    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load_from(&path)?;

    if !path.exists() {
        println!("; {} not found, showing defaults", path.display());
        println!();
    }

    println!("[engine]");
    println!("platform = {}", config.engine.platform);
    println!("tick_interval_secs = {}", config.engine.tick_interval_secs);
    println!("subscribe_attempts = {}", config.engine.subscribe_attempts);
    println!(
        "subscribe_backoff_secs = {}",
        config.engine.subscribe_backoff_secs
    );
    println!(
        "first_fix_timeout_secs = {}",
        config.engine.first_fix_timeout_secs
    );
    println!("max_runtime_secs = {}", config.engine.max_runtime_secs);
    println!();
    println!("[motion]");
    println!("min_movement_meters = {}", config.motion.min_movement_meters);
    println!(
        "stationary_dwell_secs = {}",
        config.motion.stationary_dwell_secs
    );
    println!();
    println!("[sampling]");
    println!(
        "active_capture_secs = {}",
        config.sampling.active_capture_secs
    );
    println!();
    println!("[health]");
    println!("startup_grace_secs = {}", config.health.startup_grace_secs);
    println!("gps_lost_after_secs = {}", config.health.gps_lost_after_secs);
    println!(
        "no_fix_recovery_secs = {}",
        config.health.no_fix_recovery_secs
    );
    println!("max_backoff_minutes = {}", config.health.max_backoff_minutes);
    println!("escalate_every = {}", config.health.escalate_every);
    println!();
    println!("[logging]");
    println!("directory = {}", config.logging.directory);
    println!("file = {}", config.logging.file);

    Ok(())
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    if path.exists() && !force {
        println!("Configuration already exists: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;
    println!("Wrote default configuration: {}", path.display());
    Ok(())
}
