//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use shiftgps::config::ConfigFileError;
use shiftgps::protocol::ProtocolError;
use shiftgps::tracking::source::SourceError;
use shiftgps::tracking::EngineError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read the startup context file
    ContextRead { path: PathBuf, error: std::io::Error },
    /// Startup context is not valid JSON
    ContextParse { path: PathBuf, error: ProtocolError },
    /// Trace file could not be loaded
    Trace { path: PathBuf, error: SourceError },
    /// Failed to build the async runtime
    Runtime(std::io::Error),
    /// Engine stopped with a fatal error
    Engine(EngineError),
    /// Engine task panicked or was cancelled
    EngineTask(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Trace { .. } => {
                eprintln!();
                eprintln!("A trace is JSON lines, one entry per line, for example:");
                eprintln!(
                    r#"  {{"at_secs": 0.0, "fix": {{"latitude": 52.52, "longitude": 13.405, "accuracy": 8.0}}}}"#
                );
                eprintln!(r#"  {{"at_secs": 12.5, "error": "services_disabled"}}"#);
            }
            CliError::Engine(EngineError::StreamInit { .. }) => {
                eprintln!();
                eprintln!("The location subscription could not be opened.");
                eprintln!("Check that location services are enabled and permission is granted.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_)
            | CliError::ContextRead { .. }
            | CliError::ContextParse { .. }
            | CliError::Trace { .. } => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ContextRead { path, error } => {
                write!(f, "Failed to read context '{}': {}", path.display(), error)
            }
            CliError::ContextParse { path, error } => {
                write!(f, "Invalid context '{}': {}", path.display(), error)
            }
            CliError::Trace { path, error } => {
                write!(f, "Failed to load trace '{}': {}", path.display(), error)
            }
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Engine(e) => write!(f, "Tracking engine failed: {}", e),
            CliError::EngineTask(msg) => write!(f, "Tracking engine task failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ContextRead { error, .. } => Some(error),
            CliError::ContextParse { error, .. } => Some(error),
            CliError::Trace { error, .. } => Some(error),
            CliError::Runtime(e) => Some(e),
            CliError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}
