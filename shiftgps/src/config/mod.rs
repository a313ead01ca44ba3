//! User configuration for the ShiftGPS engine and CLI.
//!
//! Settings are read from `~/.shiftgps/config.ini`, one struct per
//! `[section]`, and converted into the runtime
//! [`EngineSettings`](crate::tracking::EngineSettings).
//!
//! Per-shift tuning (capture intervals, distance filter) does not live here:
//! it arrives with the startup context and through `updateConfig` commands.
//!
//! # Example
//!
//! ```
//! use shiftgps::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let settings = config.engine_settings();
//! assert_eq!(settings.subscribe_attempts, 3);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, EngineSection, HealthSettings, LoggingSettings, MotionSettings, SamplingSettings,
};
