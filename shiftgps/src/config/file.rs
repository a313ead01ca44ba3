//! Configuration file handling for ~/.shiftgps/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::tracking::{
    EngineSettings, GapTrackerConfig, MotionTrackerConfig, SessionSettings, StreamHealthConfig,
};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.shiftgps/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.shiftgps/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// Runtime engine settings described by this file.
    pub fn engine_settings(&self) -> EngineSettings {
        let startup_grace = Duration::from_secs(self.health.startup_grace_secs);
        let lost_after = Duration::from_secs(self.health.gps_lost_after_secs);

        EngineSettings {
            platform: self.engine.platform,
            tick_interval: Duration::from_secs(self.engine.tick_interval_secs),
            subscribe_attempts: self.engine.subscribe_attempts,
            subscribe_backoff: Duration::from_secs(self.engine.subscribe_backoff_secs),
            first_fix_timeout: Duration::from_secs(self.engine.first_fix_timeout_secs),
            max_runtime: (self.engine.max_runtime_secs > 0)
                .then(|| Duration::from_secs(self.engine.max_runtime_secs)),
            session: SessionSettings {
                motion: MotionTrackerConfig {
                    min_movement_meters: self.motion.min_movement_meters,
                    stationary_dwell: Duration::from_secs(self.motion.stationary_dwell_secs),
                },
                gap: GapTrackerConfig {
                    lost_after,
                    startup_grace,
                },
                health: StreamHealthConfig {
                    unhealthy_after: lost_after,
                    startup_grace,
                    no_fix_timeout: Duration::from_secs(self.health.no_fix_recovery_secs),
                    max_backoff: Duration::from_secs(
                        self.health.max_backoff_minutes.saturating_mul(60),
                    ),
                    escalate_every: self.health.escalate_every,
                },
                active_capture_interval: Duration::from_secs(self.sampling.active_capture_secs),
            },
        }
    }
}

/// Get the path to the config directory (~/.shiftgps).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shiftgps")
}

/// Get the path to the config file (~/.shiftgps/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
