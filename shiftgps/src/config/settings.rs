//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::tracking::source::Platform;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub motion: MotionSettings,
    pub sampling: SamplingSettings,
    pub health: HealthSettings,
    pub logging: LoggingSettings,
}

/// Engine lifecycle configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSection {
    /// Location API flavour the settings are built for.
    pub platform: Platform,
    /// Health tick period in seconds.
    pub tick_interval_secs: u64,
    /// Subscription attempts at startup.
    pub subscribe_attempts: u32,
    /// Linear backoff step between subscription attempts, in seconds.
    pub subscribe_backoff_secs: u64,
    /// Bound of the startup one-shot fix, in seconds.
    pub first_fix_timeout_secs: u64,
    /// Background execution limit in seconds. 0 = unlimited.
    pub max_runtime_secs: u64,
}

/// Motion detection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSettings {
    /// Floor of the movement threshold in meters.
    pub min_movement_meters: f64,
    /// Seconds inside the threshold before the device counts as stationary.
    pub stationary_dwell_secs: u64,
}

/// Sampling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSettings {
    /// Capture interval while moving, before the thermal multiplier.
    pub active_capture_secs: u64,
}

/// Signal loss and stream recovery configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSettings {
    pub startup_grace_secs: u64,
    /// Silence before GPS is reported lost and the stream is considered unhealthy.
    pub gps_lost_after_secs: u64,
    /// Wait for a first fix before forcing a recovery.
    pub no_fix_recovery_secs: u64,
    pub max_backoff_minutes: u64,
    /// Escalate every N failed attempts. 0 disables escalation.
    pub escalate_every: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: String,
    pub file: String,
}
