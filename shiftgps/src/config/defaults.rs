//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation. Runtime defaults come from the tracking module so the
//! file and the engine never disagree.

use super::settings::*;
use crate::logging::{default_log_dir, default_log_file};
use crate::tracking::source::Platform;

// =============================================================================
// Engine defaults
// =============================================================================

/// Default health tick period in seconds.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

/// Default subscription attempts at startup.
pub const DEFAULT_SUBSCRIBE_ATTEMPTS: u32 = 3;

/// Default subscription backoff step in seconds.
pub const DEFAULT_SUBSCRIBE_BACKOFF_SECS: u64 = 2;

/// Default one-shot fix bound in seconds.
pub const DEFAULT_FIRST_FIX_TIMEOUT_SECS: u64 = 10;

/// Default background execution limit (unlimited).
pub const DEFAULT_MAX_RUNTIME_SECS: u64 = 0;

// =============================================================================
// Motion and sampling defaults
// =============================================================================

/// Default movement threshold floor in meters.
pub const DEFAULT_MIN_MOVEMENT_METERS: f64 = 10.0;

/// Default stationary dwell (5 minutes).
pub const DEFAULT_STATIONARY_DWELL_SECS: u64 = 300;

/// Default capture interval while moving.
pub const DEFAULT_ACTIVE_CAPTURE_SECS: u64 = 10;

// =============================================================================
// Health defaults
// =============================================================================

/// Default startup grace period.
pub const DEFAULT_STARTUP_GRACE_SECS: u64 = 60;

/// Default silence before GPS counts as lost.
pub const DEFAULT_GPS_LOST_AFTER_SECS: u64 = 45;

/// Default wait for the first fix before forcing a recovery.
pub const DEFAULT_NO_FIX_RECOVERY_SECS: u64 = 30;

/// Default backoff cap (15 minutes).
pub const DEFAULT_MAX_BACKOFF_MINUTES: u64 = 15;

/// Default escalation period in attempts.
pub const DEFAULT_ESCALATE_EVERY: u32 = 5;

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            engine: EngineSection {
                platform: Platform::default(),
                tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
                subscribe_attempts: DEFAULT_SUBSCRIBE_ATTEMPTS,
                subscribe_backoff_secs: DEFAULT_SUBSCRIBE_BACKOFF_SECS,
                first_fix_timeout_secs: DEFAULT_FIRST_FIX_TIMEOUT_SECS,
                max_runtime_secs: DEFAULT_MAX_RUNTIME_SECS,
            },
            motion: MotionSettings {
                min_movement_meters: DEFAULT_MIN_MOVEMENT_METERS,
                stationary_dwell_secs: DEFAULT_STATIONARY_DWELL_SECS,
            },
            sampling: SamplingSettings {
                active_capture_secs: DEFAULT_ACTIVE_CAPTURE_SECS,
            },
            health: HealthSettings {
                startup_grace_secs: DEFAULT_STARTUP_GRACE_SECS,
                gps_lost_after_secs: DEFAULT_GPS_LOST_AFTER_SECS,
                no_fix_recovery_secs: DEFAULT_NO_FIX_RECOVERY_SECS,
                max_backoff_minutes: DEFAULT_MAX_BACKOFF_MINUTES,
                escalate_every: DEFAULT_ESCALATE_EVERY,
            },
            logging: LoggingSettings {
                directory: default_log_dir().to_string(),
                file: default_log_file().to_string(),
            },
        }
    }
}
