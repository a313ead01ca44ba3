//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[engine]
; Location API flavour the subscription settings are built for:
;   android - bounded interval hint (at most 15 s), distance filter from the shift config
;   ios     - distance filter forced to 0, background indicator shown
platform = {}
; Seconds between heartbeat / health checks (default: 30)
tick_interval_secs = {}
; Attempts to open the location subscription at startup (default: 3)
subscribe_attempts = {}
; Linear backoff step between attempts: attempt x step seconds (default: 2)
subscribe_backoff_secs = {}
; Bound of the one-shot fix taken at startup (default: 10)
first_fix_timeout_secs = {}
; Background execution limit in seconds, 0 = unlimited (default: 0)
; When reached the engine stops with is_timeout = true
max_runtime_secs = {}

[motion]
; Minimum displacement in meters that counts as movement (default: 10)
; Fix accuracy raises the threshold when it is worse than this floor
min_movement_meters = {}
; Seconds without movement before the device counts as stationary (default: 300)
stationary_dwell_secs = {}

[sampling]
; Capture interval in seconds while moving, before thermal throttling (default: 10)
active_capture_secs = {}

[health]
; Seconds after start during which GPS loss is not reported (default: 60)
startup_grace_secs = {}
; Seconds without a fix before GPS counts as lost (default: 45)
gps_lost_after_secs = {}
; Seconds to wait for the first fix before forcing a resubscribe (default: 30)
no_fix_recovery_secs = {}
; Upper bound of the backoff between recovery attempts (default: 15)
max_backoff_minutes = {}
; Report a failing recovery every N attempts, 0 = never (default: 5)
escalate_every = {}

[logging]
; Log directory, relative to the working directory (default: logs)
directory = {}
; Log file name, truncated at every start (default: shiftgps.log)
file = {}
"#,
        config.engine.platform,
        config.engine.tick_interval_secs,
        config.engine.subscribe_attempts,
        config.engine.subscribe_backoff_secs,
        config.engine.first_fix_timeout_secs,
        config.engine.max_runtime_secs,
        config.motion.min_movement_meters,
        config.motion.stationary_dwell_secs,
        config.sampling.active_capture_secs,
        config.health.startup_grace_secs,
        config.health.gps_lost_after_secs,
        config.health.no_fix_recovery_secs,
        config.health.max_backoff_minutes,
        config.health.escalate_every,
        config.logging.directory,
        config.logging.file,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::source::Platform;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.engine.platform = Platform::Ios;
        config.engine.max_runtime_secs = 7200;
        config.motion.min_movement_meters = 12.5;
        config.health.escalate_every = 3;
        config.logging.file = "engine.log".to_string();

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_output_is_commented() {
        let text = to_config_string(&ConfigFile::default());
        assert!(text.starts_with("[engine]"));
        assert!(text.contains("platform = android"));
        assert!(text.contains("; Seconds without a fix before GPS counts as lost"));
    }
}
