//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [engine] section
    if let Some(section) = ini.section(Some("engine")) {
        let s = Section::new("engine", section);
        if let Some(v) = section.get("platform") {
            config.engine.platform = v
                .trim()
                .to_lowercase()
                .parse()
                .map_err(|_| s.invalid("platform", v, "must be 'android' or 'ios'"))?;
        }
        s.positive("tick_interval_secs", &mut config.engine.tick_interval_secs)?;
        s.positive("subscribe_attempts", &mut config.engine.subscribe_attempts)?;
        s.number(
            "subscribe_backoff_secs",
            &mut config.engine.subscribe_backoff_secs,
        )?;
        s.positive(
            "first_fix_timeout_secs",
            &mut config.engine.first_fix_timeout_secs,
        )?;
        s.number("max_runtime_secs", &mut config.engine.max_runtime_secs)?;
    }

    // [motion] section
    if let Some(section) = ini.section(Some("motion")) {
        let s = Section::new("motion", section);
        if let Some(v) = section.get("min_movement_meters") {
            config.motion.min_movement_meters = v
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|m| m.is_finite() && *m >= 0.0)
                .ok_or_else(|| {
                    s.invalid(
                        "min_movement_meters",
                        v,
                        "must be a non-negative number (meters)",
                    )
                })?;
        }
        s.positive(
            "stationary_dwell_secs",
            &mut config.motion.stationary_dwell_secs,
        )?;
    }

    // [sampling] section
    if let Some(section) = ini.section(Some("sampling")) {
        let s = Section::new("sampling", section);
        s.positive(
            "active_capture_secs",
            &mut config.sampling.active_capture_secs,
        )?;
    }

    // [health] section
    if let Some(section) = ini.section(Some("health")) {
        let s = Section::new("health", section);
        s.number("startup_grace_secs", &mut config.health.startup_grace_secs)?;
        s.positive("gps_lost_after_secs", &mut config.health.gps_lost_after_secs)?;
        s.positive(
            "no_fix_recovery_secs",
            &mut config.health.no_fix_recovery_secs,
        )?;
        s.positive(
            "max_backoff_minutes",
            &mut config.health.max_backoff_minutes,
        )?;
        s.number("escalate_every", &mut config.health.escalate_every)?;
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = v.to_string();
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

/// One INI section with typed accessors.
struct Section<'a> {
    name: &'static str,
    properties: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, properties: &'a Properties) -> Self {
        Self { name, properties }
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigFileError {
        ConfigFileError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Overwrite `target` with a non-negative integer, if the key is set.
    fn number<T: FromStr>(&self, key: &str, target: &mut T) -> Result<(), ConfigFileError> {
        if let Some(v) = self.properties.get(key) {
            *target = v
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, v, "must be a non-negative integer"))?;
        }
        Ok(())
    }

    /// Like [`Section::number`] but rejects zero.
    fn positive<T: FromStr + Default + PartialEq>(
        &self,
        key: &str,
        target: &mut T,
    ) -> Result<(), ConfigFileError> {
        if let Some(v) = self.properties.get(key) {
            let parsed: T = v
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, v, "must be a positive integer"))?;
            if parsed == T::default() {
                return Err(self.invalid(key, v, "must be greater than zero"));
            }
            *target = parsed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::source::Platform;

    fn parse(text: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(text).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_is_default() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_partial_config() {
        let config = parse(
            r#"
[engine]
platform = iOS
max_runtime_secs = 3600

[health]
escalate_every = 0
"#,
        )
        .unwrap();

        assert_eq!(config.engine.platform, Platform::Ios);
        assert_eq!(config.engine.max_runtime_secs, 3600);
        assert_eq!(config.engine.tick_interval_secs, 30);
        assert_eq!(config.health.escalate_every, 0);
        assert_eq!(config.health.gps_lost_after_secs, 45);
    }

    #[test]
    fn test_invalid_platform() {
        let err = parse("[engine]\nplatform = windows\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "engine");
                assert_eq!(key, "platform");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        assert!(matches!(
            parse("[engine]\ntick_interval_secs = 0\n"),
            Err(ConfigFileError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let err = parse("[sampling]\nactive_capture_secs = fast\n").unwrap_err();
        assert!(err.to_string().contains("sampling.active_capture_secs"));
    }

    #[test]
    fn test_negative_movement_rejected() {
        assert!(parse("[motion]\nmin_movement_meters = -1\n").is_err());
        let config = parse("[motion]\nmin_movement_meters = 25.5\n").unwrap();
        assert_eq!(config.motion.min_movement_meters, 25.5);
    }

    #[test]
    fn test_blank_logging_values_keep_defaults() {
        let config = parse("[logging]\ndirectory =\nfile = engine.log\n").unwrap();
        assert_eq!(config.logging.directory, "logs");
        assert_eq!(config.logging.file, "engine.log");
    }
}
