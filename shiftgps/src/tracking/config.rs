//! Runtime capture configuration.
//!
//! [`EngineConfig`] is the only part of the engine's configuration that can
//! change while it runs. It is seeded from the startup context and then
//! patched by `updateConfig` commands via [`ConfigUpdate`].

use serde::{Deserialize, Serialize};

/// Default interval between captures while stationary.
pub const DEFAULT_STATIONARY_INTERVAL_SECS: u32 = 120;

/// Default active interval hint passed to the platform.
pub const DEFAULT_ACTIVE_INTERVAL_SECS: u32 = 10;

/// Default OS-level distance filter.
pub const DEFAULT_DISTANCE_FILTER_METERS: f64 = 10.0;

/// Largest accepted thermal multiplier.
pub const MAX_THERMAL_MULTIPLIER: f64 = 10.0;

/// Capture configuration, read on every sampling decision.
///
/// # Invariants
///
/// - both intervals are greater than zero
/// - `1.0 <= thermal_multiplier <= MAX_THERMAL_MULTIPLIER`
/// - `distance_filter_meters >= 0.0`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Interval hint handed to the platform location API.
    pub active_interval_seconds: u32,

    /// Capture interval once the device is confirmed stationary.
    pub stationary_interval_seconds: u32,

    /// OS-level distance filter (ignored on platforms that suspend zero-motion streams).
    pub distance_filter_meters: f64,

    /// Scale factor applied to every capture interval under thermal pressure.
    pub thermal_multiplier: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            active_interval_seconds: DEFAULT_ACTIVE_INTERVAL_SECS,
            stationary_interval_seconds: DEFAULT_STATIONARY_INTERVAL_SECS,
            distance_filter_meters: DEFAULT_DISTANCE_FILTER_METERS,
            thermal_multiplier: 1.0,
        }
    }
}

/// A partial config patch. Only the fields present are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_interval_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stationary_interval_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_filter_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thermal_multiplier: Option<f64>,
}

/// A field of a [`ConfigUpdate`] that was refused.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRejection {
    pub field: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl EngineConfig {
    /// Merge an update, field by field.
    ///
    /// Fields that would break an invariant are skipped and reported; the
    /// remaining fields are still applied.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Vec<ConfigRejection> {
        let mut rejected = Vec::new();

        if let Some(v) = update.active_interval_seconds {
            if v > 0 {
                self.active_interval_seconds = v;
            } else {
                rejected.push(reject("active_interval_seconds", v, "must be greater than zero"));
            }
        }
        if let Some(v) = update.stationary_interval_seconds {
            if v > 0 {
                self.stationary_interval_seconds = v;
            } else {
                rejected.push(reject(
                    "stationary_interval_seconds",
                    v,
                    "must be greater than zero",
                ));
            }
        }
        if let Some(v) = update.distance_filter_meters {
            if v.is_finite() && v >= 0.0 {
                self.distance_filter_meters = v;
            } else {
                rejected.push(reject("distance_filter_meters", v, "must be zero or positive"));
            }
        }
        if let Some(v) = update.thermal_multiplier {
            if !v.is_finite() || v < 1.0 {
                rejected.push(reject("thermal_multiplier", v, "must be at least 1.0"));
            } else if v > MAX_THERMAL_MULTIPLIER {
                rejected.push(reject("thermal_multiplier", v, "must be at most 10.0"));
            } else {
                self.thermal_multiplier = v;
            }
        }

        rejected
    }
}

fn reject(field: &'static str, value: impl ToString, reason: &'static str) -> ConfigRejection {
    ConfigRejection {
        field,
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.active_interval_seconds, 10);
        assert_eq!(config.stationary_interval_seconds, 120);
        assert_eq!(config.thermal_multiplier, 1.0);
    }

    #[test]
    fn test_apply_merges_only_present_fields() {
        let mut config = EngineConfig::default();
        let update = ConfigUpdate {
            thermal_multiplier: Some(2.0),
            ..Default::default()
        };

        let rejected = config.apply(&update);

        assert!(rejected.is_empty());
        assert_eq!(config.thermal_multiplier, 2.0);
        assert_eq!(config.stationary_interval_seconds, 120);
    }

    #[test]
    fn test_apply_rejects_invalid_fields_but_keeps_valid_ones() {
        let mut config = EngineConfig::default();
        let update = ConfigUpdate {
            stationary_interval_seconds: Some(0),
            thermal_multiplier: Some(0.5),
            distance_filter_meters: Some(25.0),
            ..Default::default()
        };

        let rejected = config.apply(&update);

        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].field, "stationary_interval_seconds");
        assert_eq!(rejected[1].field, "thermal_multiplier");
        assert_eq!(config.stationary_interval_seconds, 120);
        assert_eq!(config.thermal_multiplier, 1.0);
        assert_eq!(config.distance_filter_meters, 25.0);
    }

    #[test]
    fn test_nan_multiplier_rejected() {
        let mut config = EngineConfig::default();
        let rejected = config.apply(&ConfigUpdate {
            thermal_multiplier: Some(f64::NAN),
            ..Default::default()
        });
        assert_eq!(rejected.len(), 1);
        assert_eq!(config.thermal_multiplier, 1.0);
    }

    #[test]
    fn test_oversized_multiplier_rejected() {
        let mut config = EngineConfig::default();
        let rejected = config.apply(&ConfigUpdate {
            thermal_multiplier: Some(1e20),
            ..Default::default()
        });
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].field, "thermal_multiplier");
        assert_eq!(rejected[0].reason, "must be at most 10.0");
        assert_eq!(config.thermal_multiplier, 1.0);

        let rejected = config.apply(&ConfigUpdate {
            thermal_multiplier: Some(MAX_THERMAL_MULTIPLIER),
            ..Default::default()
        });
        assert!(rejected.is_empty());
        assert_eq!(config.thermal_multiplier, MAX_THERMAL_MULTIPLIER);
    }
}
