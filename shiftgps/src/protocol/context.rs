//! Startup context handed to the engine by the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ProtocolError;
use crate::tracking::config::{ConfigRejection, ConfigUpdate, EngineConfig};
use crate::tracking::position::TrackingIdentity;

/// Everything the engine needs to know about the shift it tracks.
///
/// Every field is optional on the wire. Missing ids make the engine stop
/// without error; missing tuning values fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_interval_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stationary_interval_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_filter_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clocked_in_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_point_count: Option<u64>,
}

impl StartupContext {
    /// Context for a shift with default tuning.
    pub fn for_shift(shift_id: impl Into<String>, employee_id: impl Into<String>) -> Self {
        Self {
            shift_id: Some(shift_id.into()),
            employee_id: Some(employee_id.into()),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(ProtocolError::Decode)
    }

    /// Shift and employee ids, if both are present and non-blank.
    pub fn identity(&self) -> Option<TrackingIdentity> {
        let shift_id = self.shift_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let employee_id = self
            .employee_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some(TrackingIdentity::new(shift_id, employee_id))
    }

    /// Initial capture configuration.
    ///
    /// Context values go through the same validation as `updateConfig`;
    /// invalid ones keep the default and are reported.
    pub fn engine_config(&self) -> (EngineConfig, Vec<ConfigRejection>) {
        let mut config = EngineConfig::default();
        let rejected = config.apply(&ConfigUpdate {
            active_interval_seconds: self.active_interval_seconds,
            stationary_interval_seconds: self.stationary_interval_seconds,
            distance_filter_meters: self.distance_filter_meters,
            thermal_multiplier: None,
        });
        (config, rejected)
    }
}
