//! Core position types for shift tracking.
//!
//! - [`RawPosition`] - A fix as delivered by the OS location API
//! - [`CapturedPoint`] - A fix the engine decided to keep, stamped with shift identity
//! - [`TrackingIdentity`] - Who and which shift the captures belong to
//!
//! Optional numeric fields are `Option<f64>` end to end. A missing altitude is
//! `None`, never `0.0`, so a genuine sea-level fix survives the protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw fix from the position source.
///
/// Ephemeral: the engine only ever holds the latest one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Horizontal accuracy radius in meters (lower is better).
    pub accuracy: f64,

    /// Ground speed in meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_accuracy: Option<f64>,

    /// Course over ground in degrees (0-360).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_accuracy: Option<f64>,

    /// Altitude above the WGS84 ellipsoid in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_accuracy: Option<f64>,

    /// When the OS measured this fix.
    pub timestamp: DateTime<Utc>,

    /// Set when the OS reports the fix came from a mock provider.
    #[serde(default)]
    pub is_mocked: bool,
}

impl RawPosition {
    /// Create a fix with only the mandatory fields set.
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            speed: None,
            speed_accuracy: None,
            heading: None,
            heading_accuracy: None,
            altitude: None,
            altitude_accuracy: None,
            timestamp,
            is_mocked: false,
        }
    }

    /// Set the ground speed (m/s).
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Set the course over ground (degrees).
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Set the altitude (meters).
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Position as a (latitude, longitude) pair.
    #[inline]
    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Shift and employee the engine is capturing for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingIdentity {
    pub shift_id: String,
    pub employee_id: String,
}

impl TrackingIdentity {
    pub fn new(shift_id: impl Into<String>, employee_id: impl Into<String>) -> Self {
        Self {
            shift_id: shift_id.into(),
            employee_id: employee_id.into(),
        }
    }
}

/// Delivery state of a captured point, owned by the receiving process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Not yet persisted upstream. Every point leaves the engine in this state.
    #[default]
    Pending,
    /// Persisted upstream.
    Synced,
}

/// A fix the sampling controller decided to keep.
///
/// Handed to the outbound channel as soon as it is created; the engine keeps
/// no copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedPoint {
    pub id: Uuid,
    pub shift_id: String,
    pub employee_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_accuracy: Option<f64>,
    /// When the OS measured the underlying fix.
    pub timestamp: DateTime<Utc>,
    pub is_mocked: bool,
    /// When the engine captured the fix.
    pub captured_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    /// Motion-context hint from the most recent `activityUpdate` command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
}

impl CapturedPoint {
    /// Build a point from a raw fix.
    ///
    /// Optional fields are only surfaced when they hold a usable value:
    /// speed, heading and all accuracies must be finite and non-negative,
    /// altitude must be finite.
    pub fn from_position(
        position: &RawPosition,
        identity: &TrackingIdentity,
        activity: Option<&str>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            shift_id: identity.shift_id.clone(),
            employee_id: identity.employee_id.clone(),
            latitude: position.latitude,
            longitude: position.longitude,
            accuracy: position.accuracy,
            speed: non_negative(position.speed),
            speed_accuracy: non_negative(position.speed_accuracy),
            heading: non_negative(position.heading),
            heading_accuracy: non_negative(position.heading_accuracy),
            altitude: position.altitude.filter(|v| v.is_finite()),
            altitude_accuracy: non_negative(position.altitude_accuracy),
            timestamp: position.timestamp,
            is_mocked: position.is_mocked,
            captured_at,
            sync_status: SyncStatus::Pending,
            activity: activity.map(str::to_string),
        }
    }
}

fn non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> TrackingIdentity {
        TrackingIdentity::new("shift-1", "emp-7")
    }

    #[test]
    fn test_point_copies_identity_and_coordinates() {
        let now = Utc::now();
        let fix = RawPosition::new(52.52, 13.405, 8.0, now);

        let point = CapturedPoint::from_position(&fix, &identity(), None, now);

        assert_eq!(point.shift_id, "shift-1");
        assert_eq!(point.employee_id, "emp-7");
        assert_eq!(point.latitude, 52.52);
        assert_eq!(point.longitude, 13.405);
        assert_eq!(point.sync_status, SyncStatus::Pending);
        assert!(point.activity.is_none());
    }

    #[test]
    fn test_invalid_optionals_are_dropped() {
        let now = Utc::now();
        let mut fix = RawPosition::new(0.0, 0.0, 5.0, now)
            .with_speed(-1.0)
            .with_heading(f64::NAN)
            .with_altitude(f64::INFINITY);
        fix.speed_accuracy = Some(-0.5);

        let point = CapturedPoint::from_position(&fix, &identity(), None, now);

        assert!(point.speed.is_none());
        assert!(point.speed_accuracy.is_none());
        assert!(point.heading.is_none());
        assert!(point.altitude.is_none());
    }

    #[test]
    fn test_sea_level_altitude_survives() {
        let now = Utc::now();
        let fix = RawPosition::new(0.0, 0.0, 5.0, now).with_altitude(0.0);

        let point = CapturedPoint::from_position(&fix, &identity(), Some("in_vehicle"), now);

        assert_eq!(point.altitude, Some(0.0));
        assert_eq!(point.activity.as_deref(), Some("in_vehicle"));
    }

    #[test]
    fn test_point_ids_are_unique() {
        let now = Utc::now();
        let fix = RawPosition::new(0.0, 0.0, 5.0, now);

        let a = CapturedPoint::from_position(&fix, &identity(), None, now);
        let b = CapturedPoint::from_position(&fix, &identity(), None, now);

        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_absent_optionals_are_omitted_from_json() {
        let now = Utc::now();
        let fix = RawPosition::new(1.0, 2.0, 3.0, now);
        let point = CapturedPoint::from_position(&fix, &identity(), None, now);

        let json = serde_json::to_value(&point).unwrap();

        assert!(json.get("altitude").is_none());
        assert!(json.get("speed").is_none());
        assert_eq!(json["sync_status"], "pending");
    }
}
