//! Motion state tracking - stationary vs. moving.
//!
//! A device counts as moving only when it is displaced further than the
//! combined uncertainty of the two fixes being compared. It counts as
//! stationary only after staying inside that radius for a full dwell period.
//!
//! # Dwell Anchor
//!
//! The reference position is replaced **only** on real displacement. Fixes
//! that land inside the threshold are compared against the same anchor, so
//! slow GPS drift cannot walk the anchor along and a two-minute stop at a
//! traffic light never accumulates enough dwell to read as stationary.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::geo::distance_meters;
use super::position::RawPosition;
use crate::time::since;

/// Default movement threshold floor.
pub const DEFAULT_MIN_MOVEMENT_METERS: f64 = 10.0;

/// Default dwell before a device is considered stationary.
pub const DEFAULT_STATIONARY_DWELL: Duration = Duration::from_secs(5 * 60);

/// Configuration for the motion tracker.
#[derive(Debug, Clone)]
pub struct MotionTrackerConfig {
    /// Lower bound of the displacement threshold, whatever the fix accuracy.
    pub min_movement_meters: f64,

    /// Time inside the threshold before the device is marked stationary.
    pub stationary_dwell: Duration,
}

impl Default for MotionTrackerConfig {
    fn default() -> Self {
        Self {
            min_movement_meters: DEFAULT_MIN_MOVEMENT_METERS,
            stationary_dwell: DEFAULT_STATIONARY_DWELL,
        }
    }
}

/// Position the current dwell is measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReference {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

impl From<&RawPosition> for MotionReference {
    fn from(position: &RawPosition) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            accuracy: position.accuracy,
        }
    }
}

/// Current motion classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionState {
    is_stationary: bool,
    dwell_anchor: Option<DateTime<Utc>>,
    reference: Option<MotionReference>,
}

impl MotionState {
    pub fn is_stationary(&self) -> bool {
        self.is_stationary
    }

    /// Start of the current not-moved period.
    pub fn dwell_anchor(&self) -> Option<DateTime<Utc>> {
        self.dwell_anchor
    }

    pub fn reference(&self) -> Option<&MotionReference> {
        self.reference.as_ref()
    }
}

/// What an update did to the motion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionTransition {
    /// First fix seen; anchor established.
    Anchored,
    /// Displacement beyond threshold; anchor moved.
    Moved,
    /// Dwell confirmed; device is now stationary.
    BecameStationary,
    /// Nothing changed.
    Unchanged,
}

/// Classifies the device as stationary or moving.
#[derive(Debug, Default)]
pub struct MotionStateTracker {
    config: MotionTrackerConfig,
    state: MotionState,
}

impl MotionStateTracker {
    /// Create a tracker with default thresholds.
    pub fn new() -> Self {
        Self::with_config(MotionTrackerConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(config: MotionTrackerConfig) -> Self {
        Self {
            config,
            state: MotionState::default(),
        }
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    pub fn is_stationary(&self) -> bool {
        self.state.is_stationary
    }

    /// Feed a fix into the tracker.
    pub fn update(&mut self, position: &RawPosition, now: DateTime<Utc>) -> MotionTransition {
        let Some(reference) = self.state.reference else {
            self.state.reference = Some(MotionReference::from(position));
            self.state.dwell_anchor = Some(now);
            return MotionTransition::Anchored;
        };

        let distance = distance_meters(
            (reference.latitude, reference.longitude),
            position.coordinates(),
        );
        let threshold = self
            .config
            .min_movement_meters
            .max(reference.accuracy.max(position.accuracy));

        if distance > threshold {
            let was_stationary = self.state.is_stationary;
            self.state.is_stationary = false;
            self.state.dwell_anchor = Some(now);
            self.state.reference = Some(MotionReference::from(position));

            if was_stationary {
                tracing::debug!(
                    distance_m = format!("{:.1}", distance),
                    threshold_m = format!("{:.1}", threshold),
                    "Movement detected, leaving stationary state"
                );
            }
            return MotionTransition::Moved;
        }

        if self.state.is_stationary {
            return MotionTransition::Unchanged;
        }

        let anchor = *self.state.dwell_anchor.get_or_insert(now);
        if since(now, anchor) >= self.config.stationary_dwell {
            self.state.is_stationary = true;
            tracing::debug!(
                dwell_secs = since(now, anchor).as_secs(),
                "Dwell confirmed, device is stationary"
            );
            return MotionTransition::BecameStationary;
        }

        MotionTransition::Unchanged
    }
}
