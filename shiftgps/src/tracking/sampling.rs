//! Sampling controller - decides which fixes become captured points.
//!
//! The OS stream may deliver fixes every second; the controller rate-limits
//! them to one capture per interval. The interval depends on motion state:
//!
//! | Motion | Base interval |
//! |--------|---------------|
//! | Moving | active capture interval (10 s) |
//! | Stationary | `stationary_interval_seconds` |
//!
//! and is stretched by the thermal multiplier.
//!
//! # Mutual Exclusion
//!
//! A forced capture waits on an OS cache query. While it is in flight the
//! controller refuses stream captures so the same interval cannot be
//! captured twice; the stream fix is only remembered.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::config::EngineConfig;
use super::motion::MotionState;
use super::position::{CapturedPoint, RawPosition, TrackingIdentity};
use crate::time::since;

/// Capture interval while the device is moving.
pub const DEFAULT_ACTIVE_CAPTURE_INTERVAL: Duration = Duration::from_secs(10);

/// Compute the capture interval for a motion state.
///
/// `base × thermal_multiplier`, where base is `active` when moving and the
/// configured stationary interval when stationary. Saturates at
/// `Duration::MAX`.
pub fn capture_interval(is_stationary: bool, active: Duration, config: &EngineConfig) -> Duration {
    let base = if is_stationary {
        Duration::from_secs(u64::from(config.stationary_interval_seconds))
    } else {
        active
    };
    let scaled = base.as_secs_f64() * config.thermal_multiplier.max(1.0);
    Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX)
}

/// Outcome of offering a fix to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingDecision {
    /// The fix was captured.
    Captured(CapturedPoint),
    /// Not due yet; the fix is remembered for a forced capture.
    Deferred,
    /// A forced capture is in flight; the fix is remembered.
    InFlight,
}

/// Rate-limits the fix stream into captured points.
#[derive(Debug)]
pub struct SamplingController {
    identity: TrackingIdentity,
    active_interval: Duration,
    last_capture_at: Option<DateTime<Utc>>,
    last_position: Option<RawPosition>,
    capture_in_flight: bool,
    point_count: u64,
    last_speed: Option<f64>,
}

impl SamplingController {
    /// Create a controller.
    ///
    /// `initial_point_count` continues the shift's count across worker restarts.
    pub fn new(identity: TrackingIdentity, active_interval: Duration, initial_point_count: u64) -> Self {
        Self {
            identity,
            active_interval,
            last_capture_at: None,
            last_position: None,
            capture_in_flight: false,
            point_count: initial_point_count,
            last_speed: None,
        }
    }

    /// Interval currently in force.
    pub fn compute_interval(&self, motion: &MotionState, config: &EngineConfig) -> Duration {
        capture_interval(motion.is_stationary(), self.active_interval, config)
    }

    /// True when no capture exists yet or the interval has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>, motion: &MotionState, config: &EngineConfig) -> bool {
        match self.last_capture_at {
            None => true,
            Some(last) => since(now, last) >= self.compute_interval(motion, config),
        }
    }

    /// Offer a live fix.
    ///
    /// The caller has already updated fix bookkeeping and motion state.
    pub fn offer(
        &mut self,
        position: RawPosition,
        now: DateTime<Utc>,
        motion: &MotionState,
        config: &EngineConfig,
        activity: Option<&str>,
    ) -> SamplingDecision {
        if self.capture_in_flight {
            tracing::trace!("Forced capture in flight, remembering fix");
            self.last_position = Some(position);
            return SamplingDecision::InFlight;
        }

        if self.is_due(now, motion, config) {
            let point = self.capture(&position, now, activity);
            self.last_position = Some(position);
            return SamplingDecision::Captured(point);
        }

        self.last_position = Some(position);
        SamplingDecision::Deferred
    }

    /// Claim the capture path for a forced capture.
    ///
    /// Returns false when another forced capture already holds it.
    pub fn begin_forced_capture(&mut self) -> bool {
        if self.capture_in_flight {
            return false;
        }
        self.capture_in_flight = true;
        true
    }

    /// Finish a forced capture with the resolved fix (if any).
    ///
    /// Releases the capture path. The due check is repeated because config
    /// may have changed while the query was outstanding.
    pub fn complete_forced_capture(
        &mut self,
        position: Option<RawPosition>,
        now: DateTime<Utc>,
        motion: &MotionState,
        config: &EngineConfig,
        activity: Option<&str>,
    ) -> Option<CapturedPoint> {
        if !self.capture_in_flight {
            return None;
        }
        self.capture_in_flight = false;

        let position = position?;
        if !self.is_due(now, motion, config) {
            return None;
        }
        Some(self.capture(&position, now, activity))
    }

    fn capture(
        &mut self,
        position: &RawPosition,
        now: DateTime<Utc>,
        activity: Option<&str>,
    ) -> CapturedPoint {
        // Capture timestamps never go backwards
        let captured_at = match self.last_capture_at {
            Some(last) if last > now => last,
            _ => now,
        };
        let point = CapturedPoint::from_position(position, &self.identity, activity, captured_at);

        self.last_capture_at = Some(captured_at);
        self.last_speed = point.speed;
        self.point_count += 1;

        tracing::debug!(
            point_id = %point.id,
            point_count = self.point_count,
            lat = format!("{:.5}", point.latitude),
            lon = format!("{:.5}", point.longitude),
            accuracy_m = format!("{:.0}", point.accuracy),
            "Captured point"
        );

        point
    }

    pub fn identity(&self) -> &TrackingIdentity {
        &self.identity
    }

    pub fn point_count(&self) -> u64 {
        self.point_count
    }

    pub fn last_capture_at(&self) -> Option<DateTime<Utc>> {
        self.last_capture_at
    }

    /// Most recent live fix, captured or not.
    pub fn last_position(&self) -> Option<&RawPosition> {
        self.last_position.as_ref()
    }

    pub fn capture_in_flight(&self) -> bool {
        self.capture_in_flight
    }

    /// Speed of the most recent capture (m/s).
    pub fn last_speed(&self) -> Option<f64> {
        self.last_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::motion::MotionStateTracker;
    use chrono::TimeDelta;
    use proptest::prelude::*;

    fn controller() -> SamplingController {
        SamplingController::new(
            TrackingIdentity::new("shift-1", "emp-1"),
            DEFAULT_ACTIVE_CAPTURE_INTERVAL,
            0,
        )
    }

    fn fix(at: DateTime<Utc>) -> RawPosition {
        RawPosition::new(52.52, 13.405, 5.0, at)
    }

    fn stationary_state() -> MotionState {
        let mut tracker = MotionStateTracker::new();
        let t0 = Utc::now();
        tracker.update(&fix(t0), t0);
        let t1 = t0 + TimeDelta::seconds(300);
        tracker.update(&fix(t1), t1);
        assert!(tracker.is_stationary());
        tracker.state().clone()
    }

    #[test]
    fn test_interval_moving_uses_active_constant() {
        let config = EngineConfig::default();
        let interval = capture_interval(false, DEFAULT_ACTIVE_CAPTURE_INTERVAL, &config);
        assert_eq!(interval, Duration::from_secs(10));
    }

    #[test]
    fn test_interval_stationary_uses_config() {
        let config = EngineConfig {
            stationary_interval_seconds: 90,
            thermal_multiplier: 2.0,
            ..Default::default()
        };
        let interval = capture_interval(true, DEFAULT_ACTIVE_CAPTURE_INTERVAL, &config);
        assert_eq!(interval, Duration::from_secs(180));
    }

    #[test]
    fn test_interval_saturates_instead_of_overflowing() {
        // Bypasses `apply`, which caps the multiplier
        let config = EngineConfig {
            stationary_interval_seconds: u32::MAX,
            thermal_multiplier: 1e20,
            ..Default::default()
        };
        let interval = capture_interval(true, DEFAULT_ACTIVE_CAPTURE_INTERVAL, &config);
        assert_eq!(interval, Duration::MAX);
    }

    proptest! {
        #[test]
        fn prop_interval_scales_with_thermal_multiplier(
            stationary_secs in 1u32..3_600,
            thermal in 1.0f64..8.0,
            is_stationary in any::<bool>(),
        ) {
            let config = EngineConfig {
                stationary_interval_seconds: stationary_secs,
                thermal_multiplier: thermal,
                ..Default::default()
            };
            let base = if is_stationary { f64::from(stationary_secs) } else { 10.0 };

            let interval = capture_interval(is_stationary, DEFAULT_ACTIVE_CAPTURE_INTERVAL, &config);

            prop_assert!((interval.as_secs_f64() - base * thermal).abs() < 1e-6);
        }
    }

    #[test]
    fn test_first_fix_is_captured() {
        let mut sampler = controller();
        let now = Utc::now();

        let decision = sampler.offer(fix(now), now, &MotionState::default(), &EngineConfig::default(), None);

        assert!(matches!(decision, SamplingDecision::Captured(_)));
        assert_eq!(sampler.point_count(), 1);
        assert_eq!(sampler.last_capture_at(), Some(now));
    }

    #[test]
    fn test_two_fixes_within_interval_capture_once() {
        let mut sampler = controller();
        let motion = MotionState::default();
        let config = EngineConfig::default();
        let t0 = Utc::now();
        sampler.offer(fix(t0), t0, &motion, &config, None);

        let t1 = t0 + TimeDelta::seconds(3);
        let t2 = t0 + TimeDelta::seconds(7);
        let d1 = sampler.offer(fix(t1), t1, &motion, &config, None);
        let d2 = sampler.offer(fix(t2), t2, &motion, &config, None);

        assert_eq!(d1, SamplingDecision::Deferred);
        assert_eq!(d2, SamplingDecision::Deferred);
        assert_eq!(sampler.point_count(), 1);
        assert_eq!(sampler.last_position().unwrap().timestamp, t2);
    }

    #[test]
    fn test_capture_after_interval() {
        let mut sampler = controller();
        let motion = MotionState::default();
        let config = EngineConfig::default();
        let t0 = Utc::now();
        sampler.offer(fix(t0), t0, &motion, &config, None);

        let t1 = t0 + TimeDelta::seconds(10);
        let decision = sampler.offer(fix(t1), t1, &motion, &config, None);

        assert!(matches!(decision, SamplingDecision::Captured(_)));
        assert_eq!(sampler.point_count(), 2);
    }

    #[test]
    fn test_stationary_stretches_interval() {
        let mut sampler = controller();
        let motion = stationary_state();
        let config = EngineConfig::default();
        let t0 = Utc::now();
        sampler.offer(fix(t0), t0, &motion, &config, None);

        let t1 = t0 + TimeDelta::seconds(60);
        assert_eq!(sampler.offer(fix(t1), t1, &motion, &config, None), SamplingDecision::Deferred);

        let t2 = t0 + TimeDelta::seconds(120);
        assert!(matches!(
            sampler.offer(fix(t2), t2, &motion, &config, None),
            SamplingDecision::Captured(_)
        ));
    }

    #[test]
    fn test_in_flight_blocks_stream_capture() {
        let mut sampler = controller();
        let motion = MotionState::default();
        let config = EngineConfig::default();
        let t0 = Utc::now();
        sampler.offer(fix(t0), t0, &motion, &config, None);

        assert!(sampler.begin_forced_capture());
        assert!(!sampler.begin_forced_capture());

        let t1 = t0 + TimeDelta::seconds(30);
        let decision = sampler.offer(fix(t1), t1, &motion, &config, None);
        assert_eq!(decision, SamplingDecision::InFlight);

        let point = sampler.complete_forced_capture(Some(fix(t1)), t1, &motion, &config, None);
        assert!(point.is_some());
        assert_eq!(sampler.point_count(), 2);
        assert!(!sampler.capture_in_flight());
    }

    #[test]
    fn test_forced_capture_without_fix_releases_guard() {
        let mut sampler = controller();
        let now = Utc::now();
        assert!(sampler.begin_forced_capture());

        let point = sampler.complete_forced_capture(
            None,
            now,
            &MotionState::default(),
            &EngineConfig::default(),
            None,
        );

        assert!(point.is_none());
        assert!(!sampler.capture_in_flight());
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut sampler = controller();
        let now = Utc::now();

        // Completing without a claimed guard does nothing
        let point = sampler.complete_forced_capture(
            Some(fix(now)),
            now,
            &MotionState::default(),
            &EngineConfig::default(),
            None,
        );

        assert!(point.is_none());
        assert_eq!(sampler.point_count(), 0);
    }

    #[test]
    fn test_captured_at_never_goes_backwards() {
        let mut sampler = controller();
        let motion = MotionState::default();
        let config = EngineConfig::default();
        let t0 = Utc::now();
        sampler.offer(fix(t0), t0, &motion, &config, None);

        assert!(sampler.begin_forced_capture());
        let earlier = t0 - TimeDelta::seconds(30);
        // Not due relative to t0, so nothing is captured
        assert!(sampler
            .complete_forced_capture(Some(fix(earlier)), earlier, &motion, &config, None)
            .is_none());
        assert_eq!(sampler.last_capture_at(), Some(t0));
    }

    #[test]
    fn test_initial_point_count_is_continued() {
        let mut sampler = SamplingController::new(
            TrackingIdentity::new("s", "e"),
            DEFAULT_ACTIVE_CAPTURE_INTERVAL,
            41,
        );
        let now = Utc::now();
        sampler.offer(fix(now), now, &MotionState::default(), &EngineConfig::default(), None);
        assert_eq!(sampler.point_count(), 42);
    }
}
