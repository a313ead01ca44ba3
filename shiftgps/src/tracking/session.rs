//! Tracking session - the engine's state, free of I/O.
//!
//! [`TrackingSession`] owns every piece of mutable engine state and reacts to
//! the three things that can happen to a running engine: a fix (or error)
//! from the stream, a tick, and a host command. Each reaction queues
//! outbound events and, when something changed, a new status text. The
//! async [`Engine`](super::engine::Engine) drains both after every step.
//!
//! Keeping this synchronous means every scenario (GPS loss, recovery
//! backoff, force capture) can be driven with plain timestamps in tests.
//!
//! # Tick Order
//!
//! 1. heartbeat
//! 2. status refresh
//! 3. gap check
//! 4. stream health check
//! 5. force-capture check

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::config::{ConfigRejection, EngineConfig};
use super::fallback::ForceCaptureFallback;
use super::gap::{GapCheck, GapTracker, GapTrackerConfig};
use super::health::{HealthVerdict, RecoveryPlan, StreamHealthConfig, StreamHealthMonitor};
use super::liveness::FixLedger;
use super::motion::{MotionStateTracker, MotionTrackerConfig};
use super::position::{RawPosition, TrackingIdentity};
use super::sampling::{SamplingController, SamplingDecision, DEFAULT_ACTIVE_CAPTURE_INTERVAL};
use super::source::{PositionError, SourceError};
use super::status::{gps_lost_status, tracking_status, StatusSnapshot};
use crate::notify::StatusText;
use crate::protocol::{DiagnosticCategory, EngineCommand, EngineEvent, ProtocolError, Severity};
use crate::time::since;

/// Tuning for the session's components.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub motion: MotionTrackerConfig,
    pub gap: GapTrackerConfig,
    pub health: StreamHealthConfig,
    /// Capture interval while moving (before the thermal multiplier).
    pub active_capture_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            motion: MotionTrackerConfig::default(),
            gap: GapTrackerConfig::default(),
            health: StreamHealthConfig::default(),
            active_capture_interval: DEFAULT_ACTIVE_CAPTURE_INTERVAL,
        }
    }
}

/// What the engine must do after a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Recreate the subscription.
    pub recovery: Option<RecoveryPlan>,
    /// Start a cached-fix query. The capture path is already claimed.
    pub force_capture: bool,
}

/// All mutable engine state.
#[derive(Debug)]
pub struct TrackingSession {
    config: EngineConfig,
    motion: MotionStateTracker,
    sampler: SamplingController,
    ledger: FixLedger,
    gap: GapTracker,
    health: StreamHealthMonitor,
    fallback: ForceCaptureFallback,
    activity: Option<String>,
    tracking_since: DateTime<Utc>,
    outbox: Vec<EngineEvent>,
    status: Option<StatusText>,
}

impl TrackingSession {
    /// Create a session.
    ///
    /// `tracking_since` is the shift clock-in time used for the elapsed
    /// display; it defaults to `started_at`.
    pub fn new(
        identity: TrackingIdentity,
        config: EngineConfig,
        settings: &SessionSettings,
        started_at: DateTime<Utc>,
        tracking_since: Option<DateTime<Utc>>,
        initial_point_count: u64,
    ) -> Self {
        Self {
            config,
            motion: MotionStateTracker::with_config(settings.motion.clone()),
            sampler: SamplingController::new(
                identity,
                settings.active_capture_interval,
                initial_point_count,
            ),
            ledger: FixLedger::new(started_at),
            gap: GapTracker::with_config(settings.gap.clone()),
            health: StreamHealthMonitor::with_config(settings.health.clone()),
            fallback: ForceCaptureFallback::new(),
            activity: None,
            tracking_since: tracking_since.unwrap_or(started_at),
            outbox: Vec::new(),
            status: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn identity(&self) -> &TrackingIdentity {
        self.sampler.identity()
    }

    pub fn point_count(&self) -> u64 {
        self.sampler.point_count()
    }

    pub fn is_stationary(&self) -> bool {
        self.motion.is_stationary()
    }

    pub fn last_capture_at(&self) -> Option<DateTime<Utc>> {
        self.sampler.last_capture_at()
    }

    pub fn activity(&self) -> Option<&str> {
        self.activity.as_deref()
    }

    pub fn is_gps_lost(&self) -> bool {
        self.gap.is_lost()
    }

    pub fn is_recovering(&self) -> bool {
        self.health.is_recovering()
    }

    pub fn capture_in_flight(&self) -> bool {
        self.sampler.capture_in_flight()
    }

    pub fn fallback(&self) -> &ForceCaptureFallback {
        &self.fallback
    }

    /// Take the events queued since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Take the latest status text, if it changed since the last call.
    pub fn take_status(&mut self) -> Option<StatusText> {
        self.status.take()
    }

    /// A live fix from the stream (or the startup one-shot).
    pub fn on_fix(&mut self, position: RawPosition, now: DateTime<Utc>) {
        self.ledger.record_fix(now);
        self.health.on_fix();

        if let Some(restored) = self.gap.on_fix(now) {
            self.outbox.push(EngineEvent::GpsRestored {
                gap_started_at: restored.gap_started_at,
                gap_ended_at: restored.gap_ended_at,
                gap_duration_seconds: restored.gap_duration_seconds,
            });
            self.refresh_status(now);
        }

        self.motion.update(&position, now);

        let decision = self.sampler.offer(
            position,
            now,
            self.motion.state(),
            &self.config,
            self.activity.as_deref(),
        );
        if let SamplingDecision::Captured(point) = decision {
            self.outbox.push(EngineEvent::Position { point });
            self.refresh_status(now);
        }
    }

    /// An error payload from the stream. Non-fatal.
    pub fn on_position_error(&mut self, error: &PositionError) {
        tracing::warn!(error = %error, "Position stream delivered an error");
        self.outbox.push(EngineEvent::diagnostic(
            Severity::Warning,
            DiagnosticCategory::Position,
            error.to_string(),
            None,
        ));
    }

    /// The source closed the subscription from its side.
    pub fn on_subscription_closed(&mut self, subscription_id: u32) {
        tracing::warn!(subscription = subscription_id, "Location subscription closed by source");
        self.outbox.push(EngineEvent::diagnostic(
            Severity::Warning,
            DiagnosticCategory::Stream,
            "Location subscription closed by source",
            Some(json!({ "subscription": subscription_id })),
        ));
    }

    /// The repeating health tick.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        self.outbox.push(EngineEvent::Heartbeat {
            timestamp: now,
            point_count: self.sampler.point_count(),
            is_stationary: self.motion.is_stationary(),
            last_capture: self.sampler.last_capture_at(),
        });
        self.refresh_status(now);

        match self.gap.check(now, &self.ledger) {
            GapCheck::Ok => {}
            GapCheck::Lost { gap_started_at } => {
                self.outbox.push(EngineEvent::GpsLost { gap_started_at });
                self.status = Some(gps_lost_status(since(now, gap_started_at)));
            }
            GapCheck::StillLost { lost_for } => {
                self.status = Some(gps_lost_status(lost_for));
            }
        }

        let recovery = match self.health.check(now, &self.ledger) {
            HealthVerdict::Recover(plan) => Some(plan),
            HealthVerdict::Waiting { retry_in } => {
                tracing::debug!(retry_in_secs = retry_in.as_secs(), "Stream unhealthy, backing off");
                None
            }
            HealthVerdict::Healthy => None,
        };

        let force_capture =
            self.fallback
                .tick(now, &mut self.sampler, self.motion.state(), &self.config);

        TickOutcome {
            recovery,
            force_capture,
        }
    }

    /// A decoded host command. Returns a recovery to perform, if any.
    pub fn on_command(&mut self, command: EngineCommand, now: DateTime<Utc>) -> Option<RecoveryPlan> {
        tracing::debug!(command = command.name(), "Command received");
        match command {
            EngineCommand::UpdateConfig(update) => {
                let rejected = self.config.apply(&update);
                self.report_rejections(&rejected);
                tracing::info!(
                    active_secs = self.config.active_interval_seconds,
                    stationary_secs = self.config.stationary_interval_seconds,
                    distance_filter_m = self.config.distance_filter_meters,
                    thermal = self.config.thermal_multiplier,
                    rejected = rejected.len(),
                    "Capture configuration updated"
                );
                None
            }
            EngineCommand::RecoverStream => Some(self.health.force_recovery(now, &self.ledger)),
            EngineCommand::GetStatus => {
                self.outbox.push(EngineEvent::Status {
                    is_tracking: true,
                    point_count: self.sampler.point_count(),
                    is_stationary: self.motion.is_stationary(),
                    last_capture: self.sampler.last_capture_at(),
                });
                None
            }
            EngineCommand::ActivityUpdate { activity } => {
                self.activity = activity;
                None
            }
        }
    }

    /// An inbound message that could not be decoded.
    pub fn on_undecodable(&mut self, error: &ProtocolError, raw: &str) {
        tracing::warn!(error = %error, "Ignoring undecodable command");
        self.outbox.push(EngineEvent::diagnostic(
            Severity::Warning,
            DiagnosticCategory::Protocol,
            error.to_string(),
            Some(json!({ "raw": raw })),
        ));
    }

    /// Report config values that were refused.
    pub fn report_rejections(&mut self, rejected: &[ConfigRejection]) {
        for rejection in rejected {
            tracing::warn!(
                field = rejection.field,
                value = %rejection.value,
                reason = rejection.reason,
                "Rejected config value"
            );
            self.outbox.push(EngineEvent::diagnostic(
                Severity::Warning,
                DiagnosticCategory::Config,
                format!("{} {}", rejection.field, rejection.reason),
                Some(json!({ "field": rejection.field, "value": rejection.value })),
            ));
        }
    }

    /// Record the outcome of recreating the subscription.
    pub fn record_recovery(&mut self, plan: RecoveryPlan, result: Result<(), SourceError>) {
        match result {
            Ok(()) => {
                tracing::info!(attempt = plan.attempt, reason = %plan.reason, "Subscription recreated");
                self.outbox.push(EngineEvent::StreamRecovered {
                    attempt: plan.attempt,
                });
            }
            Err(e) => {
                tracing::warn!(attempt = plan.attempt, error = %e, "Failed to recreate subscription");
                self.outbox.push(EngineEvent::diagnostic(
                    Severity::Error,
                    DiagnosticCategory::Stream,
                    e.to_string(),
                    Some(json!({ "attempt": plan.attempt })),
                ));
            }
        }

        if let Some(escalation) = plan.escalation {
            self.outbox.push(EngineEvent::StreamRecoveryFailing {
                attempts: escalation.attempts,
                gap_minutes: escalation.gap_minutes,
            });
        }
    }

    /// Finish a forced capture with the result of the cache query.
    pub fn complete_force_capture(
        &mut self,
        cached: Result<Option<RawPosition>, SourceError>,
        now: DateTime<Utc>,
    ) {
        let resolved = self.fallback.resolve(cached, self.sampler.last_position());
        let origin = resolved.as_ref().map(|(_, origin)| *origin);

        let point = self.sampler.complete_forced_capture(
            resolved.map(|(position, _)| position),
            now,
            self.motion.state(),
            &self.config,
            self.activity.as_deref(),
        );

        if let Some(point) = point {
            tracing::debug!(origin = ?origin, point_id = %point.id, "Forced capture");
            self.outbox.push(EngineEvent::Position { point });
            self.refresh_status(now);
        }
    }

    /// Queue the final `stopped` event.
    pub fn stop(&mut self, is_timeout: bool) {
        self.outbox.push(EngineEvent::Stopped {
            point_count: self.sampler.point_count(),
            is_timeout,
        });
    }

    fn refresh_status(&mut self, now: DateTime<Utc>) {
        let snapshot = StatusSnapshot {
            tracking_since: self.tracking_since,
            point_count: self.sampler.point_count(),
            last_capture: self.sampler.last_capture_at(),
            speed: self.sampler.last_speed(),
            is_stationary: self.motion.is_stationary(),
        };
        self.status = Some(tracking_status(&snapshot, now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::config::ConfigUpdate;
    use crate::tracking::geo::offset_north;
    use chrono::{TimeDelta, TimeZone};

    const ORIGIN: (f64, f64) = (48.1371, 11.5754);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn at(s: i64) -> DateTime<Utc> {
        t0() + TimeDelta::seconds(s)
    }

    fn session() -> TrackingSession {
        TrackingSession::new(
            TrackingIdentity::new("shift-1", "emp-1"),
            EngineConfig::default(),
            &SessionSettings::default(),
            t0(),
            None,
            0,
        )
    }

    fn fix(coords: (f64, f64), s: i64) -> RawPosition {
        RawPosition::new(coords.0, coords.1, 5.0, at(s))
    }

    fn kinds(events: &[EngineEvent]) -> Vec<&'static str> {
        events.iter().map(EngineEvent::kind).collect()
    }

    #[test]
    fn test_first_fix_emits_position_and_status() {
        let mut session = session();
        session.on_fix(fix(ORIGIN, 1), at(1));

        let events = session.drain_events();
        assert_eq!(kinds(&events), vec!["position"]);
        assert!(session.take_status().unwrap().body.contains("1 point"));
        assert!(session.take_status().is_none());
    }

    #[test]
    fn test_vehicle_trace_moving_then_stationary() {
        let mut session = session();
        let stop = offset_north(ORIGIN, 15.0 * 600.0);
        let mut captures = Vec::new();
        let mut heartbeats = Vec::new();

        for s in 0..1200i64 {
            let coords = if s < 600 {
                offset_north(ORIGIN, 15.0 * s as f64)
            } else {
                // GPS jitter around the stop
                offset_north(stop, if s % 2 == 0 { 2.0 } else { -1.0 })
            };
            session.on_fix(fix(coords, s), at(s));
            if s > 0 && s % 30 == 0 {
                let outcome = session.on_tick(at(s));
                assert_eq!(outcome, TickOutcome::default());
            }

            for event in session.drain_events() {
                match event {
                    EngineEvent::Position { point } => {
                        captures.push((point.captured_at - t0()).num_seconds())
                    }
                    EngineEvent::Heartbeat { is_stationary, .. } => heartbeats.push((s, is_stationary)),
                    other => panic!("unexpected event {:?}", other),
                }
            }
        }

        // Every 10 s while moving and until the dwell is confirmed at 600 + 300 s,
        // then every 120 s from the last capture.
        let mut expected: Vec<i64> = (0..=890).step_by(10).collect();
        expected.extend([1010, 1130]);
        assert_eq!(captures, expected);

        let first_stationary = heartbeats.iter().find(|(_, st)| *st).map(|(s, _)| *s);
        assert_eq!(first_stationary, Some(900));
        assert_eq!(heartbeats.len(), 39);
    }

    #[test]
    fn test_gap_lost_and_restored_once() {
        let mut session = session();
        session.on_fix(fix(ORIGIN, 70), at(70));
        session.drain_events();

        let mut lost = 0;
        for s in (90..=240).step_by(30) {
            session.on_tick(at(s));
            lost += session
                .drain_events()
                .iter()
                .filter(|e| e.kind() == "gps_lost")
                .count();
        }
        assert_eq!(lost, 1);
        assert!(session.is_gps_lost());
        assert_eq!(session.take_status().unwrap().title, "GPS signal lost");

        session.on_fix(fix(ORIGIN, 250), at(250));
        session.on_fix(fix(ORIGIN, 251), at(251));
        let events = session.drain_events();
        let restored: Vec<_> = events.iter().filter(|e| e.kind() == "gps_restored").collect();
        assert_eq!(restored.len(), 1);
        assert_eq!(
            restored[0],
            &EngineEvent::GpsRestored {
                gap_started_at: Some(at(70)),
                gap_ended_at: at(250),
                gap_duration_seconds: Some(180),
            }
        );
        assert!(!session.is_gps_lost());
    }

    #[test]
    fn test_restore_resets_recovery_attempts() {
        let mut session = session();
        session.on_fix(fix(ORIGIN, 70), at(70));

        let plan = session
            .on_command(EngineCommand::RecoverStream, at(200))
            .unwrap();
        session.record_recovery(plan, Ok(()));
        assert!(session.is_recovering());

        session.on_fix(fix(ORIGIN, 210), at(210));
        assert!(!session.is_recovering());
    }

    #[test]
    fn test_update_config_rejects_invalid_fields() {
        let mut session = session();
        let update = ConfigUpdate {
            thermal_multiplier: Some(0.2),
            stationary_interval_seconds: Some(300),
            ..Default::default()
        };

        assert!(session.on_command(EngineCommand::UpdateConfig(update), at(1)).is_none());

        assert_eq!(session.config().stationary_interval_seconds, 300);
        assert_eq!(session.config().thermal_multiplier, 1.0);
        match &session.drain_events()[..] {
            [EngineEvent::Diagnostic { category, severity, .. }] => {
                assert_eq!(*category, DiagnosticCategory::Config);
                assert_eq!(*severity, Severity::Warning);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_huge_thermal_multiplier_is_refused_and_sampling_continues() {
        let mut session = session();
        session.on_fix(fix(ORIGIN, 1), at(1));
        session.drain_events();

        let update = ConfigUpdate {
            thermal_multiplier: Some(1e20),
            ..Default::default()
        };
        session.on_command(EngineCommand::UpdateConfig(update), at(2));
        assert_eq!(session.config().thermal_multiplier, 1.0);
        assert_eq!(kinds(&session.drain_events()), vec!["diagnostic"]);

        session.on_fix(fix(ORIGIN, 11), at(11));
        assert_eq!(kinds(&session.drain_events()), vec!["position"]);
        assert_eq!(session.point_count(), 2);
    }

    #[test]
    fn test_get_status_snapshot() {
        let mut session = session();
        session.on_fix(fix(ORIGIN, 5), at(5));
        session.drain_events();

        session.on_command(EngineCommand::GetStatus, at(6));

        assert_eq!(
            session.drain_events(),
            vec![EngineEvent::Status {
                is_tracking: true,
                point_count: 1,
                is_stationary: false,
                last_capture: Some(at(5)),
            }]
        );
    }

    #[test]
    fn test_activity_copied_into_points_only() {
        let mut session = session();
        session.on_command(
            EngineCommand::ActivityUpdate {
                activity: Some("in_vehicle".to_string()),
            },
            at(0),
        );
        session.on_fix(fix(ORIGIN, 1), at(1));

        match &session.drain_events()[..] {
            [EngineEvent::Position { point }] => {
                assert_eq!(point.activity.as_deref(), Some("in_vehicle"))
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(session.activity(), Some("in_vehicle"));
    }

    #[test]
    fn test_force_capture_uses_cache_when_stream_stalls() {
        let mut session = session();
        session.on_fix(fix(ORIGIN, 1), at(1));
        session.drain_events();

        let outcome = session.on_tick(at(30));
        assert!(outcome.force_capture);
        assert!(session.capture_in_flight());

        // Stream fix during the query is only remembered
        session.on_fix(fix(ORIGIN, 31), at(31));
        assert!(session
            .drain_events()
            .iter()
            .all(|e| e.kind() != "position"));

        let cached = fix(offset_north(ORIGIN, 1.0), 29);
        session.complete_force_capture(Ok(Some(cached)), at(32));

        match &session.drain_events()[..] {
            [EngineEvent::Position { point }] => {
                assert_eq!(point.captured_at, at(32));
                assert_eq!(point.timestamp, at(29));
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(session.fallback().stats().from_cache, 1);
        assert!(!session.capture_in_flight());
    }

    #[test]
    fn test_recovery_escalation_events() {
        let mut session = session();
        session.on_fix(fix(ORIGIN, 70), at(70));
        session.drain_events();

        for _ in 0..5 {
            let plan = session
                .on_command(EngineCommand::RecoverStream, at(1900))
                .unwrap();
            session.record_recovery(plan, Ok(()));
        }

        let events = session.drain_events();
        assert_eq!(
            events.last(),
            Some(&EngineEvent::StreamRecoveryFailing {
                attempts: 5,
                gap_minutes: 30,
            })
        );
        assert_eq!(
            events.iter().filter(|e| e.kind() == "stream_recovered").count(),
            5
        );
    }

    #[test]
    fn test_failed_recovery_reports_diagnostic() {
        let mut session = session();
        let plan = session
            .on_command(EngineCommand::RecoverStream, at(10))
            .unwrap();

        session.record_recovery(plan, Err(SourceError::SubscribeFailed("denied".to_string())));

        match &session.drain_events()[..] {
            [EngineEvent::Diagnostic { severity, category, .. }] => {
                assert_eq!(*severity, Severity::Error);
                assert_eq!(*category, DiagnosticCategory::Stream);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_stop_reports_point_count() {
        let mut session = TrackingSession::new(
            TrackingIdentity::new("shift-1", "emp-1"),
            EngineConfig::default(),
            &SessionSettings::default(),
            t0(),
            None,
            40,
        );
        session.on_fix(fix(ORIGIN, 1), at(1));
        session.drain_events();

        session.stop(true);
        assert_eq!(
            session.drain_events(),
            vec![EngineEvent::Stopped {
                point_count: 41,
                is_timeout: true
            }]
        );
    }
}
