//! Stream health monitoring and recovery scheduling.
//!
//! The OS can kill a location subscription without telling anyone: no error,
//! no close, just silence. The monitor watches the fix ledger and decides
//! when the subscription should be torn down and recreated.
//!
//! # Backoff
//!
//! Recovery attempts are unbounded, only their rate is capped:
//!
//! ```text
//! backoff = clamp(2^attempt_count, 1, 15) minutes
//! ```
//!
//! measured from the later of the last attempt and the start of the current
//! breach. Sustained silence therefore produces attempts at roughly +1, +3,
//! +7, +15, +30, +45 ... minutes. Any successful fix resets the count.
//!
//! # Startup
//!
//! A stream that never delivers anything is recovered once after
//! `no_fix_timeout` (30 s), bypassing the silence and grace gates.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::liveness::FixLedger;
use crate::time::since;

/// Default silence after which the stream is considered unhealthy.
pub const DEFAULT_UNHEALTHY_AFTER: Duration = Duration::from_secs(45);

/// Default time to wait for the very first fix before forcing a recovery.
pub const DEFAULT_NO_FIX_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on the backoff between recovery attempts.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(15 * 60);

/// Default escalation period, in attempts.
pub const DEFAULT_ESCALATE_EVERY: u32 = 5;

/// Configuration for the stream health monitor.
#[derive(Debug, Clone)]
pub struct StreamHealthConfig {
    /// Silence before the stream is considered unhealthy.
    pub unhealthy_after: Duration,

    /// Startup grace period, applied once at least one fix was received.
    pub startup_grace: Duration,

    /// Wait for the first fix before forcing the one-off startup recovery.
    pub no_fix_timeout: Duration,

    /// Upper bound of the backoff.
    pub max_backoff: Duration,

    /// Emit an escalation every N attempts (0 disables escalation).
    pub escalate_every: u32,
}

impl Default for StreamHealthConfig {
    fn default() -> Self {
        Self {
            unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
            startup_grace: super::gap::DEFAULT_STARTUP_GRACE,
            no_fix_timeout: DEFAULT_NO_FIX_TIMEOUT,
            max_backoff: DEFAULT_MAX_BACKOFF,
            escalate_every: DEFAULT_ESCALATE_EVERY,
        }
    }
}

/// Recovery bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryAttemptState {
    /// Attempts since the last successful fix.
    pub attempt_count: u32,
    /// Time of the most recent attempt. Survives fix resets.
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Why a recovery was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReason {
    /// No fix ever arrived after start.
    NeverStarted,
    /// The stream went silent.
    Silent,
    /// Requested by the host.
    Manual,
}

impl std::fmt::Display for RecoveryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryReason::NeverStarted => write!(f, "never started"),
            RecoveryReason::Silent => write!(f, "silent"),
            RecoveryReason::Manual => write!(f, "manual"),
        }
    }
}

/// Repeated failure signal, raised every `escalate_every` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryEscalation {
    pub attempts: u32,
    pub gap_minutes: u64,
}

/// A recovery the engine should perform now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPlan {
    pub attempt: u32,
    pub reason: RecoveryReason,
    pub escalation: Option<RecoveryEscalation>,
}

/// Result of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Stream is delivering, or alarms are suppressed.
    Healthy,
    /// Unhealthy, but the backoff gate is still closed.
    Waiting { retry_in: Duration },
    /// Recreate the subscription.
    Recover(RecoveryPlan),
}

/// Detects a silently dead stream and schedules recovery.
#[derive(Debug, Default)]
pub struct StreamHealthMonitor {
    config: StreamHealthConfig,
    attempts: RecoveryAttemptState,
    breach_started_at: Option<DateTime<Utc>>,
}

impl StreamHealthMonitor {
    pub fn new() -> Self {
        Self::with_config(StreamHealthConfig::default())
    }

    pub fn with_config(config: StreamHealthConfig) -> Self {
        Self {
            config,
            attempts: RecoveryAttemptState::default(),
            breach_started_at: None,
        }
    }

    pub fn attempts(&self) -> &RecoveryAttemptState {
        &self.attempts
    }

    /// True while recovery attempts are outstanding.
    pub fn is_recovering(&self) -> bool {
        self.attempts.attempt_count > 0
    }

    /// Backoff before the next attempt, given the attempts made so far.
    pub fn backoff_delay(&self, attempt_count: u32) -> Duration {
        backoff_delay(attempt_count, self.config.max_backoff)
    }

    /// Periodic check, run from the engine tick after the gap check.
    pub fn check(&mut self, now: DateTime<Utc>, ledger: &FixLedger) -> HealthVerdict {
        let uptime = ledger.uptime(now);

        if !ledger.has_fix()
            && self.attempts.last_attempt_at.is_none()
            && uptime > self.config.no_fix_timeout
        {
            tracing::warn!(
                uptime_secs = uptime.as_secs(),
                "No fix since start, forcing stream recovery"
            );
            return HealthVerdict::Recover(self.schedule(now, RecoveryReason::NeverStarted, uptime));
        }

        // Without any fix the whole uptime counts as silence
        let silence = ledger.since_last_fix(now).unwrap_or(uptime);
        if silence < self.config.unhealthy_after {
            self.breach_started_at = None;
            return HealthVerdict::Healthy;
        }

        if ledger.has_fix() && ledger.within_grace(now, self.config.startup_grace) {
            return HealthVerdict::Healthy;
        }

        let breach_started_at = *self.breach_started_at.get_or_insert(now);
        let gate = match self.attempts.last_attempt_at {
            Some(last) if last > breach_started_at => last,
            _ => breach_started_at,
        };
        let backoff = self.backoff_delay(self.attempts.attempt_count);
        let waited = since(now, gate);

        if waited < backoff {
            return HealthVerdict::Waiting {
                retry_in: backoff - waited,
            };
        }

        tracing::warn!(
            silent_secs = silence.as_secs(),
            attempt = self.attempts.attempt_count + 1,
            backoff_mins = backoff.as_secs() / 60,
            "Position stream silent, recreating subscription"
        );
        HealthVerdict::Recover(self.schedule(now, RecoveryReason::Silent, silence))
    }

    /// Clear the backoff gate and schedule one immediate recovery.
    pub fn force_recovery(&mut self, now: DateTime<Utc>, ledger: &FixLedger) -> RecoveryPlan {
        let silence = ledger
            .since_last_fix(now)
            .unwrap_or_else(|| ledger.uptime(now));
        tracing::info!(
            attempt = self.attempts.attempt_count + 1,
            "Manual stream recovery requested"
        );
        self.schedule(now, RecoveryReason::Manual, silence)
    }

    /// A live fix arrived; the stream is healthy again.
    pub fn on_fix(&mut self) {
        if self.attempts.attempt_count > 0 {
            tracing::info!(
                attempts = self.attempts.attempt_count,
                "Position stream recovered"
            );
        }
        self.attempts.attempt_count = 0;
        self.breach_started_at = None;
    }

    fn schedule(&mut self, now: DateTime<Utc>, reason: RecoveryReason, silence: Duration) -> RecoveryPlan {
        self.attempts.attempt_count = self.attempts.attempt_count.saturating_add(1);
        self.attempts.last_attempt_at = Some(now);

        let attempt = self.attempts.attempt_count;
        let escalation = (self.config.escalate_every > 0
            && attempt % self.config.escalate_every == 0)
            .then(|| RecoveryEscalation {
                attempts: attempt,
                gap_minutes: silence.as_secs() / 60,
            });

        if let Some(escalation) = &escalation {
            tracing::error!(
                attempts = escalation.attempts,
                gap_minutes = escalation.gap_minutes,
                "Stream recovery keeps failing"
            );
        }

        RecoveryPlan {
            attempt,
            reason,
            escalation,
        }
    }
}

/// `clamp(2^attempt_count, 1, max)` minutes.
pub fn backoff_delay(attempt_count: u32, max: Duration) -> Duration {
    let minutes = 1u64.checked_shl(attempt_count).unwrap_or(u64::MAX);
    let delay = Duration::from_secs(minutes.saturating_mul(60));
    delay.clamp(Duration::from_secs(60), max.max(Duration::from_secs(60)))
}
