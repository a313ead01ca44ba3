//! GPS gap tracking - "no successful fix for too long".
//!
//! A gap window opens when no live fix has arrived for `lost_after` (45 s)
//! and closes on the next live fix. At most one window is open at a time,
//! and each window produces exactly one loss and one restore notification.
//!
//! Alarms are suppressed during the startup grace period so the stream has
//! time to warm up.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::liveness::FixLedger;
use crate::time::since;

/// Default silence before GPS is reported lost.
pub const DEFAULT_GPS_LOST_AFTER: Duration = Duration::from_secs(45);

/// Default startup grace period.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(60);

/// Configuration for the gap tracker.
#[derive(Debug, Clone)]
pub struct GapTrackerConfig {
    /// Silence before the signal is declared lost.
    pub lost_after: Duration,

    /// Window after start during which loss is not reported.
    pub startup_grace: Duration,
}

impl Default for GapTrackerConfig {
    fn default() -> Self {
        Self {
            lost_after: DEFAULT_GPS_LOST_AFTER,
            startup_grace: DEFAULT_STARTUP_GRACE,
        }
    }
}

/// A single GPS loss episode.
#[derive(Debug, Clone, PartialEq)]
pub struct GapWindow {
    /// Time of the last successful fix before the loss.
    pub gap_started_at: DateTime<Utc>,
    /// Whether the loss has been announced.
    pub notified: bool,
    /// Time of the fix that ended the gap.
    pub gap_ended_at: Option<DateTime<Utc>>,
}

/// Result of a periodic gap check.
#[derive(Debug, Clone, PartialEq)]
pub enum GapCheck {
    /// Signal is fine, or it is too early to tell.
    Ok,
    /// A gap window just opened.
    Lost { gap_started_at: DateTime<Utc> },
    /// Still inside an announced gap.
    StillLost { lost_for: Duration },
}

/// A closed gap window.
#[derive(Debug, Clone, PartialEq)]
pub struct GapRestored {
    pub gap_started_at: Option<DateTime<Utc>>,
    pub gap_ended_at: DateTime<Utc>,
    pub gap_duration_seconds: Option<i64>,
}

/// Detects and tracks GPS loss episodes.
#[derive(Debug, Default)]
pub struct GapTracker {
    config: GapTrackerConfig,
    window: Option<GapWindow>,
}

impl GapTracker {
    pub fn new() -> Self {
        Self::with_config(GapTrackerConfig::default())
    }

    pub fn with_config(config: GapTrackerConfig) -> Self {
        Self {
            config,
            window: None,
        }
    }

    /// The open gap window, if any.
    pub fn open_window(&self) -> Option<&GapWindow> {
        self.window.as_ref()
    }

    pub fn is_lost(&self) -> bool {
        self.window.as_ref().is_some_and(|w| w.notified)
    }

    /// Periodic check, run from the engine tick.
    pub fn check(&mut self, now: DateTime<Utc>, ledger: &FixLedger) -> GapCheck {
        let Some(last_fix_at) = ledger.last_fix_at() else {
            // Still initializing
            return GapCheck::Ok;
        };

        if ledger.within_grace(now, self.config.startup_grace) {
            return GapCheck::Ok;
        }

        if let Some(window) = self.window.as_ref().filter(|w| w.notified) {
            return GapCheck::StillLost {
                lost_for: since(now, window.gap_started_at),
            };
        }

        let elapsed = since(now, last_fix_at);
        if elapsed >= self.config.lost_after {
            self.window = Some(GapWindow {
                gap_started_at: last_fix_at,
                notified: true,
                gap_ended_at: None,
            });
            tracing::warn!(
                silent_secs = elapsed.as_secs(),
                gap_started_at = %last_fix_at,
                "GPS signal lost"
            );
            return GapCheck::Lost {
                gap_started_at: last_fix_at,
            };
        }

        GapCheck::Ok
    }

    /// Close the open window on a successful live fix.
    pub fn on_fix(&mut self, now: DateTime<Utc>) -> Option<GapRestored> {
        let mut window = self.window.take().filter(|w| w.notified)?;
        window.gap_ended_at = Some(now);

        let duration = (now - window.gap_started_at).num_milliseconds() as f64 / 1000.0;
        let restored = GapRestored {
            gap_started_at: Some(window.gap_started_at),
            gap_ended_at: now,
            gap_duration_seconds: Some(duration.round() as i64),
        };

        tracing::info!(
            gap_secs = restored.gap_duration_seconds,
            "GPS signal restored"
        );
        Some(restored)
    }
}
