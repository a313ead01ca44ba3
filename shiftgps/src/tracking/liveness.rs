//! Fix ledger shared by the gap tracker and the stream health monitor.
//!
//! Both components ask the same questions ("when did the last live fix
//! arrive?", "are we still warming up?"), so the answers live in one place.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::time::since;

/// Record of successful live fixes since engine start.
#[derive(Debug, Clone)]
pub struct FixLedger {
    engine_started_at: DateTime<Utc>,
    last_fix_at: Option<DateTime<Utc>>,
    fixes_received: u64,
}

impl FixLedger {
    pub fn new(engine_started_at: DateTime<Utc>) -> Self {
        Self {
            engine_started_at,
            last_fix_at: None,
            fixes_received: 0,
        }
    }

    /// Record a successful live fix.
    pub fn record_fix(&mut self, now: DateTime<Utc>) {
        self.last_fix_at = Some(now);
        self.fixes_received += 1;
    }

    pub fn engine_started_at(&self) -> DateTime<Utc> {
        self.engine_started_at
    }

    pub fn last_fix_at(&self) -> Option<DateTime<Utc>> {
        self.last_fix_at
    }

    pub fn has_fix(&self) -> bool {
        self.last_fix_at.is_some()
    }

    pub fn fixes_received(&self) -> u64 {
        self.fixes_received
    }

    /// Time since engine start.
    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        since(now, self.engine_started_at)
    }

    /// Time since the last live fix, if any fix was ever received.
    pub fn since_last_fix(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_fix_at.map(|at| since(now, at))
    }

    /// True while `now` is inside the startup grace window.
    pub fn within_grace(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        self.uptime(now) < grace
    }
}
