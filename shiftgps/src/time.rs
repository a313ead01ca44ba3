//! Time-related utility functions.
//!
//! The engine reasons in wall-clock `DateTime<Utc>` values because every
//! timestamp it produces ends up on the wire. To keep those timestamps
//! monotonic (and testable under a paused tokio clock) the engine reads time
//! through an [`EngineClock`], which anchors wall-clock time to a
//! `tokio::time::Instant`.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Monotonic wall clock.
///
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Captures a `(Instant, DateTime<Utc>)` pair at construction and derives
/// every later reading from the elapsed monotonic time. System clock jumps
/// after construction are ignored, so readings never go backwards.
#[derive(Debug, Clone, Copy)]
pub struct EngineClock {
    anchor_instant: Instant,
    anchor_wall: DateTime<Utc>,
}

impl EngineClock {
    /// Anchor the clock at the current system time.
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchor the clock at a specific wall-clock time.
    pub fn anchored_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_instant: Instant::now(),
            anchor_wall: wall,
        }
    }

    /// Current wall-clock reading.
    pub fn now(&self) -> DateTime<Utc> {
        self.wall_at(self.elapsed())
    }

    /// Monotonic time since the anchor.
    pub fn elapsed(&self) -> Duration {
        self.anchor_instant.elapsed()
    }

    /// Monotonic instant at `offset` after the anchor.
    ///
    /// Saturates roughly thirty years out instead of overflowing.
    pub fn instant_at(&self, offset: Duration) -> Instant {
        self.anchor_instant
            .checked_add(offset)
            .unwrap_or_else(|| self.anchor_instant + FAR_FUTURE)
    }

    /// Wall-clock reading at `offset` after the anchor.
    pub fn wall_at(&self, offset: Duration) -> DateTime<Utc> {
        self.anchor_wall
            .checked_add_signed(to_delta(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Time elapsed from `earlier` to `now`, saturating at zero.
pub fn since(now: DateTime<Utc>, earlier: DateTime<Utc>) -> Duration {
    (now - earlier).to_std().unwrap_or(Duration::ZERO)
}

/// Convert a std duration to a chrono delta, saturating on overflow.
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_positive() {
        let earlier = Utc::now();
        let now = earlier + TimeDelta::seconds(90);
        assert_eq!(since(now, earlier), Duration::from_secs(90));
    }

    #[test]
    fn test_since_saturates_when_reversed() {
        let now = Utc::now();
        let later = now + TimeDelta::seconds(5);
        assert_eq!(since(now, later), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_paused_tokio_time() {
        let anchor = Utc::now();
        let clock = EngineClock::anchored_at(anchor);

        tokio::time::advance(Duration::from_secs(125)).await;

        assert_eq!(since(clock.now(), anchor), Duration::from_secs(125));
    }
}
