//! Replay source - plays back a recorded location trace.
//!
//! A trace is JSON lines, one entry per line:
//!
//! ```text
//! {"at_secs": 0.0, "fix": {"latitude": 52.52, "longitude": 13.405, "accuracy": 8.0}}
//! {"at_secs": 12.5, "error": "services_disabled"}
//! ```
//!
//! `at_secs` is the offset from the moment the source was created. The
//! timeline keeps running whether or not anyone is subscribed, so a
//! subscription opened at t=90s starts with the first entry due at or after
//! 90s. Entries missed while unsubscribed are lost, as they would be on a
//! device.
//!
//! When the trace runs out the stream stays open but silent, which is how a
//! dead OS stream looks from the inside.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::{PositionError, SourceError};
use super::platform::LocationSettings;
use super::{PositionSource, SourceUpdate, Subscription};
use crate::time::EngineClock;
use crate::tracking::position::RawPosition;

/// A fix as written in a trace. The timestamp comes from the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFix {
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
    #[serde(default)]
    pub is_mocked: bool,
}

impl TraceFix {
    pub fn to_position(&self, timestamp: DateTime<Utc>) -> RawPosition {
        RawPosition {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            speed: self.speed,
            speed_accuracy: self.speed_accuracy,
            heading: self.heading,
            heading_accuracy: self.heading_accuracy,
            altitude: self.altitude,
            altitude_accuracy: self.altitude_accuracy,
            timestamp,
            is_mocked: self.is_mocked,
        }
    }
}

/// One line of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Seconds after source creation.
    pub at_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<TraceFix>,
    /// Error code delivered instead of a fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceEntry {
    pub fn fix(at_secs: f64, fix: TraceFix) -> Self {
        Self {
            at_secs,
            fix: Some(fix),
            error: None,
        }
    }

    pub fn error(at_secs: f64, code: impl Into<String>) -> Self {
        Self {
            at_secs,
            fix: None,
            error: Some(code.into()),
        }
    }

    /// Offset from the replay start. Entries are checked by [`check_offset`]
    /// before a source accepts them.
    fn offset(&self) -> Duration {
        Duration::try_from_secs_f64(self.at_secs).unwrap_or(Duration::ZERO)
    }

    fn update(&self, timestamp: DateTime<Utc>) -> SourceUpdate {
        match (&self.fix, &self.error) {
            (Some(fix), _) => Ok(fix.to_position(timestamp)),
            (None, Some(code)) => Err(PositionError::from_code(code)),
            (None, None) => Err(PositionError::Unavailable("empty trace entry".to_string())),
        }
    }
}

/// Position source backed by a recorded trace.
#[derive(Debug)]
pub struct ReplaySource {
    entries: Arc<Vec<TraceEntry>>,
    clock: EngineClock,
    subscriptions: AtomicU32,
}

impl ReplaySource {
    /// Create a source whose timeline starts now.
    pub fn new(entries: Vec<TraceEntry>) -> Result<Self, SourceError> {
        Self::with_clock(entries, EngineClock::new())
    }

    /// Create a source on an existing clock.
    pub fn with_clock(entries: Vec<TraceEntry>, clock: EngineClock) -> Result<Self, SourceError> {
        validate(&entries)?;
        Ok(Self {
            entries: Arc::new(entries),
            clock,
            subscriptions: AtomicU32::new(0),
        })
    }

    /// Load a trace file.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Self::new(parse_trace(BufReader::new(file))?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of subscriptions opened so far.
    pub fn subscription_count(&self) -> u32 {
        self.subscriptions.load(Ordering::Relaxed)
    }

    /// Index of the first entry due at or after `offset`.
    fn first_pending(&self, offset: Duration) -> usize {
        self.entries.partition_point(|e| e.offset() < offset)
    }
}

impl PositionSource for ReplaySource {
    fn subscribe(&self, _settings: &LocationSettings) -> Result<Subscription, SourceError> {
        let id = self.subscriptions.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, subscription) = Subscription::channel(id);
        let start = self.first_pending(self.clock.elapsed());

        tracing::debug!(
            subscription = id,
            remaining = self.entries.len() - start,
            "Replay subscription opened"
        );

        tokio::spawn(emit(Arc::clone(&self.entries), start, self.clock, tx));
        Ok(subscription)
    }

    async fn current_position(
        &self,
        _settings: &LocationSettings,
        timeout: Duration,
    ) -> Result<RawPosition, SourceError> {
        let now = self.clock.elapsed();
        let next = self.entries[self.first_pending(now)..]
            .iter()
            .find_map(|e| e.fix.as_ref().map(|fix| (e.offset(), fix)));

        match next {
            Some((offset, fix)) if offset <= now + timeout => {
                tokio::time::sleep_until(self.clock.instant_at(offset)).await;
                Ok(fix.to_position(self.clock.wall_at(offset)))
            }
            _ => {
                tokio::time::sleep(timeout).await;
                Err(SourceError::Timeout(timeout))
            }
        }
    }

    async fn last_known_position(&self) -> Result<Option<RawPosition>, SourceError> {
        let now = self.clock.elapsed();
        let passed = self.entries.partition_point(|e| e.offset() <= now);

        Ok(self.entries[..passed].iter().rev().find_map(|e| {
            e.fix
                .as_ref()
                .map(|fix| fix.to_position(self.clock.wall_at(e.offset())))
        }))
    }
}

async fn emit(
    entries: Arc<Vec<TraceEntry>>,
    start: usize,
    clock: EngineClock,
    tx: mpsc::Sender<SourceUpdate>,
) {
    for entry in entries[start..].iter() {
        let offset = entry.offset();
        tokio::select! {
            _ = tokio::time::sleep_until(clock.instant_at(offset)) => {}
            _ = tx.closed() => return,
        }
        if tx.send(entry.update(clock.wall_at(offset))).await.is_err() {
            return;
        }
    }

    // Trace exhausted: stay open and silent until cancelled
    tx.closed().await;
}

/// Parse a JSON-lines trace. Blank lines and `#` comments are skipped.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceEntry>, SourceError> {
    let mut entries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let entry: TraceEntry =
            serde_json::from_str(trimmed).map_err(|e| SourceError::InvalidTrace {
                line: index + 1,
                reason: e.to_string(),
            })?;
        check_offset(entry.at_secs).map_err(|reason| SourceError::InvalidTrace {
            line: index + 1,
            reason: reason.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Longest trace offset accepted (30 days).
pub const MAX_TRACE_OFFSET: Duration = Duration::from_secs(30 * 86_400);

fn check_offset(at_secs: f64) -> Result<Duration, &'static str> {
    match Duration::try_from_secs_f64(at_secs) {
        Ok(offset) if offset <= MAX_TRACE_OFFSET => Ok(offset),
        Ok(_) => Err("at_secs exceeds the 30 day trace limit"),
        Err(_) => Err("at_secs must be a non-negative number"),
    }
}

fn validate(entries: &[TraceEntry]) -> Result<(), SourceError> {
    let mut previous = 0.0;
    for (index, entry) in entries.iter().enumerate() {
        let invalid = |reason: &str| SourceError::InvalidTrace {
            line: index + 1,
            reason: reason.to_string(),
        };
        check_offset(entry.at_secs).map_err(invalid)?;
        if entry.at_secs < previous {
            return Err(invalid("entries must be in time order"));
        }
        if entry.fix.is_some() == entry.error.is_some() {
            return Err(invalid("entry needs exactly one of fix or error"));
        }
        previous = entry.at_secs;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::config::EngineConfig;
    use crate::tracking::source::platform::{AndroidStrategy, LocationStrategy};

    fn fix(lat: f64) -> TraceFix {
        TraceFix {
            latitude: lat,
            longitude: 13.405,
            accuracy: 5.0,
            speed: None,
            speed_accuracy: None,
            heading: None,
            heading_accuracy: None,
            altitude: None,
            altitude_accuracy: None,
            is_mocked: false,
        }
    }

    fn settings() -> LocationSettings {
        AndroidStrategy.settings(&EngineConfig::default())
    }

    #[test]
    fn test_parse_trace() {
        let trace = r#"
# warm up
{"at_secs": 0.0, "fix": {"latitude": 52.52, "longitude": 13.405, "accuracy": 8.0}}

{"at_secs": 12.5, "error": "services_disabled"}
{"at_secs": 20, "fix": {"latitude": 52.53, "longitude": 13.405, "accuracy": 8.0, "altitude": 0.0}}
"#;
        let entries = parse_trace(trace.as_bytes()).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].error.as_deref(), Some("services_disabled"));
        // Sea-level altitude survives
        assert_eq!(entries[2].fix.as_ref().unwrap().altitude, Some(0.0));
    }

    #[test]
    fn test_parse_trace_reports_line() {
        let trace = "{\"at_secs\": 0.0, \"fix\": {\"latitude\": 1.0, \"longitude\": 2.0, \"accuracy\": 3.0}}\nnot json\n";
        match parse_trace(trace.as_bytes()) {
            Err(SourceError::InvalidTrace { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected InvalidTrace, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_trace_rejects_unrepresentable_offset() {
        let trace = "{\"at_secs\": 1.0, \"fix\": {\"latitude\": 1.0, \"longitude\": 2.0, \"accuracy\": 3.0}}\n{\"at_secs\": 1e30, \"fix\": {\"latitude\": 1.0, \"longitude\": 2.0, \"accuracy\": 3.0}}\n";
        match parse_trace(trace.as_bytes()) {
            Err(SourceError::InvalidTrace { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("30 day"));
            }
            other => panic!("expected InvalidTrace, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_negative_and_oversized_offsets() {
        let negative = vec![TraceEntry::fix(-1.0, fix(1.0))];
        assert!(matches!(
            ReplaySource::new(negative),
            Err(SourceError::InvalidTrace { line: 1, .. })
        ));

        let huge = vec![TraceEntry::fix(0.0, fix(1.0)), TraceEntry::fix(1e30, fix(2.0))];
        assert!(matches!(
            ReplaySource::new(huge),
            Err(SourceError::InvalidTrace { line: 2, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_order() {
        let entries = vec![TraceEntry::fix(10.0, fix(1.0)), TraceEntry::fix(5.0, fix(2.0))];
        assert!(matches!(
            ReplaySource::new(entries),
            Err(SourceError::InvalidTrace { line: 2, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_entry() {
        let entries = vec![TraceEntry {
            at_secs: 1.0,
            fix: None,
            error: None,
        }];
        assert!(ReplaySource::new(entries).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_replays_on_timeline() {
        let source = ReplaySource::new(vec![
            TraceEntry::fix(1.0, fix(1.0)),
            TraceEntry::error(2.0, "tunnel"),
            TraceEntry::fix(30.0, fix(2.0)),
        ])
        .unwrap();
        let start = tokio::time::Instant::now();

        let mut sub = source.subscribe(&settings()).unwrap();

        assert_eq!(sub.next().await.unwrap().unwrap().latitude, 1.0);
        assert_eq!(
            sub.next().await.unwrap(),
            Err(PositionError::Unavailable("tunnel".to_string()))
        );
        assert_eq!(sub.next().await.unwrap().unwrap().latitude, 2.0);
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(sub.id(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_continues_timeline() {
        let source = ReplaySource::new(vec![
            TraceEntry::fix(1.0, fix(1.0)),
            TraceEntry::fix(10.0, fix(2.0)),
            TraceEntry::fix(20.0, fix(3.0)),
        ])
        .unwrap();

        tokio::time::sleep(Duration::from_secs(15)).await;
        let mut sub = source.subscribe(&settings()).unwrap();

        assert_eq!(sub.next().await.unwrap().unwrap().latitude, 3.0);
        assert_eq!(source.subscription_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_known_is_most_recent_passed_fix() {
        let source = ReplaySource::new(vec![
            TraceEntry::fix(1.0, fix(1.0)),
            TraceEntry::fix(10.0, fix(2.0)),
            TraceEntry::error(12.0, "tunnel"),
            TraceEntry::fix(60.0, fix(3.0)),
        ])
        .unwrap();

        assert_eq!(source.last_known_position().await.unwrap(), None);

        tokio::time::sleep(Duration::from_secs(15)).await;
        let cached = source.last_known_position().await.unwrap().unwrap();
        assert_eq!(cached.latitude, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_position_waits_for_next_fix() {
        let source = ReplaySource::new(vec![TraceEntry::fix(4.0, fix(1.0))]).unwrap();

        let position = source
            .current_position(&settings(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(position.latitude, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_position_times_out() {
        let source = ReplaySource::new(vec![TraceEntry::fix(40.0, fix(1.0))]).unwrap();

        let result = source
            .current_position(&settings(), Duration::from_secs(10))
            .await;
        assert!(matches!(result, Err(SourceError::Timeout(_))));
    }
}
