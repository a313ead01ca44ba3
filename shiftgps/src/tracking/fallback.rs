//! Force-capture fallback.
//!
//! Some platforms stop delivering to a stream with a zero distance filter
//! once the device stops moving, even though the OS keeps computing fixes.
//! On every tick the fallback checks whether a capture is overdue and, if
//! so, manufactures one from the OS cache instead of the live stream.
//!
//! The cache query is asynchronous, so the engine runs it as a separate
//! task. The fallback only decides when to start one ([`ForceCaptureFallback::tick`])
//! and which fix to use when it completes ([`ForceCaptureFallback::resolve`]).

use chrono::{DateTime, Utc};

use super::config::EngineConfig;
use super::motion::MotionState;
use super::position::RawPosition;
use super::sampling::SamplingController;
use super::source::SourceError;

/// Where a forced capture's fix came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceCaptureOrigin {
    /// The OS cached last-known fix.
    Cache,
    /// The last live fix the controller remembered.
    Remembered,
}

/// Counters for forced captures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackStats {
    pub started: u64,
    pub from_cache: u64,
    pub from_remembered: u64,
    pub skipped: u64,
}

/// Periodic reconciliation of the capture schedule.
#[derive(Debug, Default)]
pub struct ForceCaptureFallback {
    stats: FallbackStats,
}

impl ForceCaptureFallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &FallbackStats {
        &self.stats
    }

    /// Decide whether a forced capture should start now.
    ///
    /// Requires a previous capture, a remembered fix and an elapsed
    /// interval. On true the controller's capture path is claimed and the
    /// caller must finish with [`SamplingController::complete_forced_capture`].
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        sampler: &mut SamplingController,
        motion: &MotionState,
        config: &EngineConfig,
    ) -> bool {
        if sampler.last_capture_at().is_none() || sampler.last_position().is_none() {
            return false;
        }
        if !sampler.is_due(now, motion, config) {
            return false;
        }
        if !sampler.begin_forced_capture() {
            return false;
        }

        self.stats.started += 1;
        tracing::debug!(
            interval_secs = sampler.compute_interval(motion, config).as_secs(),
            "Capture overdue, querying cached fix"
        );
        true
    }

    /// Pick the fix for a completed cache query.
    ///
    /// An empty cache or a failed query falls back to the remembered fix.
    pub fn resolve(
        &mut self,
        cached: Result<Option<RawPosition>, SourceError>,
        remembered: Option<&RawPosition>,
    ) -> Option<(RawPosition, ForceCaptureOrigin)> {
        let cached = match cached {
            Ok(cached) => cached,
            Err(e) => {
                tracing::debug!(error = %e, "Cached fix query failed");
                None
            }
        };

        let resolved = match (cached, remembered) {
            (Some(position), _) => Some((position, ForceCaptureOrigin::Cache)),
            (None, Some(position)) => Some((position.clone(), ForceCaptureOrigin::Remembered)),
            (None, None) => None,
        };

        match &resolved {
            Some((_, ForceCaptureOrigin::Cache)) => self.stats.from_cache += 1,
            Some((_, ForceCaptureOrigin::Remembered)) => self.stats.from_remembered += 1,
            None => {
                self.stats.skipped += 1;
                tracing::debug!("No cached or remembered fix, skipping forced capture");
            }
        }
        resolved
    }
}
