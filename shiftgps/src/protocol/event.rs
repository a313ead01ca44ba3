//! Outbound events to the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracking::position::CapturedPoint;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    Position,
    Stream,
    Protocol,
    Config,
}

/// An event emitted by the engine.
///
/// Wire form is a JSON object tagged by `type`. Timestamps are RFC 3339 and
/// absent optionals are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Engine is running.
    Started { shift_id: String },

    /// A captured point.
    Position { point: CapturedPoint },

    /// Periodic liveness signal.
    Heartbeat {
        timestamp: DateTime<Utc>,
        point_count: u64,
        is_stationary: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_capture: Option<DateTime<Utc>>,
    },

    /// No fix for too long.
    GpsLost { gap_started_at: DateTime<Utc> },

    /// Fixes are flowing again.
    GpsRestored {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gap_started_at: Option<DateTime<Utc>>,
        gap_ended_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gap_duration_seconds: Option<i64>,
    },

    /// The subscription was recreated.
    StreamRecovered { attempt: u32 },

    /// Recovery keeps failing.
    StreamRecoveryFailing { attempts: u32, gap_minutes: u64 },

    /// Fatal error; `stopped` follows.
    Error { message: String },

    /// Engine has stopped. Always the last event.
    Stopped { point_count: u64, is_timeout: bool },

    /// Reply to `getStatus`.
    Status {
        is_tracking: bool,
        point_count: u64,
        is_stationary: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_capture: Option<DateTime<Utc>>,
    },

    /// Non-fatal observation.
    Diagnostic {
        severity: Severity,
        category: DiagnosticCategory,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

impl EngineEvent {
    /// Build a diagnostic event.
    pub fn diagnostic(
        severity: Severity,
        category: DiagnosticCategory,
        message: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        EngineEvent::Diagnostic {
            severity,
            category,
            message: message.into(),
            metadata,
        }
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Started { .. } => "started",
            EngineEvent::Position { .. } => "position",
            EngineEvent::Heartbeat { .. } => "heartbeat",
            EngineEvent::GpsLost { .. } => "gps_lost",
            EngineEvent::GpsRestored { .. } => "gps_restored",
            EngineEvent::StreamRecovered { .. } => "stream_recovered",
            EngineEvent::StreamRecoveryFailing { .. } => "stream_recovery_failing",
            EngineEvent::Error { .. } => "error",
            EngineEvent::Stopped { .. } => "stopped",
            EngineEvent::Status { .. } => "status",
            EngineEvent::Diagnostic { .. } => "diagnostic",
        }
    }
}
