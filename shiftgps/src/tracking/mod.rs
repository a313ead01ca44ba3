//! Adaptive background position tracking.
//!
//! This module turns a raw stream of location fixes into a sparse,
//! battery-aware series of [`CapturedPoint`]s for a work shift, and keeps
//! the stream alive when the OS silently stops delivering.
//!
//! # Architecture
//!
//! ```text
//!  PositionSource ──fix──► MotionStateTracker ──► SamplingController ──► position event
//!        ▲                                               │
//!        │                  ┌────────────────────────────┘
//!        │                  ▼
//!        │            FixLedger (last fix, uptime)
//!        │              │            │
//!        │              ▼            ▼
//!        │         GapTracker   StreamHealthMonitor ──► recovery plan
//!        │                                                   │
//!        └──────────────────── resubscribe ◄─────────────────┘
//! ```
//!
//! The pure state machines ([`MotionStateTracker`], [`SamplingController`],
//! [`GapTracker`], [`StreamHealthMonitor`], [`ForceCaptureFallback`]) take
//! the current time as an argument and never touch the clock or the OS.
//! [`TrackingSession`] composes them and queues outbound events;
//! [`Engine`] owns the session and runs the async event loop.
//!
//! # Components
//!
//! - [`config`] - `EngineConfig` and validated runtime updates
//! - [`position`] - `RawPosition`, `CapturedPoint`
//! - [`source`] - `PositionSource` trait, platform strategies, replay and callback sources
//! - [`geo`] - great-circle distance

pub mod config;
mod engine;
mod fallback;
mod gap;
pub mod geo;
mod health;
mod liveness;
mod motion;
pub mod position;
mod sampling;
mod session;
pub mod source;
mod status;

pub use config::{ConfigRejection, ConfigUpdate, EngineConfig};
pub use engine::{
    Engine, EngineError, EngineOutcome, EngineSettings, EngineState, DEFAULT_FIRST_FIX_TIMEOUT,
    DEFAULT_SUBSCRIBE_ATTEMPTS, DEFAULT_SUBSCRIBE_BACKOFF, DEFAULT_TICK_INTERVAL,
};
pub use fallback::{FallbackStats, ForceCaptureFallback, ForceCaptureOrigin};
pub use gap::{GapCheck, GapRestored, GapTracker, GapTrackerConfig, GapWindow};
pub use geo::distance_meters;
pub use health::{
    backoff_delay, HealthVerdict, RecoveryAttemptState, RecoveryEscalation, RecoveryPlan,
    RecoveryReason, StreamHealthConfig, StreamHealthMonitor,
};
pub use liveness::FixLedger;
pub use motion::{MotionState, MotionStateTracker, MotionTrackerConfig, MotionTransition};
pub use position::{CapturedPoint, RawPosition, SyncStatus, TrackingIdentity};
pub use sampling::{capture_interval, SamplingController, SamplingDecision};
pub use session::{SessionSettings, TickOutcome, TrackingSession};
pub use source::{PositionSource, Subscription};
pub use status::{gps_lost_status, tracking_status, StatusSnapshot};
