//! ShiftGPS - adaptive background position acquisition for shift tracking
//!
//! This library records the movement of a worker during a shift: it turns a
//! continuous stream of OS location fixes into a sparse, battery-aware trail
//! of captured points and keeps that stream alive when the OS silently stops
//! delivering.
//!
//! # High-Level API
//!
//! The [`tracking::Engine`] runs as a separate worker and talks to its host
//! only through the [`protocol`] channel:
//!
//! ```ignore
//! use shiftgps::protocol::{control_channel, StartupContext, DEFAULT_COMMAND_BUFFER};
//! use shiftgps::tracking::{Engine, EngineSettings};
//!
//! let (mut host, worker) = control_channel(DEFAULT_COMMAND_BUFFER);
//! let engine = Engine::new(source, notifier, worker.events, context, EngineSettings::default());
//! let handle = engine.spawn(worker.inbound, shutdown.clone());
//!
//! while let Some(event) = host.events.next().await {
//!     // position, heartbeat, gps_lost, ...
//! }
//! ```

pub mod config;
pub mod logging;
pub mod notify;
pub mod protocol;
pub mod time;
pub mod tracking;

/// Version of the ShiftGPS library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
