//! User-visible status surface.
//!
//! While a shift is tracked the user sees a persistent notification with the
//! elapsed time, point count and signal state. The engine only knows the
//! [`StatusNotifier`] trait; the host decides what "showing" means.
//!
//! # Architecture
//!
//! - `StatusNotifier` trait: what the engine calls
//! - `TracingNotifier`: writes status changes to the log
//! - `NoOpNotifier`: discards everything (tests, headless runs)
//!
//! # Usage
//!
//! ```
//! use shiftgps::notify::{NoOpNotifier, StatusNotifier, StatusText};
//! use std::sync::Arc;
//!
//! let notifier: Arc<dyn StatusNotifier> = Arc::new(NoOpNotifier);
//! notifier.update(&StatusText::new("Shift tracking active", "0 points"));
//! ```

mod noop;
mod tracing_adapter;
mod r#trait;

pub use noop::NoOpNotifier;
pub use r#trait::{StatusNotifier, StatusText};
pub use tracing_adapter::TracingNotifier;
