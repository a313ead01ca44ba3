//! Position sources - adapters over the OS location API.
//!
//! A [`PositionSource`] offers three ways to get a fix:
//!
//! - [`PositionSource::subscribe`] - continuous push stream
//! - [`PositionSource::current_position`] - one-shot fix with a timeout
//! - [`PositionSource::last_known_position`] - the OS cache, without waking the GPS
//!
//! # Implementations
//!
//! - [`ReplaySource`] - replays a recorded JSON-lines trace
//! - [`CallbackSource`] - fed by a host bridge (or a test) through method calls
//!
//! # Cancellation
//!
//! A [`Subscription`] owns the receiving half of the stream. Dropping it is
//! the cancel: sources watch for the closed channel and stop delivering.

mod callback;
mod error;
mod platform;
mod replay;

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use super::position::RawPosition;

pub use callback::CallbackSource;
pub use error::{PositionError, SourceError};
pub use platform::{
    strategy_for, AndroidStrategy, IosStrategy, LocationAccuracy, LocationSettings,
    LocationStrategy, Platform, ANDROID_MAX_INTERVAL_HINT,
};
pub use replay::{parse_trace, ReplaySource, TraceEntry, TraceFix};

/// One item on a subscription: a fix or an error payload.
pub type SourceUpdate = Result<RawPosition, PositionError>;

/// Buffer size of subscription channels.
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// A live location subscription.
#[derive(Debug)]
pub struct Subscription {
    id: u32,
    rx: mpsc::Receiver<SourceUpdate>,
}

impl Subscription {
    pub fn new(id: u32, rx: mpsc::Receiver<SourceUpdate>) -> Self {
        Self { id, rx }
    }

    /// Create a subscription and the sender a source delivers on.
    pub fn channel(id: u32) -> (mpsc::Sender<SourceUpdate>, Self) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        (tx, Self::new(id, rx))
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Next update, or `None` once the source closed the stream.
    pub async fn next(&mut self) -> Option<SourceUpdate> {
        self.rx.recv().await
    }
}

/// Adapter over a device location API.
pub trait PositionSource: Send + Sync + 'static {
    /// Open a continuous subscription.
    fn subscribe(&self, settings: &LocationSettings) -> Result<Subscription, SourceError>;

    /// Request a single fresh fix, giving up after `timeout`.
    fn current_position(
        &self,
        settings: &LocationSettings,
        timeout: Duration,
    ) -> impl Future<Output = Result<RawPosition, SourceError>> + Send;

    /// Read the OS cached fix. Never starts the GPS.
    fn last_known_position(
        &self,
    ) -> impl Future<Output = Result<Option<RawPosition>, SourceError>> + Send;
}
