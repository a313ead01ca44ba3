//! Callback source - fixes pushed in by a host bridge.
//!
//! The host side of a mobile app receives location callbacks from the OS and
//! forwards them with [`CallbackSource::push`]. The same source doubles as
//! the scripted source in tests: cache contents, one-shot results and
//! subscription failures can all be set directly.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use super::error::SourceError;
use super::platform::LocationSettings;
use super::{PositionSource, SourceUpdate, Subscription};
use crate::tracking::position::RawPosition;

#[derive(Debug, Default)]
struct CallbackState {
    sender: Option<mpsc::Sender<SourceUpdate>>,
    settings: Option<LocationSettings>,
    cached: Option<RawPosition>,
    one_shot: Option<RawPosition>,
    failures_remaining: u32,
    subscriptions: u32,
    cache_queries: u32,
    cache_delay: Duration,
}

/// Position source driven by explicit calls.
#[derive(Debug, Default)]
pub struct CallbackSource {
    state: Mutex<CallbackState>,
}

impl CallbackSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CallbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an update on the current subscription.
    ///
    /// A fix also refreshes the OS cache. Returns false when nobody is
    /// subscribed or the subscriber has gone away.
    pub fn push(&self, update: SourceUpdate) -> bool {
        let mut state = self.state();
        if let Ok(fix) = &update {
            state.cached = Some(fix.clone());
        }
        match &state.sender {
            Some(tx) => tx.try_send(update).is_ok(),
            None => false,
        }
    }

    /// Replace the cached last-known fix.
    pub fn set_cached(&self, position: Option<RawPosition>) {
        self.state().cached = position;
    }

    /// Fix returned by the next one-shot requests. `None` makes them time out.
    pub fn set_one_shot(&self, position: Option<RawPosition>) {
        self.state().one_shot = position;
    }

    /// Make the next `count` subscribe calls fail.
    pub fn fail_next_subscriptions(&self, count: u32) {
        self.state().failures_remaining = count;
    }

    /// Delay applied to cache queries.
    pub fn set_cache_delay(&self, delay: Duration) {
        self.state().cache_delay = delay;
    }

    /// Close the current subscription from the source side.
    pub fn close(&self) {
        self.state().sender = None;
    }

    /// Subscribe calls so far, including failed ones.
    pub fn subscription_count(&self) -> u32 {
        self.state().subscriptions
    }

    pub fn cache_query_count(&self) -> u32 {
        self.state().cache_queries
    }

    /// True while a subscriber holds the current subscription.
    pub fn is_subscribed(&self) -> bool {
        self.state()
            .sender
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Settings of the most recent subscription.
    pub fn last_settings(&self) -> Option<LocationSettings> {
        self.state().settings.clone()
    }
}

impl PositionSource for CallbackSource {
    fn subscribe(&self, settings: &LocationSettings) -> Result<Subscription, SourceError> {
        let mut state = self.state();
        state.subscriptions += 1;

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(SourceError::SubscribeFailed(
                "location provider refused the request".to_string(),
            ));
        }

        let (tx, subscription) = Subscription::channel(state.subscriptions);
        state.sender = Some(tx);
        state.settings = Some(settings.clone());
        Ok(subscription)
    }

    async fn current_position(
        &self,
        _settings: &LocationSettings,
        timeout: Duration,
    ) -> Result<RawPosition, SourceError> {
        let one_shot = self.state().one_shot.clone();
        match one_shot {
            Some(position) => Ok(position),
            None => {
                tokio::time::sleep(timeout).await;
                Err(SourceError::Timeout(timeout))
            }
        }
    }

    async fn last_known_position(&self) -> Result<Option<RawPosition>, SourceError> {
        let delay = {
            let mut state = self.state();
            state.cache_queries += 1;
            state.cache_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state().cached.clone())
    }
}
