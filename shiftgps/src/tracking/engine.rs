//! The tracking engine - lifecycle and event loop.
//!
//! [`Engine`] wires a [`PositionSource`] and a [`StatusNotifier`] to a
//! [`TrackingSession`] and drives it from a single task:
//!
//! ```text
//!              ┌──────────────────────────────┐
//!  Subscription ─►                              │
//!  Tick (30 s)  ─►  select! ──► TrackingSession ├──► EventSink ──► host
//!  Inbound      ─►                              ├──► StatusNotifier
//!  Cache query  ─►                              │
//!  Shutdown     ─►                              │
//!              └──────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! `NotStarted → Starting → Running → Stopped`. GPS loss and stream recovery
//! are flags inside `Running`, not states.
//!
//! # Usage
//!
//! ```ignore
//! let (host, worker) = control_channel(DEFAULT_COMMAND_BUFFER);
//! let engine = Engine::new(source, TracingNotifier::new(), worker.events, context, settings);
//! let handle = engine.spawn(worker.inbound, shutdown.clone());
//! ```

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::health::RecoveryPlan;
use super::position::RawPosition;
use super::session::{SessionSettings, TrackingSession};
use super::source::{
    strategy_for, LocationSettings, LocationStrategy, Platform, PositionSource, SourceError,
    SourceUpdate, Subscription,
};
use crate::notify::StatusNotifier;
use crate::protocol::{decode_command, EngineCommand, EngineEvent, EventSink, Inbound, StartupContext};
use crate::time::EngineClock;

/// Default health tick period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of subscription attempts at startup.
pub const DEFAULT_SUBSCRIBE_ATTEMPTS: u32 = 3;

/// Default linear backoff step between subscription attempts.
pub const DEFAULT_SUBSCRIBE_BACKOFF: Duration = Duration::from_secs(2);

/// Default bound of the startup one-shot fix.
pub const DEFAULT_FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine configuration that is fixed for the engine's lifetime.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub platform: Platform,
    pub tick_interval: Duration,
    pub subscribe_attempts: u32,
    pub subscribe_backoff: Duration,
    pub first_fix_timeout: Duration,
    /// Background execution limit. Expiry stops with `is_timeout`.
    pub max_runtime: Option<Duration>,
    pub session: SessionSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            subscribe_attempts: DEFAULT_SUBSCRIBE_ATTEMPTS,
            subscribe_backoff: DEFAULT_SUBSCRIBE_BACKOFF,
            first_fix_timeout: DEFAULT_FIRST_FIX_TIMEOUT,
            max_runtime: None,
            session: SessionSettings::default(),
        }
    }
}

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NotStarted,
    Starting,
    Running,
    Stopped,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOutcome {
    /// The context named no shift; nothing was tracked.
    NotApplicable,
    Stopped { point_count: u64, is_timeout: bool },
}

/// Fatal engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to open location subscription after {attempts} attempts: {source}")]
    StreamInit {
        attempts: u32,
        #[source]
        source: SourceError,
    },

    #[error("Engine was already started")]
    AlreadyStarted,
}

type CacheResult = Result<Option<RawPosition>, SourceError>;

/// One wake-up of the event loop.
enum Step {
    Shutdown,
    Deadline,
    Update(Option<SourceUpdate>),
    Tick,
    Inbound(Option<Inbound>),
    CacheQueried(CacheResult),
}

/// Background position-acquisition engine.
pub struct Engine<S: PositionSource, N: StatusNotifier> {
    source: Arc<S>,
    notifier: N,
    events: EventSink,
    context: StartupContext,
    settings: EngineSettings,
    strategy: Box<dyn LocationStrategy>,
    clock: EngineClock,
    state: EngineState,
    subscription: Option<Subscription>,
    pending_cache_query: Option<JoinHandle<CacheResult>>,
}

impl<S: PositionSource, N: StatusNotifier + 'static> Engine<S, N> {
    /// Create an engine. Nothing happens until [`Engine::run`].
    pub fn new(
        source: Arc<S>,
        notifier: N,
        events: EventSink,
        context: StartupContext,
        settings: EngineSettings,
    ) -> Self {
        let strategy = strategy_for(settings.platform);
        Self {
            source,
            notifier,
            events,
            context,
            settings,
            strategy,
            clock: EngineClock::new(),
            state: EngineState::NotStarted,
            subscription: None,
            pending_cache_query: None,
        }
    }

    /// Use a specific clock for every timestamp.
    pub fn with_clock(mut self, clock: EngineClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run the engine on its own task.
    pub fn spawn(
        self,
        inbound: mpsc::Receiver<Inbound>,
        shutdown: CancellationToken,
    ) -> JoinHandle<Result<EngineOutcome, EngineError>> {
        tokio::spawn(self.run(inbound, shutdown))
    }

    /// Start, then process events until shutdown or the runtime limit.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<Inbound>,
        shutdown: CancellationToken,
    ) -> Result<EngineOutcome, EngineError> {
        // A limit past the end of the clock means no limit
        let deadline = self
            .settings
            .max_runtime
            .and_then(|limit| Instant::now().checked_add(limit));

        let Some(mut session) = self.start().await? else {
            return Ok(EngineOutcome::NotApplicable);
        };

        let period = self.settings.tick_interval;
        let first_tick = Instant::now()
            .checked_add(period)
            .unwrap_or_else(|| self.clock.instant_at(Duration::MAX));
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inbound_open = true;

        let is_timeout = loop {
            let step = tokio::select! {
                _ = shutdown.cancelled() => Step::Shutdown,
                _ = sleep_until_deadline(deadline) => Step::Deadline,
                update = next_update(&mut self.subscription) => Step::Update(update),
                _ = ticker.tick() => Step::Tick,
                message = inbound.recv(), if inbound_open => Step::Inbound(message),
                result = join_cache_query(&mut self.pending_cache_query) => Step::CacheQueried(result),
            };

            match step {
                Step::Shutdown => {
                    tracing::info!("Shutdown requested");
                    break false;
                }
                Step::Deadline => {
                    tracing::warn!("Background runtime limit reached");
                    break true;
                }
                Step::Update(Some(Ok(position))) => session.on_fix(position, self.clock.now()),
                Step::Update(Some(Err(error))) => session.on_position_error(&error),
                Step::Update(None) => {
                    if let Some(closed) = self.subscription.take() {
                        session.on_subscription_closed(closed.id());
                    }
                }
                Step::Tick => self.on_tick(&mut session),
                Step::Inbound(Some(message)) => self.on_inbound(&mut session, message),
                Step::Inbound(None) => {
                    tracing::debug!("Command channel closed");
                    inbound_open = false;
                }
                Step::CacheQueried(result) => {
                    session.complete_force_capture(result, self.clock.now());
                }
            }

            self.flush(&mut session);
        };

        Ok(self.destroy(&mut session, is_timeout))
    }

    /// Validate context, open the subscription and take a first fix.
    ///
    /// Returns `None` when the context names no shift. On a subscription
    /// failure the `error` and `stopped` events are already emitted.
    pub async fn start(&mut self) -> Result<Option<TrackingSession>, EngineError> {
        if self.state != EngineState::NotStarted {
            return Err(EngineError::AlreadyStarted);
        }
        self.state = EngineState::Starting;

        let Some(identity) = self.context.identity() else {
            tracing::info!("No shift or employee in startup context, nothing to track");
            self.state = EngineState::Stopped;
            return Ok(None);
        };

        let started_at = self.clock.now();
        let (config, rejected) = self.context.engine_config();
        let location = self.strategy.settings(&config);

        tracing::info!(
            shift_id = %identity.shift_id,
            platform = %self.strategy.platform(),
            active_secs = config.active_interval_seconds,
            stationary_secs = config.stationary_interval_seconds,
            distance_filter_m = location.distance_filter_meters,
            "Starting tracking engine"
        );

        let shift_id = identity.shift_id.clone();
        let mut session = TrackingSession::new(
            identity,
            config,
            &self.settings.session,
            started_at,
            self.context.clocked_in_at,
            self.context.initial_point_count.unwrap_or(0),
        );
        session.report_rejections(&rejected);

        match self.open_subscription(&location).await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(source) => {
                let attempts = self.settings.subscribe_attempts.max(1);
                let error = EngineError::StreamInit { attempts, source };
                tracing::error!(error = %error, "Giving up on location subscription");
                self.events.emit(EngineEvent::Error {
                    message: error.to_string(),
                });
                self.destroy(&mut session, false);
                return Err(error);
            }
        }

        self.first_fix(&mut session, &location).await;
        self.flush(&mut session);

        self.events.emit(EngineEvent::Started { shift_id });
        self.state = EngineState::Running;
        Ok(Some(session))
    }

    /// Cancel the subscription and emit `stopped`.
    ///
    /// An in-flight cache query is aborted; its result is never applied.
    pub fn destroy(&mut self, session: &mut TrackingSession, is_timeout: bool) -> EngineOutcome {
        self.subscription = None;
        if let Some(query) = self.pending_cache_query.take() {
            tracing::debug!("Discarding in-flight cache query");
            query.abort();
        }

        session.stop(is_timeout);
        self.flush(session);
        self.notifier.clear();
        self.state = EngineState::Stopped;

        tracing::info!(
            point_count = session.point_count(),
            is_timeout,
            "Tracking engine stopped"
        );
        EngineOutcome::Stopped {
            point_count: session.point_count(),
            is_timeout,
        }
    }

    async fn open_subscription(&self, location: &LocationSettings) -> Result<Subscription, SourceError> {
        let attempts = self.settings.subscribe_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.subscribe(location) {
                Ok(subscription) => {
                    tracing::info!(
                        attempt,
                        subscription = subscription.id(),
                        "Location subscription opened"
                    );
                    return Ok(subscription);
                }
                Err(e) if attempt < attempts => {
                    let backoff = self.settings.subscribe_backoff * attempt;
                    tracing::warn!(
                        attempt,
                        error = %e,
                        backoff_secs = backoff.as_secs(),
                        "Location subscription failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn first_fix(&mut self, session: &mut TrackingSession, location: &LocationSettings) {
        let timeout = self.settings.first_fix_timeout;
        let request = self.source.current_position(location, timeout);

        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(position)) => {
                tracing::debug!("First fix from one-shot request");
                session.on_fix(position, self.clock.now());
            }
            Ok(Err(e)) => tracing::debug!(error = %e, "One-shot fix failed, waiting for stream"),
            Err(_) => tracing::debug!(
                timeout_secs = timeout.as_secs(),
                "One-shot fix timed out, waiting for stream"
            ),
        }
    }

    fn on_tick(&mut self, session: &mut TrackingSession) {
        let outcome = session.on_tick(self.clock.now());

        if let Some(plan) = outcome.recovery {
            self.recover(session, plan);
        }
        if outcome.force_capture {
            let source = Arc::clone(&self.source);
            let timeout = self.settings.first_fix_timeout;
            self.pending_cache_query = Some(tokio::spawn(async move {
                // The in-flight guard is only released by a result
                tokio::time::timeout(timeout, source.last_known_position())
                    .await
                    .unwrap_or(Err(SourceError::Timeout(timeout)))
            }));
        }
    }

    fn on_inbound(&mut self, session: &mut TrackingSession, message: Inbound) {
        let command = match message {
            Inbound::Command(command) => command,
            Inbound::Raw(text) => match decode_command(&text) {
                Ok(command) => command,
                Err(e) => {
                    session.on_undecodable(&e, &text);
                    return;
                }
            },
        };
        self.on_command(session, command);
    }

    fn on_command(&mut self, session: &mut TrackingSession, command: EngineCommand) {
        if let Some(plan) = session.on_command(command, self.clock.now()) {
            self.recover(session, plan);
        }
    }

    /// Tear down the subscription and open a fresh one.
    fn recover(&mut self, session: &mut TrackingSession, plan: RecoveryPlan) {
        self.subscription = None;
        let location = self.strategy.settings(session.config());

        let result = match self.source.subscribe(&location) {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(e) => Err(e),
        };
        session.record_recovery(plan, result);
    }

    fn flush(&self, session: &mut TrackingSession) {
        for event in session.drain_events() {
            self.events.emit(event);
        }
        if let Some(status) = session.take_status() {
            self.notifier.update(&status);
        }
    }
}

async fn next_update(subscription: &mut Option<Subscription>) -> Option<SourceUpdate> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => pending().await,
    }
}

async fn join_cache_query(handle: &mut Option<JoinHandle<CacheResult>>) -> CacheResult {
    let Some(task) = handle.as_mut() else {
        return pending().await;
    };
    let result = task.await;
    *handle = None;
    result.unwrap_or_else(|e| Err(SourceError::Unavailable(format!("cache query task failed: {}", e))))
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}
