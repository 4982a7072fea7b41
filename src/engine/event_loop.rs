use crate::bars::{Bar, Timeframe};
use crate::core::events::{DecodeError, StreamEvent};
use crate::engine::dispatcher::{Engine, OrderIntent};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::fmt;
use tokio::time::{sleep, timeout, Duration, Instant};

/// Session-level failures. Only decode errors are survivable in place;
/// everything else tears the session down for a reconnect.
#[derive(Debug)]
pub enum SessionError {
    Transport(String),
    Auth(String),
    Http(String),
    Decode(DecodeError),
}

impl SessionError {
    /// Fatal errors end the session; non-fatal ones drop the offending
    /// event and keep reading.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Decode(_))
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Transport(msg) => write!(f, "transport error: {}", msg),
            SessionError::Auth(msg) => write!(f, "auth error: {}", msg),
            SessionError::Http(msg) => write!(f, "http error: {}", msg),
            SessionError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<DecodeError> for SessionError {
    fn from(e: DecodeError) -> Self {
        SessionError::Decode(e)
    }
}

/// One live connection to the exchange: the event stream plus the REST
/// calls the loop needs around it (history seeding, order submission).
#[async_trait]
pub trait ExchangeSession: Send {
    /// Establish the stream: connect, authenticate, subscribe.
    async fn connect(&mut self) -> Result<(), SessionError>;

    /// Next decoded event; `None` when the stream ends.
    async fn next_event(&mut self) -> Option<Result<StreamEvent, SessionError>>;

    /// Keepalive / liveness probe.
    async fn ping(&mut self) -> Result<(), SessionError>;

    /// Bar history for (re-)seeding, ascending by start.
    async fn fetch_history(&mut self) -> Result<Vec<(Timeframe, Vec<Bar>)>, SessionError>;

    /// Submit one order intent.
    async fn submit(&mut self, intent: &OrderIntent) -> Result<(), SessionError>;
}

#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// How long a read may block before a liveness probe.
    pub read_timeout: Duration,
    /// Keepalive ping cadence.
    pub ping_interval: Duration,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Single-task cooperative loop: consumes the session's event stream in
/// arrival order, applies each event to the engine, and submits the
/// resulting order intents. All engine state is owned here; nothing is
/// shared, nothing is locked.
pub struct EventLoop<S: ExchangeSession> {
    config: EventLoopConfig,
    engine: Engine,
    session: S,
}

impl<S: ExchangeSession> EventLoop<S> {
    pub fn new(config: EventLoopConfig, engine: Engine, session: S) -> Self {
        Self {
            config,
            engine,
            session,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Run forever. Every session teardown (stream end, transport error,
    /// failed liveness probe) is followed by a fixed-backoff reconnect;
    /// each new session re-seeds the bar buffers, and tick replay after
    /// the reconnect is idempotent in the aggregator.
    pub async fn run(&mut self) {
        loop {
            match self.run_session().await {
                Ok(()) => warn!("run: stream ended, reconnecting"),
                Err(e) => error!("run: session failed ({}), reconnecting", e),
            }
            sleep(self.config.reconnect_delay).await;
        }
    }

    /// One connect-seed-consume cycle. Returns `Ok` when the stream ends
    /// cleanly and `Err` on a fatal session error.
    pub async fn run_session(&mut self) -> Result<(), SessionError> {
        self.session.connect().await?;

        for (timeframe, bars) in self.session.fetch_history().await? {
            self.engine.seed_bars(timeframe, bars);
        }
        info!("run_session: connected, bar buffers seeded");

        // Keepalive runs on its own cadence, checked between reads; the
        // read timeout bounds its drift.
        self.session.ping().await?;
        let mut last_ping = Instant::now();

        loop {
            if last_ping.elapsed() >= self.config.ping_interval {
                self.session.ping().await?;
                last_ping = Instant::now();
            }

            match timeout(self.config.read_timeout, self.session.next_event()).await {
                // Quiet stream: probe liveness. A failed ping is fatal
                // and falls through to the reconnect in run().
                Err(_) => {
                    debug!("run_session: read timed out, probing with ping");
                    self.session.ping().await?;
                    last_ping = Instant::now();
                }
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) if e.is_fatal() => return Err(e),
                Ok(Some(Err(e))) => warn!("run_session: dropped event: {}", e),
                Ok(Some(Ok(event))) => self.apply(event).await,
            }
        }
    }

    async fn apply(&mut self, event: StreamEvent) {
        let now = chrono::Utc::now().timestamp();
        for intent in self.engine.handle_event(event, now) {
            if let Err(e) = self.session.submit(&intent).await {
                // Submission failures are logged, not fatal; the account
                // reconciles against whatever the exchange actually did.
                error!("apply: order submission failed: {}", e);
            }
        }
    }
}
