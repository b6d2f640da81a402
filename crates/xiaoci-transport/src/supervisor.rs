//! Connection supervisor.
//!
//! Owns the inbound link and feeds frames to the [`Dispatcher`] one at a
//! time, in arrival order.
//!
//! ```text
//!                ┌──────────────┐
//!      start ───▶│  Connecting  │◀──────────────┐
//!                └──────┬───────┘               │
//!               ok      │      err              │ fixed delay
//!          ┌────────────┴───────────┐           │
//!          ▼                        ▼           │
//!   ┌─────────────┐  closed/err ┌─────────┐     │
//!   │  Connected  │────────────▶│ Backoff │─────┘
//!   └─────────────┘             └─────────┘
//!
//!   shutdown token (any state) ──▶ Disconnected
//! ```
//!
//! Every frame is awaited through dispatch, handler included, before the
//! next one is read.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use xiaoci_core::{TransportError, TransportResult, normalize};
use xiaoci_framework::{DispatchOutcome, Dispatcher};

/// Delay between a lost or failed connection and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Observable link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the reconnect delay.
    Backoff,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Backoff => "backoff",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Link abstraction
// ============================================================================

/// An open inbound stream of text frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Returns the next frame, `Ok(None)` once the peer closed the stream.
    async fn next_frame(&mut self) -> TransportResult<Option<String>>;
}

/// Opens inbound streams.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new stream.
    async fn connect(&self) -> TransportResult<Box<dyn FrameSource>>;

    /// A printable name for the remote end.
    fn endpoint(&self) -> String;
}

/// What the supervisor did with one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Handed to the dispatcher.
    Dispatched(DispatchOutcome),
    /// No `message_type`: heartbeat, lifecycle or API echo.
    NotMessage,
    /// Sent by the bot account itself.
    SelfAuthored,
    /// Not valid JSON.
    Invalid,
}

enum SessionEnd {
    Closed,
    Failed(TransportError),
    Cancelled,
}

// ============================================================================
// Supervisor
// ============================================================================

/// Keeps one inbound connection alive and drains it into a dispatcher.
pub struct Supervisor {
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(connector: Arc<dyn Connector>, dispatcher: Dispatcher) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            dispatcher,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            state_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Sets the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Uses an externally owned shutdown token.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Subscribes to state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The token that stops [`run`](Self::run).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs until the shutdown token is cancelled.
    ///
    /// Connection failures never end the loop.
    pub async fn run(&self) {
        let endpoint = self.connector.endpoint();
        info!(endpoint = %endpoint, delay = ?self.reconnect_delay, "Connection supervisor started");

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            self.set_state(ConnectionState::Connecting);
            debug!(endpoint = %endpoint, attempt, "Connecting");

            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.connector.connect() => result,
            };

            match connected {
                Ok(mut source) => {
                    self.set_state(ConnectionState::Connected);
                    info!(endpoint = %endpoint, "Connected");
                    attempt = 0;

                    match self.pump(source.as_mut()).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Closed => info!(endpoint = %endpoint, "Connection closed by peer"),
                        SessionEnd::Failed(e) => {
                            warn!(endpoint = %endpoint, error = %e, "Connection lost")
                        }
                    }
                }
                Err(e) => warn!(endpoint = %endpoint, attempt, error = %e, "Connection failed"),
            }

            self.set_state(ConnectionState::Backoff);
            info!(delay = ?self.reconnect_delay, "Reconnecting after delay");
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!(endpoint = %endpoint, "Connection supervisor stopped");
    }

    async fn pump(&self, source: &mut dyn FrameSource) -> SessionEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return SessionEnd::Cancelled,
                next = source.next_frame() => next,
            };

            match next {
                Ok(Some(raw)) => {
                    self.process_frame(&raw).await;
                }
                Ok(None) => return SessionEnd::Closed,
                Err(e) => return SessionEnd::Failed(e),
            }
        }
    }

    /// Filters one raw frame and dispatches it if it is a foreign message.
    pub async fn process_frame(&self, raw: &str) -> FrameDisposition {
        let frame: Value = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, len = raw.len(), "Received invalid JSON frame, skipping");
                return FrameDisposition::Invalid;
            }
        };

        if frame.get("message_type").is_none() {
            let post_type = frame
                .get("post_type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("-");
            trace!(post_type = post_type, "Skipping non-message frame");
            return FrameDisposition::NotMessage;
        }

        let event = normalize(&frame);
        if event.is_self_authored() {
            debug!(bot_id = event.bot_id, "Skipping self-authored message");
            return FrameDisposition::SelfAuthored;
        }

        FrameDisposition::Dispatched(self.dispatcher.dispatch_event(event).await)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            trace!(from = %previous, to = %state, "Connection state changed");
        }
    }
}
