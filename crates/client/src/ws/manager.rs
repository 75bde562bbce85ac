//! Realtime connection manager.
//!
//! Owns the lifecycle of one logical connection: opening, closing, failure
//! detection, bounded reconnection, and normalization of transport signals
//! into routed events. Must run inside a tokio runtime; `connect`,
//! `disconnect` and `send` are non-blocking and never return transport
//! errors — readiness is observed through the `connected`/`disconnected`
//! events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use farmline_shared::protocol::{
    ClientMessage, Envelope, EVENT_CONNECTED, EVENT_DISCONNECTED, EVENT_ERROR,
};
use futures_channel::mpsc::{unbounded, UnboundedReceiver};
use futures_util::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::connection::{ConnectionState, ReconnectConfig};
use super::router::{EventRouter, Listener};
use super::transport::{Connector, Transport, TransportSignal, WsConnector};

/// Events published by the manager.
///
/// `Connected`/`Disconnected`/`Error` are produced internally; `Wire`
/// carries any server-sent envelope and is dispatched under the envelope's
/// own `type` string.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    Connected { subject: String },
    Disconnected { subject: String },
    Error { detail: String },
    Wire(Envelope),
}

impl RealtimeEvent {
    /// The event-type string this event is dispatched under.
    pub fn event_type(&self) -> &str {
        match self {
            RealtimeEvent::Connected { .. } => EVENT_CONNECTED,
            RealtimeEvent::Disconnected { .. } => EVENT_DISCONNECTED,
            RealtimeEvent::Error { .. } => EVENT_ERROR,
            RealtimeEvent::Wire(envelope) => &envelope.event_type,
        }
    }
}

/// Configuration for the realtime client.
#[derive(Debug, Clone, Default)]
pub struct RealtimeConfig {
    /// Base endpoint, e.g. `wss://example.com/api`; the connection target is
    /// `<base>/ws/<subject>`. Scheme selection (`ws`/`wss`) is the caller's
    /// concern.
    pub base_url: Option<String>,
    pub reconnect: ReconnectConfig,
}

impl RealtimeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Read configuration from the environment.
    ///
    /// - `FARMLINE_BACKEND_URL`: base endpoint (`ws://` or `wss://`).
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("FARMLINE_BACKEND_URL").ok(),
            reconnect: ReconnectConfig::default(),
        }
    }

    fn endpoint_url(&self, subject: &str) -> Result<String, RealtimeError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(RealtimeError::MissingEndpoint)?;
        let target = format!("{}/ws/{}", base.trim_end_matches('/'), subject);
        url::Url::parse(&target).map_err(|e| RealtimeError::InvalidEndpoint(e.to_string()))?;
        Ok(target)
    }
}

/// Fatal configuration errors surfaced synchronously by
/// [`RealtimeClient::connect`]. Transport failures are never returned; they
/// arrive as events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    #[error("no base endpoint configured")]
    MissingEndpoint,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

struct Inner {
    state: ConnectionState,
    /// Last-used subject, kept so reconnection needs no caller input.
    subject: Option<String>,
    attempts: u32,
    /// Bumped whenever a new transport session begins. Signal loops and
    /// reconnect timers carry the epoch they were created under and stand
    /// down if it no longer matches.
    epoch: u64,
    transport: Option<Box<dyn Transport>>,
    /// Set by `disconnect()`; the next close signal must not reconnect.
    expected_close: bool,
}

/// Connection manager for one logical realtime connection.
///
/// Cheap to clone; all clones share the same connection and listener
/// registry. Construct one per endpoint and inject it where needed.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Mutex<Inner>>,
    router: Arc<EventRouter>,
    connector: Arc<dyn Connector>,
    config: RealtimeConfig,
}

impl RealtimeClient {
    /// Client backed by the real WebSocket connector.
    pub fn new(config: RealtimeConfig) -> Self {
        Self::with_connector(config, WsConnector)
    }

    /// Client backed by a custom connector. Tests inject a scripted one to
    /// drive the state machine without a socket.
    pub fn with_connector(config: RealtimeConfig, connector: impl Connector) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                subject: None,
                attempts: 0,
                epoch: 0,
                transport: None,
                expected_close: false,
            })),
            router: Arc::new(EventRouter::new()),
            connector: Arc::new(connector),
            config,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state.clone()
    }

    /// Register `callback` for `event_type`. See [`EventRouter::on`].
    pub fn on(&self, event_type: &str, callback: Listener) {
        self.router.on(event_type, callback);
    }

    /// Remove one registration of `callback`. See [`EventRouter::off`].
    pub fn off(&self, event_type: &str, callback: &Listener) {
        self.router.off(event_type, callback);
    }

    /// Open a connection for `subject`, superseding any live transport.
    ///
    /// Fails synchronously only when the base endpoint is missing or does
    /// not form a valid target URL. Grants a fresh reconnect budget.
    pub fn connect(&self, subject: &str) -> Result<(), RealtimeError> {
        self.connect_inner(subject.to_string(), true, None)
    }

    /// Close the connection, if any. Idempotent. The resulting close signal
    /// still publishes `disconnected`, but the reconnect policy is
    /// suppressed, and a scheduled retry is cancelled.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        match inner.transport.take() {
            Some(mut transport) => {
                inner.expected_close = true;
                inner.state = ConnectionState::Closing;
                transport.close();
            }
            None => {
                // Also lands here during a scheduled retry wait; the timer
                // checks the state before acting, so this cancels it.
                inner.state = ConnectionState::Disconnected;
            }
        }
    }

    /// Serialize and send `message` if the connection is open; otherwise log
    /// a warning and drop it. At-most-once, no queue, nothing returned.
    pub fn send<T: Serialize>(&self, message: &T) {
        let mut inner = self.lock();
        if !inner.state.is_open() {
            warn!("realtime channel is not open; dropping outbound message");
            return;
        }
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to serialize outbound message: {}", e);
                return;
            }
        };
        if let Some(transport) = inner.transport.as_mut() {
            if let Err(e) = transport.send(text) {
                warn!("realtime send failed: {}", e);
            }
        }
    }

    /// Ask the server to deliver a conversation's message stream.
    pub fn join_conversation(&self, conversation_id: &str) {
        self.send(&ClientMessage::JoinConversation {
            conversation_id: conversation_id.to_string(),
        });
    }

    /// Liveness probe.
    pub fn send_ping(&self) {
        self.send(&ClientMessage::Ping);
    }

    fn connect_inner(
        &self,
        subject: String,
        fresh: bool,
        required_epoch: Option<u64>,
    ) -> Result<(), RealtimeError> {
        let url = self.config.endpoint_url(&subject)?;

        let mut inner = self.lock();
        if let Some(epoch) = required_epoch {
            // A stale reconnect timer lost the race against a manual call.
            if inner.epoch != epoch {
                return Ok(());
            }
        }

        // A live transport is superseded cleanly: the epoch bump below
        // invalidates its remaining signals, so its late close can neither
        // publish events nor trigger the reconnect policy.
        if let Some(mut old) = inner.transport.take() {
            old.close();
        }

        inner.epoch += 1;
        inner.subject = Some(subject.clone());
        if fresh {
            inner.attempts = 0;
        }
        inner.expected_close = false;
        inner.state = ConnectionState::Connecting;
        info!("connecting realtime channel for {}", subject);

        let (signal_tx, signal_rx) = unbounded();
        inner.transport = Some(self.connector.connect(&url, signal_tx));
        let epoch = inner.epoch;
        drop(inner);

        self.spawn_signal_loop(epoch, signal_rx);
        Ok(())
    }

    fn spawn_signal_loop(&self, epoch: u64, mut signals: UnboundedReceiver<TransportSignal>) {
        let client = self.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                client.handle_signal(epoch, signal);
            }
        });
    }

    fn handle_signal(&self, epoch: u64, signal: TransportSignal) {
        let mut to_publish = Vec::new();
        {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                // Signal from a superseded transport session.
                return;
            }
            match signal {
                TransportSignal::Opened => {
                    if inner.expected_close {
                        // Teardown was requested mid-handshake; the close
                        // signal follows shortly.
                        return;
                    }
                    inner.attempts = 0;
                    inner.state = ConnectionState::Open;
                    if let Some(subject) = inner.subject.clone() {
                        info!("realtime channel open for {}", subject);
                        to_publish.push(RealtimeEvent::Connected { subject });
                    }
                }
                TransportSignal::Message(text) => {
                    match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => to_publish.push(RealtimeEvent::Wire(envelope)),
                        Err(e) => {
                            // Malformed frames are non-fatal: drop the frame,
                            // keep the connection.
                            warn!("dropping unparsable frame: {}", e);
                        }
                    }
                }
                TransportSignal::Errored(detail) => {
                    to_publish.push(RealtimeEvent::Error { detail });
                }
                TransportSignal::Closed => {
                    inner.transport = None;
                    inner.state = ConnectionState::Disconnected;
                    if let Some(subject) = inner.subject.clone() {
                        to_publish.push(RealtimeEvent::Disconnected { subject });
                    }
                    if inner.expected_close {
                        inner.expected_close = false;
                    } else {
                        self.schedule_reconnect(&mut inner);
                    }
                }
            }
        }
        for event in to_publish {
            self.router.publish(event.event_type(), &event);
        }
    }

    fn schedule_reconnect(&self, inner: &mut Inner) {
        let max = self.config.reconnect.max_attempts;
        if inner.subject.is_none() {
            return;
        }
        if inner.attempts >= max {
            warn!("giving up after {} reconnect attempts", inner.attempts);
            return;
        }
        inner.attempts += 1;
        let attempt = inner.attempts;
        inner.state = ConnectionState::ReconnectScheduled { attempt };
        info!(
            "reconnecting in {:?} (attempt {}/{})",
            self.config.reconnect.retry_interval, attempt, max
        );

        let client = self.clone();
        let epoch = inner.epoch;
        let delay = self.config.reconnect.retry_interval;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.resume_after_backoff(epoch);
        });
    }

    fn resume_after_backoff(&self, epoch: u64) {
        let subject = {
            let inner = self.lock();
            if inner.epoch != epoch
                || !matches!(inner.state, ConnectionState::ReconnectScheduled { .. })
            {
                // Cancelled by an explicit connect or disconnect.
                return;
            }
            inner.subject.clone()
        };
        if let Some(subject) = subject {
            // The epoch is re-checked under the lock inside connect_inner; a
            // concurrent manual call wins.
            let _ = self.connect_inner(subject, false, Some(epoch));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
