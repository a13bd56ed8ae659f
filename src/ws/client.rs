//! The live WebSocket client.
//!
//! [`LiveClient`] is a cheap, cloneable handle. All mutable state (connection
//! state, desired subscriptions, credential, generation counter) lives in a
//! single background task; handle calls, socket frames, timer expiries and
//! finished background work all reach it as messages and are processed one at
//! a time, so no component needs a lock.
//!
//! # Architecture
//!
//! ```text
//!   LiveClient ──Command──▶ ┌────────────────────────────┐
//!   (handles)               │         ClientTask         │──▶ Connection (write)
//!                           │  Supervisor   Heartbeat    │
//!   Connection ─ReaderEvent▶│  Tokens       Subscriptions│
//!   (read loop)             └──────────────┬─────────────┘
//!                                          │ EventDispatcher
//!                         quotes / events / acks / alerts broadcast streams
//! ```
//!
//! Every socket gets a fresh generation number; frames and task results
//! tagged with an older generation are discarded, so a delta sent during a
//! reconnect can never reach the new socket ahead of the full replay.
//!
//! # Quick Start
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use futures_util::StreamExt;
//! use live_ws::auth::{Credential, StaticCredentialProvider};
//! use live_ws::types::Channel;
//! use live_ws::ws::client::LiveClient;
//!
//! # #[tokio::main]
//! # async fn main() -> live_ws::error::Result<()> {
//! let credential = Credential::new("bearer-token", Utc::now() + Duration::hours(1));
//! let client = LiveClient::builder(StaticCredentialProvider::new(credential))
//!     .base_url("wss://api.example.com/api/v1")
//!     .build();
//!
//! let mut quotes = client.quote_updates();
//! client.connect().await?;
//!
//! let mut state = client.connection_state();
//! state.wait_for(|s| s.is_connected()).await.ok();
//! client.subscribe(&[Channel::Quotes], &["AAPL", "MSFT"]).await?;
//!
//! while let Some(quote) = quotes.next().await {
//!     println!("{} {}", quote.symbol, quote.price_usd);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::auth::{Credential, CredentialProvider};
use crate::constants::{close_codes, defaults};
use crate::error::{LiveError, Result};
use crate::types::enums::{Channel, ConnectionState, EventKind, FrameType};
use crate::types::events::QuoteUpdate;
use crate::ws::codec::{Envelope, OutboundFrame, parse_timestamp};
use crate::ws::config::{LiveClientBuilder, LiveConfig};
use crate::ws::connection::{Connection, Inbound, ReaderEvent};
use crate::ws::dispatcher::{ClientAlert, EventDispatcher, EventStream};
use crate::ws::heartbeat::HeartbeatMonitor;
use crate::ws::subscription::{SubscriptionManager, SubscriptionSet};
use crate::ws::supervisor::{Backoff, CloseClass, ReconnectAction, Supervisor, classify_close};
use crate::ws::token::TokenCoordinator;

// ---------------------------------------------------------------------------
// Messages into the client task
// ---------------------------------------------------------------------------

enum Command {
    Connect {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Subscribe {
        channels: Vec<Channel>,
        symbols: Option<Vec<String>>,
        reply: oneshot::Sender<Result<()>>,
    },
    Unsubscribe {
        channels: Vec<Channel>,
        symbols: Option<Vec<String>>,
        reply: oneshot::Sender<Result<()>>,
    },
    Subscriptions {
        reply: oneshot::Sender<SubscriptionSet>,
    },
}

/// Results of work the task spawned off its own loop.
enum TaskResult {
    Connected {
        generation: u64,
        result: Result<Established>,
    },
    CredentialRefreshed {
        session: u64,
        result: Result<Credential>,
    },
}

struct Established {
    connection: Connection,
    /// Set when a fresh credential had to be fetched for this connect.
    credential: Option<Credential>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to the live WebSocket client.
///
/// Clone it to give each consumer its own handle. The background task ends
/// when the last handle is dropped.
#[derive(Debug, Clone)]
pub struct LiveClient {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    dispatcher: EventDispatcher,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect { .. } => "Connect",
            Self::Stop { .. } => "Stop",
            Self::Subscribe { .. } => "Subscribe",
            Self::Unsubscribe { .. } => "Unsubscribe",
            Self::Subscriptions { .. } => "Subscriptions",
        };
        f.write_str(name)
    }
}

impl LiveClient {
    /// Start building a client around the given auth capability.
    pub fn builder(provider: impl CredentialProvider) -> LiveClientBuilder {
        LiveClientBuilder::new(provider)
    }

    pub(crate) fn spawn(
        config: LiveConfig,
        provider: Arc<dyn CredentialProvider>,
        credential: Option<Credential>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (reader_tx, reader_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (results_tx, results_rx) = mpsc::channel(16);

        let dispatcher = EventDispatcher::new(config.channel_capacity);
        let supervisor = Supervisor::new(Backoff::from_config(&config));
        let state = supervisor.watch();
        let margin = chrono::Duration::from_std(config.credential_expiry_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());

        let task = ClientTask {
            heartbeat: HeartbeatMonitor::new(config.heartbeat_interval, config.heartbeat_grace),
            tokens: TokenCoordinator::new(credential, margin),
            subscriptions: SubscriptionManager::new(&config.server_default_channels),
            dispatcher: dispatcher.clone(),
            supervisor,
            provider,
            config,
            commands: commands_rx,
            reader_tx,
            reader_rx,
            results_tx,
            results_rx,
            connection: None,
            attempt: None,
            retry_at: None,
            generation: 0,
            session: 0,
        };
        tokio::spawn(task.run());

        Self {
            commands: commands_tx,
            state,
            dispatcher,
        }
    }

    /// Start connecting. Returns once the client has left `disconnected`;
    /// watch [`connection_state`](Self::connection_state) for the outcome.
    ///
    /// Has no effect if the client is already running. After a fatal close
    /// this is the only way to resume.
    pub async fn connect(&self) -> Result<()> {
        self.request(|reply| Command::Connect { reply }).await
    }

    /// Close the socket, cancel pending retries and timers, and reset the
    /// desired subscriptions to the server defaults.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Add channels (and, for [`Channel::Quotes`], symbols) to the desired set.
    ///
    /// If connected, a `subscribe` frame for the new part only is sent. If
    /// not, the desired set is still updated and replayed on the next
    /// connect, and [`LiveError::NotConnected`] is returned.
    pub async fn subscribe(&self, channels: &[Channel], symbols: &[&str]) -> Result<()> {
        let (channels, symbols) = Self::owned_args(channels, symbols);
        self.request(|reply| Command::Subscribe {
            channels,
            symbols,
            reply,
        })
        .await?
    }

    /// Remove channels from the desired set, or only the given symbols when
    /// `symbols` is non-empty.
    ///
    /// Same connected/disconnected behaviour as [`subscribe`](Self::subscribe).
    pub async fn unsubscribe(&self, channels: &[Channel], symbols: &[&str]) -> Result<()> {
        let (channels, symbols) = Self::owned_args(channels, symbols);
        self.request(|reply| Command::Unsubscribe {
            channels,
            symbols,
            reply,
        })
        .await?
    }

    /// Snapshot of the desired subscription set.
    pub async fn subscriptions(&self) -> Result<SubscriptionSet> {
        self.request(|reply| Command::Subscriptions { reply }).await
    }

    /// Read-only observer of the connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Decoded `quote_updated` events.
    pub fn quote_updates(&self) -> EventStream<QuoteUpdate> {
        self.dispatcher.quote_updates()
    }

    /// All `event` and `error` envelopes.
    pub fn event_updates(&self) -> EventStream<Envelope> {
        self.dispatcher.event_updates()
    }

    /// All `ack` envelopes.
    pub fn ack_updates(&self) -> EventStream<Envelope> {
        self.dispatcher.ack_updates()
    }

    /// Fatal closes, rate limiting and credential failures.
    pub fn alerts(&self) -> EventStream<ClientAlert> {
        self.dispatcher.alerts()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| LiveError::ClientClosed)?;
        rx.await.map_err(|_| LiveError::ClientClosed)
    }

    fn owned_args(channels: &[Channel], symbols: &[&str]) -> (Vec<Channel>, Option<Vec<String>>) {
        let symbols = if symbols.is_empty() {
            None
        } else {
            Some(symbols.iter().map(|s| (*s).to_owned()).collect())
        };
        (channels.to_vec(), symbols)
    }
}

// ---------------------------------------------------------------------------
// Client task
// ---------------------------------------------------------------------------

struct ClientTask {
    config: LiveConfig,
    provider: Arc<dyn CredentialProvider>,
    commands: mpsc::Receiver<Command>,
    reader_tx: mpsc::Sender<ReaderEvent>,
    reader_rx: mpsc::Receiver<ReaderEvent>,
    results_tx: mpsc::Sender<TaskResult>,
    results_rx: mpsc::Receiver<TaskResult>,
    dispatcher: EventDispatcher,
    supervisor: Supervisor,
    heartbeat: HeartbeatMonitor,
    tokens: TokenCoordinator,
    subscriptions: SubscriptionManager,
    connection: Option<Connection>,
    /// The in-flight connect attempt.
    attempt: Option<JoinHandle<()>>,
    /// When the backoff timer fires.
    retry_at: Option<Instant>,
    /// Bumped for every socket and on stop.
    generation: u64,
    /// Bumped on stop; outlives reconnects.
    session: u64,
}

impl ClientTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = self.reader_rx.recv() => self.handle_reader_event(event).await,
                Some(result) = self.results_rx.recv() => self.handle_task_result(result).await,
                () = sleep_until(self.heartbeat.deadline()) => self.on_heartbeat_timeout().await,
                () = sleep_until(self.retry_at) => self.begin_connect(),
            }
        }

        self.stop().await;
        tracing::debug!("Live client task finished");
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        tracing::trace!(?command, "Handling command");
        match command {
            Command::Connect { reply } => {
                if self.supervisor.state() == ConnectionState::Disconnected {
                    self.begin_connect();
                } else {
                    tracing::debug!(state = %self.supervisor.state(), "Already running");
                }
                let _ = reply.send(());
            }
            Command::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            Command::Subscribe {
                channels,
                symbols,
                reply,
            } => {
                let result = match self.subscriptions.subscribe(&channels, symbols.as_deref()) {
                    Ok(Some(frame)) => self.send(&frame).await,
                    Ok(None) => Ok(()),
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::Unsubscribe {
                channels,
                symbols,
                reply,
            } => {
                let result = match self.subscriptions.unsubscribe(&channels, symbols.as_deref()) {
                    Some(frame) => self.send(&frame).await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            Command::Subscriptions { reply } => {
                let _ = reply.send(self.subscriptions.desired().clone());
            }
        }
    }

    /// Write a frame on the current socket.
    async fn send(&mut self, frame: &OutboundFrame) -> Result<()> {
        match self.connection.as_mut() {
            Some(connection) if self.supervisor.state() == ConnectionState::Connected => {
                connection.send(frame).await
            }
            _ => {
                tracing::debug!(frame = frame.label(), "Not connected; frame not sent");
                Err(LiveError::NotConnected)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Connecting
    // -----------------------------------------------------------------------

    fn begin_connect(&mut self) {
        self.retry_at = None;
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        self.generation += 1;
        let generation = self.generation;
        self.supervisor.on_connecting();

        let cached = self.tokens.valid_credential(Utc::now());
        tracing::info!(generation, needs_credential = cached.is_none(), "Connecting");

        let provider = Arc::clone(&self.provider);
        let config = self.config.clone();
        let results = self.results_tx.clone();
        self.attempt = Some(tokio::spawn(async move {
            let result = establish(&config, provider.as_ref(), cached, generation).await;
            let _ = results
                .send(TaskResult::Connected { generation, result })
                .await;
        }));
    }

    async fn on_established(&mut self, established: Established) {
        let Established {
            mut connection,
            credential,
        } = established;
        if let Some(credential) = credential {
            self.tokens.install(credential);
        }
        connection.start_reader(self.reader_tx.clone());
        self.connection = Some(connection);
        self.heartbeat.arm(Instant::now());
        self.supervisor.on_connected();
        self.resubscribe_all().await;
    }

    /// Replay the whole desired set on a fresh socket.
    async fn resubscribe_all(&mut self) {
        let frames = self.subscriptions.resubscribe_frames();
        tracing::info!(
            generation = self.generation,
            frames = frames.len(),
            channels = self.subscriptions.desired().len(),
            "Replaying subscriptions"
        );
        for frame in frames {
            if let Err(e) = self.send(&frame).await {
                tracing::warn!(frame = frame.label(), error = %e, "Failed to replay subscription");
            }
        }
    }

    fn schedule_retry(&mut self, delay: Duration) {
        self.retry_at = Some(Instant::now() + delay);
        tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
    }

    // -----------------------------------------------------------------------
    // Task results
    // -----------------------------------------------------------------------

    async fn handle_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Connected { generation, result } => {
                if generation != self.generation
                    || self.supervisor.state() != ConnectionState::Connecting
                {
                    tracing::debug!(generation, "Discarding superseded connect attempt");
                    return;
                }
                self.attempt = None;
                match result {
                    Ok(established) => self.on_established(established).await,
                    Err(e) => {
                        if let LiveError::Credential(message) = &e {
                            self.dispatcher.alert(ClientAlert::CredentialRefreshFailed {
                                message: message.clone(),
                            });
                        }
                        tracing::warn!(generation, error = %e, "Connect attempt failed");
                        let delay = self.supervisor.on_connect_failed();
                        self.schedule_retry(delay);
                    }
                }
            }
            TaskResult::CredentialRefreshed { session, result } => {
                if session != self.session {
                    tracing::debug!("Discarding credential refreshed for a stopped session");
                    return;
                }
                self.tokens.end_refresh();
                match result {
                    Ok(credential) => {
                        let frame = OutboundFrame::RefreshToken {
                            token: credential.token().to_owned(),
                        };
                        self.tokens.install(credential);
                        match self.send(&frame).await {
                            Ok(()) => self.tokens.mark_sent(),
                            Err(e) => {
                                tracing::debug!(error = %e, "Refreshed credential kept for the next connect");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Credential refresh failed");
                        self.dispatcher.alert(ClientAlert::CredentialRefreshFailed {
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    async fn handle_reader_event(&mut self, event: ReaderEvent) {
        if event.generation != self.generation || self.connection.is_none() {
            tracing::debug!(generation = event.generation, "Discarding stale frame");
            return;
        }
        match event.inbound {
            Inbound::Frame(envelope) => self.on_frame(envelope).await,
            Inbound::Closed { code, reason } => self.on_closed(code, reason),
        }
    }

    async fn on_frame(&mut self, envelope: Envelope) {
        match envelope.kind() {
            Some(kind) if kind.is_system() => self.on_system(kind, envelope).await,
            _ => {
                if envelope.frame_type == FrameType::Error && self.tokens.reject_pending() {
                    tracing::warn!(id = %envelope.id, "Server rejected token refresh");
                    self.dispatcher
                        .alert(ClientAlert::RefreshRejected(envelope.clone()));
                }
                self.dispatcher.dispatch(envelope);
            }
        }
    }

    async fn on_system(&mut self, kind: EventKind, envelope: Envelope) {
        match kind {
            EventKind::Connected => {
                let Some(secs) = envelope.data_seconds("heartbeat_interval") else {
                    return;
                };
                let max = Duration::from_secs(defaults::MAX_HEARTBEAT_INTERVAL_SECS);
                match Duration::try_from_secs_f64(secs) {
                    Ok(interval) if !interval.is_zero() && interval <= max => {
                        self.heartbeat.set_interval(interval, Instant::now());
                        tracing::info!(
                            interval_ms = interval.as_millis() as u64,
                            timeout_ms = self.heartbeat.timeout().as_millis() as u64,
                            "Server welcome"
                        );
                    }
                    _ => {
                        tracing::warn!(
                            heartbeat_interval = secs,
                            "Ignoring out-of-range heartbeat interval"
                        );
                    }
                }
            }
            EventKind::Heartbeat => {
                self.heartbeat.on_heartbeat(Instant::now());
                if let Err(e) = self.send(&OutboundFrame::Pong).await {
                    tracing::warn!(error = %e, "Failed to answer heartbeat");
                }
            }
            EventKind::TokenExpiring => {
                let expires_in = envelope.data_seconds("expires_in_seconds");
                tracing::info!(?expires_in, "Server announced token expiry");
                self.start_token_refresh();
            }
            EventKind::TokenRefreshed => {
                let expires_at = envelope
                    .data
                    .get("expires_at")
                    .and_then(Value::as_str)
                    .and_then(|raw| parse_timestamp(raw).ok())
                    .or_else(|| {
                        let secs = envelope.data_seconds("expires_in_seconds")?;
                        let lifetime = chrono::Duration::try_milliseconds((secs * 1000.0) as i64)?;
                        envelope.timestamp.checked_add_signed(lifetime)
                    });
                self.tokens.confirm(expires_at);
                tracing::info!(?expires_at, "Server confirmed token refresh");
            }
            EventKind::ServerShutdown => {
                tracing::info!("Server announced shutdown; expecting close");
            }
            _ => {}
        }
    }

    fn start_token_refresh(&mut self) {
        if !self.tokens.begin_refresh() {
            tracing::debug!("Token refresh already in flight");
            return;
        }
        let provider = Arc::clone(&self.provider);
        let results = self.results_tx.clone();
        let session = self.session;
        tokio::spawn(async move {
            let result = provider.refresh_credential().await;
            let _ = results
                .send(TaskResult::CredentialRefreshed { session, result })
                .await;
        });
    }

    // -----------------------------------------------------------------------
    // Disconnecting
    // -----------------------------------------------------------------------

    fn on_closed(&mut self, code: Option<u16>, reason: String) {
        self.connection = None;
        self.heartbeat.disarm();

        let class = classify_close(code);
        match self.supervisor.on_closed(class) {
            ReconnectAction::Halt => {
                tracing::error!(?code, %reason, "Fatal close; not reconnecting");
                self.dispatcher.alert(ClientAlert::Fatal {
                    code: code.unwrap_or_default(),
                    reason,
                });
            }
            ReconnectAction::Retry {
                delay,
                refresh_credential,
            } => {
                if refresh_credential {
                    self.tokens.invalidate();
                }
                if class == CloseClass::RateLimited {
                    tracing::warn!(delay_ms = delay.as_millis() as u64, "Rate limited by server");
                    self.dispatcher.alert(ClientAlert::RateLimited { delay });
                } else {
                    tracing::info!(?code, %reason, "Connection closed");
                }
                self.schedule_retry(delay);
            }
        }
    }

    async fn on_heartbeat_timeout(&mut self) {
        self.heartbeat.disarm();
        tracing::warn!(
            generation = self.generation,
            timeout_ms = self.heartbeat.timeout().as_millis() as u64,
            "No heartbeat within timeout; closing connection"
        );
        if let Some(connection) = self.connection.take() {
            connection
                .close(close_codes::NORMAL, "heartbeat timeout")
                .await;
        }
        if let ReconnectAction::Retry { delay, .. } = self.supervisor.on_closed(CloseClass::Transient)
        {
            self.schedule_retry(delay);
        }
    }

    async fn stop(&mut self) {
        self.session += 1;
        self.generation += 1;
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        self.retry_at = None;
        self.heartbeat.disarm();
        self.tokens.reset();
        self.subscriptions.reset();
        if let Some(connection) = self.connection.take() {
            connection.close(close_codes::NORMAL, "client stopped").await;
        }
        self.supervisor.on_stopped();
    }
}

/// Obtain a credential if needed, then open the socket.
async fn establish(
    config: &LiveConfig,
    provider: &dyn CredentialProvider,
    cached: Option<Credential>,
    generation: u64,
) -> Result<Established> {
    let (credential, fresh) = match cached {
        Some(credential) => (credential, false),
        None => {
            let credential = provider.refresh_credential().await.map_err(|e| match e {
                LiveError::Credential(_) => e,
                other => LiveError::Credential(other.to_string()),
            })?;
            (credential, true)
        }
    };
    let url = config.endpoint_url(&credential)?;
    let connection = Connection::open(&url, generation, config.connect_timeout).await?;
    Ok(Established {
        connection,
        credential: fresh.then_some(credential),
    })
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
