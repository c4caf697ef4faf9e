//! WebSocket connection manager.
//!
//! One manager owns one exchange stream. `connect` spawns the run loop,
//! which cycles `Connecting → Open → Disconnected` and waits a fixed delay
//! between attempts. Only `disconnect` ends the loop.

use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tickerhub_core::BoxFuture;
use tickerhub_telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consumer side of a stream connection.
///
/// `subscriptions` is asked again after every successful (re)connect, so
/// the subscribed symbol set follows the latest catalog.
pub trait StreamSession: Send + Sync + 'static {
    /// Subscription frames to send once the socket is open.
    fn subscriptions(&self) -> BoxFuture<'_, Vec<String>>;

    /// Handle one inbound text frame. Must not fail the connection.
    fn on_message(&self, text: &str);
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Exchange label used in logs and metrics.
    pub exchange: String,
    /// WebSocket URL.
    pub url: String,
    /// Fixed delay before every reconnect attempt.
    pub reconnect_delay_ms: u64,
    /// Idle time before a heartbeat ping is sent.
    pub heartbeat_interval_ms: u64,
    /// Unanswered ping limit before the connection is considered dead.
    pub heartbeat_timeout_ms: u64,
    /// Application-level ping frame. `None` sends a protocol ping.
    pub ping_payload: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            exchange: String::new(),
            url: String::new(),
            reconnect_delay_ms: 5000,
            heartbeat_interval_ms: 30000,
            heartbeat_timeout_ms: 10000,
            ping_payload: None,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct RunHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: RwLock<ConnectionState>,
    heartbeat: HeartbeatManager,
    reconnect_count: RwLock<u32>,
    run: Mutex<Option<RunHandle>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        let heartbeat =
            HeartbeatManager::new(config.heartbeat_interval_ms, config.heartbeat_timeout_ms);
        Metrics::stream_state(&config.exchange, ConnectionState::Disconnected.as_str());
        Self {
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            heartbeat,
            reconnect_count: RwLock::new(0),
            run: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// True while the socket is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Reconnect attempts scheduled since creation.
    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Start the connection loop for `session`.
    ///
    /// Only valid while `Disconnected` with no loop running. The loop keeps
    /// reconnecting until `disconnect` is called.
    pub fn connect(self: &Arc<Self>, session: Arc<dyn StreamSession>) -> WsResult<()> {
        let mut run = self.run.lock();

        let state = self.state();
        let loop_alive = run.as_ref().is_some_and(|h| !h.task.is_finished());
        if state != ConnectionState::Disconnected || loop_alive {
            return Err(WsError::InvalidState(state));
        }

        let token = CancellationToken::new();
        self.set_state(ConnectionState::Connecting);

        let manager = Arc::clone(self);
        let loop_token = token.clone();
        let task = tokio::spawn(async move {
            manager.run_loop(session, loop_token).await;
        });

        *run = Some(RunHandle { token, task });
        Ok(())
    }

    /// Stop the stream: `Closing`, close the socket, end in `Disconnected`.
    ///
    /// Cancels any pending reconnect. Safe to call when not connected.
    pub async fn disconnect(&self) {
        let handle = self.run.lock().take();

        if let Some(handle) = handle {
            info!(exchange = %self.config.exchange, "Stream disconnect requested");
            self.set_state(ConnectionState::Closing);
            handle.token.cancel();
            if let Err(e) = handle.task.await {
                error!(exchange = %self.config.exchange, ?e, "Stream task ended abnormally");
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(exchange = %self.config.exchange, from = %previous, to = %state, "Stream state");
            Metrics::stream_state(&self.config.exchange, state.as_str());
        }
    }

    async fn run_loop(&self, session: Arc<dyn StreamSession>, token: CancellationToken) {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);

        loop {
            if token.is_cancelled() {
                break;
            }

            self.set_state(ConnectionState::Connecting);

            match self.try_connect(session.as_ref(), &token).await {
                Ok(()) => info!(exchange = %self.config.exchange, "WebSocket connection closed"),
                Err(e) => {
                    warn!(exchange = %self.config.exchange, error = %e, "WebSocket connection lost")
                }
            }

            if token.is_cancelled() {
                break;
            }

            self.set_state(ConnectionState::Disconnected);
            *self.reconnect_count.write() += 1;
            Metrics::stream_reconnect(&self.config.exchange);
            warn!(
                exchange = %self.config.exchange,
                delay_ms = self.config.reconnect_delay_ms,
                "Reconnecting"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = token.cancelled() => {
                    info!(exchange = %self.config.exchange, "Shutdown requested during reconnect delay");
                    break;
                }
            }
        }

        // A running disconnect() owns the final transition.
        if self.state() != ConnectionState::Closing {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    async fn try_connect(
        &self,
        session: &dyn StreamSession,
        token: &CancellationToken,
    ) -> WsResult<()> {
        info!(exchange = %self.config.exchange, url = %self.config.url, "Connecting to WebSocket");

        let connecting = connect_async_tls_with_config(&self.config.url, None, true, None);
        let (ws_stream, _response) = tokio::select! {
            () = token.cancelled() => return Ok(()),
            res = connecting => res?,
        };
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Open);
        self.heartbeat.reset();
        info!(exchange = %self.config.exchange, "WebSocket connected");

        let frames = session.subscriptions().await;
        info!(exchange = %self.config.exchange, frames = frames.len(), "Sending subscriptions");
        for frame in frames {
            write.send(Message::Text(frame)).await?;
        }

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    info!(exchange = %self.config.exchange, "Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.heartbeat.record_message();
                            session.on_message(&text);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.heartbeat.record_message();
                            debug!(len = data.len(), "Ignoring binary frame");
                        }
                        Some(Ok(Message::Ping(data))) => {
                            self.heartbeat.record_message();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_message();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(exchange = %self.config.exchange, code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(exchange = %self.config.exchange, ?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!(exchange = %self.config.exchange, "WebSocket stream ended");
                            return Ok(());
                        }
                    }
                }

                _ = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        error!(exchange = %self.config.exchange, "Heartbeat timeout");
                        return Err(WsError::HeartbeatTimeout);
                    }

                    if self.heartbeat.should_send_heartbeat() {
                        let ping = match &self.config.ping_payload {
                            Some(payload) => Message::Text(payload.clone()),
                            None => Message::Ping(Vec::new()),
                        };
                        write.send(ping).await?;
                        self.heartbeat.record_ping();
                        debug!(exchange = %self.config.exchange, "Sent heartbeat ping");
                    }
                }
            }
        }
    }
}
