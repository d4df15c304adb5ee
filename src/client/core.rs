use super::{
    ChannelCallbacks, ChannelOptions, ClientState, ConnectionManager, ConnectionState,
    ConnectionStatus, RealtimeClientBuilder,
};
use crate::infrastructure::HeartbeatManager;
use crate::messaging::router::dispatch;
use crate::messaging::{ChannelEvent, CloseInfo, MessageRouter, describe_close_code};
use crate::types::constants::EVENT_BUFFER_SIZE;
use crate::types::{Outbound, Payload, Result};
use crate::websocket::{WebSocketFactory, WsStream};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::SplitStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, oneshot, watch};
use tungstenite::Message;
use uuid::Uuid;

const CONNECTION_ERROR_MESSAGE: &str = "WebSocket connection error";

/// What happens after a socket closes
enum CloseDecision {
    Stop,
    Fatal(String),
    Retry { delay: Duration, attempt: u32 },
    Exhausted,
}

/// One logical WebSocket connection with reconnect and heartbeat bookkeeping.
///
/// The client never surfaces errors through its operations. Failures show up as
/// [`ConnectionStatus::Error`], [`last_error()`](Self::last_error) and `false` from
/// [`send()`](Self::send).
///
/// # Example
///
/// ```no_run
/// use agentdesk_realtime::{ChannelOptions, RealtimeClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::builder("wss://api.example.com", "/ws/activities/co_123?timeframe=7d")
///     .options(ChannelOptions {
///         auto_connect: false,
///         ..Default::default()
///     })
///     .build()?;
///
/// client.connect().await;
/// let mut events = client.on_event().await;
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) id: Uuid,
    pub(crate) endpoint: String,
    pub(crate) url: String,
    pub(crate) options: Arc<ChannelOptions>,
    pub(crate) callbacks: ChannelCallbacks,

    // Connection manager
    pub(crate) connection: Arc<ConnectionManager>,

    // Consolidated mutable state
    pub(crate) state: Arc<RwLock<ClientState>>,
}

impl RealtimeClient {
    /// Starts a builder for a channel at `base_url` + `endpoint`
    pub fn builder(base_url: impl Into<String>, endpoint: impl Into<String>) -> RealtimeClientBuilder {
        RealtimeClientBuilder::new(base_url, endpoint)
    }

    /// Shorthand for `builder(..).options(options).build()`
    pub fn new(
        base_url: impl Into<String>,
        endpoint: impl Into<String>,
        options: ChannelOptions,
    ) -> Result<Self> {
        RealtimeClientBuilder::new(base_url, endpoint)
            .options(options)
            .build()
    }

    /// Opens the socket. No-op while a socket is open or being opened.
    ///
    /// Resolves once the handshake has completed or failed. On success the status is
    /// [`ConnectionStatus::Connected`] and the reconnect attempt counter is reset.
    ///
    /// # Failures
    ///
    /// Nothing is returned. A failed handshake sets [`last_error()`](Self::last_error),
    /// emits [`ChannelEvent::Error`] and then an abnormal [`ChannelEvent::Close`], so the
    /// reconnect policy applies to it.
    ///
    /// The future is boxed because the reconnect task spawned from a close calls
    /// `connect()` again.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use agentdesk_realtime::{ChannelOptions, ConnectionStatus, RealtimeClient};
    /// # async fn example() -> agentdesk_realtime::Result<()> {
    /// let client = RealtimeClient::new(
    ///     "wss://api.example.com",
    ///     "/ws/tickets/co_123",
    ///     ChannelOptions { auto_connect: false, ..Default::default() },
    /// )?;
    /// client.connect().await;
    /// if client.status().await != ConnectionStatus::Connected {
    ///     eprintln!("not connected yet: {:?}", client.last_error().await);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.connect_inner())
    }

    async fn connect_inner(&self) {
        if !self.connection.begin_connect().await {
            tracing::debug!(channel = %self.id, "Already connected or connecting");
            return;
        }

        let generation = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.was_manual_disconnect = false;
            state.last_error = None;
            state.generation
        };
        self.set_status(ConnectionStatus::Connecting).await;
        tracing::info!(channel = %self.id, "Connecting to {}", self.endpoint);

        if let Err(e) = self.open_socket(generation).await {
            tracing::warn!(channel = %self.id, "Connection attempt failed: {}", e);
            let detail = e.to_string();
            self.handle_error(generation, &detail).await;
            self.handle_close(generation, CloseInfo::abnormal(detail)).await;
        }
    }

    async fn open_socket(&self, generation: u64) -> Result<()> {
        let ws_stream = WebSocketFactory::create(&self.url).await?;
        let (write_half, read_half) = ws_stream.split();

        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let listeners = {
            let mut state = self.state.write().await;
            if state.generation != generation {
                tracing::debug!(channel = %self.id, "Discarding socket opened for a superseded connect");
                return Ok(());
            }

            self.connection.set_writer(write_half).await;
            self.connection.set_state(ConnectionState::Open).await;

            let router = MessageRouter::new_with_state(
                Arc::clone(&self.state),
                self.callbacks.clone(),
                generation,
            );
            let client = self.clone();
            state.task_manager.spawn(async move {
                // Frames are read only after Connected/Open have been delivered
                let _ = ready_rx.await;
                tracing::debug!(channel = %client.id, "Starting read task");
                let close = client.read_frames(read_half, router, generation).await;
                client.handle_close(generation, close).await;
                tracing::debug!(channel = %client.id, "Read task finished");
            });

            state.stop_heartbeat();
            if !self.options.heartbeat_interval.is_zero() {
                let heartbeat = HeartbeatManager::new(Arc::downgrade(&self.connection))
                    .with_interval(self.options.heartbeat_interval);
                state.heartbeat_task = Some(heartbeat.spawn());
            }

            state.timer.reset();
            state.set_status(ConnectionStatus::Connected);
            state.listeners()
        };

        tracing::info!(channel = %self.id, "Connected to {}", self.endpoint);
        if let Some(on_status_change) = &self.callbacks.on_status_change {
            on_status_change(ConnectionStatus::Connected);
        }
        dispatch(&listeners, ChannelEvent::StatusChanged(ConnectionStatus::Connected));
        if let Some(on_open) = &self.callbacks.on_open {
            on_open();
        }
        dispatch(&listeners, ChannelEvent::Open);
        let _ = ready_tx.send(());
        Ok(())
    }

    async fn read_frames(
        &self,
        mut read_half: SplitStream<WsStream>,
        router: MessageRouter,
        generation: u64,
    ) -> CloseInfo {
        while let Some(msg_result) = read_half.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    tracing::debug!(channel = %self.id, "Received text message: {}", text.as_str());
                    router.route(text.as_str()).await;
                }
                Ok(Message::Close(frame)) => {
                    return match frame {
                        Some(frame) => {
                            let code = u16::from(frame.code);
                            tracing::info!(
                                channel = %self.id,
                                "Server closed connection: code={} ({}), reason='{}'",
                                code,
                                describe_close_code(code).unwrap_or("unknown"),
                                frame.reason.as_str()
                            );
                            CloseInfo {
                                code: Some(code),
                                reason: frame.reason.as_str().to_string(),
                                was_clean: true,
                            }
                        }
                        None => {
                            tracing::warn!(channel = %self.id, "Server closed connection without close frame");
                            CloseInfo {
                                code: None,
                                reason: String::new(),
                                was_clean: true,
                            }
                        }
                    };
                }
                Ok(Message::Binary(data)) => {
                    tracing::warn!(channel = %self.id, "Received unexpected binary message ({} bytes)", data.len());
                }
                Ok(Message::Ping(data)) => {
                    tracing::trace!("Received ping ({} bytes)", data.len());
                }
                Ok(Message::Pong(data)) => {
                    tracing::trace!("Received pong ({} bytes)", data.len());
                }
                Ok(Message::Frame(_)) => {
                    tracing::trace!("Received raw frame (internal)");
                }
                Err(e) => {
                    tracing::error!(channel = %self.id, "WebSocket read error: {}", e);
                    let detail = e.to_string();
                    self.handle_error(generation, &detail).await;
                    return CloseInfo::abnormal(detail);
                }
            }
        }
        CloseInfo::abnormal("connection ended without close frame")
    }

    /// Records a generic error. Never schedules a retry; the close that follows decides.
    async fn handle_error(&self, generation: u64, detail: &str) {
        let listeners = {
            let mut state = self.state.write().await;
            if state.generation != generation {
                return;
            }
            state.last_error = Some(CONNECTION_ERROR_MESSAGE.to_string());
            state.listeners()
        };

        if let Some(on_error) = &self.callbacks.on_error {
            on_error(detail);
        }
        dispatch(&listeners, ChannelEvent::Error(detail.to_string()));
    }

    async fn handle_close(&self, generation: u64, info: CloseInfo) {
        let (decision, listeners) = {
            let mut state = self.state.write().await;
            if state.generation != generation {
                tracing::debug!(channel = %self.id, "Ignoring close of superseded socket");
                return;
            }

            state.stop_heartbeat();
            self.connection.clear_writer().await;
            self.connection.set_state(ConnectionState::Closed).await;

            let code = info.effective_code();
            let decision = if state.was_manual_disconnect || !self.options.auto_reconnect {
                CloseDecision::Stop
            } else if self.options.is_fatal(code) {
                CloseDecision::Fatal(fatal_close_message(code, &info.reason))
            } else if state.timer.attempts() < self.options.max_reconnect_attempts {
                let delay = state.timer.next_delay(info.code);
                CloseDecision::Retry {
                    delay,
                    attempt: state.timer.attempts(),
                }
            } else {
                CloseDecision::Exhausted
            };
            (decision, state.listeners())
        };

        if let Some(on_close) = &self.callbacks.on_close {
            on_close(&info);
        }
        dispatch(&listeners, ChannelEvent::Close(info));

        match decision {
            CloseDecision::Stop => {
                self.update_status(Some(generation), ConnectionStatus::Disconnected, None)
                    .await;
            }
            CloseDecision::Fatal(message) => {
                tracing::error!(channel = %self.id, "{}", message);
                self.update_status(Some(generation), ConnectionStatus::Error, Some(message))
                    .await;
            }
            CloseDecision::Exhausted => {
                let message = format!(
                    "Failed to reconnect after {} attempts",
                    self.options.max_reconnect_attempts
                );
                tracing::error!(channel = %self.id, "{}", message);
                self.update_status(Some(generation), ConnectionStatus::Error, Some(message))
                    .await;
            }
            CloseDecision::Retry { delay, attempt } => {
                self.schedule_reconnect(generation, delay, attempt).await;
            }
        }
    }

    async fn schedule_reconnect(&self, generation: u64, delay: Duration, attempt: u32) {
        if !self
            .update_status(Some(generation), ConnectionStatus::Reconnecting, None)
            .await
        {
            return;
        }

        tracing::info!(
            channel = %self.id,
            "Reconnecting in {:?} (attempt {}/{})",
            delay,
            attempt,
            self.options.max_reconnect_attempts
        );

        let mut state = self.state.write().await;
        if state.generation != generation || state.was_manual_disconnect {
            return;
        }
        let client = self.clone();
        state.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.connect().await;
        }));
    }

    async fn set_status(&self, status: ConnectionStatus) {
        self.update_status(None, status, None).await;
    }

    /// Sets the status (and optionally the error) if `guard` still matches the current
    /// generation. Returns false when the guard was stale.
    async fn update_status(
        &self,
        guard: Option<u64>,
        status: ConnectionStatus,
        error: Option<String>,
    ) -> bool {
        let listeners = {
            let mut state = self.state.write().await;
            if let Some(generation) = guard
                && state.generation != generation
            {
                return false;
            }
            if error.is_some() {
                state.last_error = error;
            }
            if !state.set_status(status) {
                return true;
            }
            state.listeners()
        };

        tracing::debug!(channel = %self.id, "Status changed to {}", status);
        if let Some(on_status_change) = &self.callbacks.on_status_change {
            on_status_change(status);
        }
        dispatch(&listeners, ChannelEvent::StatusChanged(status));
        true
    }

    /// Closes the socket with code 1000 and suppresses auto-reconnect.
    ///
    /// Cancels any pending reconnect and stops the heartbeat. Safe to call repeatedly.
    /// Listeners get a normal [`ChannelEvent::Close`] only if a socket was open. The
    /// call never waits on listeners, so a receiver that is not being read cannot
    /// hold it up.
    ///
    /// # Failures
    ///
    /// A failed close handshake is logged and otherwise ignored. The status ends as
    /// [`ConnectionStatus::Disconnected`] either way.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use agentdesk_realtime::{ConnectionStatus, RealtimeClient};
    /// # async fn example(client: RealtimeClient) {
    /// client.disconnect().await;
    /// assert_eq!(client.status().await, ConnectionStatus::Disconnected);
    /// # }
    /// ```
    pub async fn disconnect(&self) {
        let was_open = {
            let mut state = self.state.write().await;
            state.was_manual_disconnect = true;
            state.generation += 1;
            state.abort_tasks();
            self.connection.state().await == ConnectionState::Open
        };

        if let Err(e) = self.connection.close().await {
            tracing::debug!(channel = %self.id, "Error while closing socket: {}", e);
        }
        self.set_status(ConnectionStatus::Disconnected).await;

        if was_open {
            tracing::info!(channel = %self.id, "Disconnected from {}", self.endpoint);
            let info = CloseInfo::normal();
            let listeners = self.state.write().await.listeners();
            if let Some(on_close) = &self.callbacks.on_close {
                on_close(&info);
            }
            dispatch(&listeners, ChannelEvent::Close(info));
        }
    }

    /// Tears the socket down, resets the attempt counter and connects again
    pub async fn reconnect(&self) {
        tracing::info!(channel = %self.id, "Manual reconnect requested");
        self.disconnect().await;
        self.state.write().await.timer.reset();
        tokio::time::sleep(self.options.reconnect_settle_delay).await;
        self.connect().await;
    }

    /// Writes a message as one text frame.
    ///
    /// Strings go out as-is, JSON values are serialized first.
    ///
    /// # Failures
    ///
    /// Returns `false` if the socket is not open, the message cannot be serialized or
    /// the write fails. Nothing is queued for a later connection.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use agentdesk_realtime::RealtimeClient;
    /// # async fn example(client: RealtimeClient) {
    /// let delivered = client
    ///     .send(serde_json::json!({"type": "message", "content": "hello"}))
    ///     .await;
    /// if !delivered {
    ///     eprintln!("channel is not open");
    /// }
    /// # }
    /// ```
    pub async fn send(&self, message: impl Into<Outbound>) -> bool {
        if !self.connection.is_connected().await {
            tracing::debug!(channel = %self.id, "Cannot send, socket is not open");
            return false;
        }

        let text = match message.into().into_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(channel = %self.id, "Failed to serialize outbound message: {}", e);
                return false;
            }
        };

        match self.connection.send_text(text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(channel = %self.id, "Failed to send message: {}", e);
                false
            }
        }
    }

    /// Registers an event listener.
    ///
    /// The receiver gets open/message/close/error/status events until it is dropped.
    pub async fn on_event(&self) -> mpsc::Receiver<ChannelEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        self.state.write().await.listeners.push(tx);
        rx
    }

    /// Aborts background tasks without awaiting. Used when no runtime is available.
    pub(crate) fn abort_now(&self) {
        match self.state.try_write() {
            Ok(mut state) => {
                state.was_manual_disconnect = true;
                state.generation += 1;
                state.abort_tasks();
            }
            Err(_) => tracing::warn!(channel = %self.id, "Channel state busy, tasks not aborted"),
        }
    }

    /// Per-client id, also used as the `channel` field in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Endpoint path as given to the builder
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fully resolved socket URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reconnect, heartbeat and close-code policy this channel runs with
    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Current connection status
    pub async fn status(&self) -> ConnectionStatus {
        self.state.read().await.status
    }

    /// Subscribes to status changes. The receiver starts at the current status.
    pub async fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.state.read().await.status_tx.subscribe()
    }

    /// True while the socket is open and writable
    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    /// Last payload delivered to consumers. Pongs never land here.
    pub async fn latest(&self) -> Option<Payload> {
        self.state.read().await.latest.clone()
    }

    /// When [`latest()`](Self::latest) was last replaced
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_update
    }

    /// Error text of the last failure, cleared by the next `connect()`
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Reconnect attempts since the last successful open
    pub async fn reconnect_attempts(&self) -> u32 {
        self.state.read().await.timer.attempts()
    }
}

fn fatal_close_message(code: u16, reason: &str) -> String {
    let description = describe_close_code(code).unwrap_or("connection rejected");
    if reason.is_empty() {
        format!("Connection closed by server ({}): {}", code, description)
    } else {
        format!("Connection closed by server ({}): {} - {}", code, description, reason)
    }
}
