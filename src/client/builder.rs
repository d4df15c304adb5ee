use super::{ClientState, ConnectionManager, ConnectionStatus, RealtimeClient};
use crate::infrastructure::{BackoffStrategy, ReconnectTimer};
use crate::messaging::CloseInfo;
use crate::types::constants::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, HEARTBEAT_INTERVAL,
    RECONNECT_SETTLE_DELAY,
};
use crate::types::{Payload, Result};
use crate::websocket::WebSocketFactory;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Per-channel configuration. Immutable once the client is built.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Open the socket as soon as the client is built
    pub auto_connect: bool,
    /// Reconnect after closes that were not requested through `disconnect()`
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    /// Base reconnect delay
    pub reconnect_delay: Duration,
    /// Ping interval; zero disables the heartbeat
    pub heartbeat_interval: Duration,
    pub backoff: BackoffStrategy,
    /// Close codes that end the channel in `Error` without retrying
    pub fatal_close_codes: Vec<u16>,
    /// Pause between teardown and reopen in `reconnect()`
    pub reconnect_settle_delay: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            auto_connect: true,
            auto_reconnect: true,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY),
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            backoff: BackoffStrategy::Exponential,
            fatal_close_codes: Vec::new(),
            reconnect_settle_delay: Duration::from_millis(RECONNECT_SETTLE_DELAY),
        }
    }
}

impl ChannelOptions {
    pub fn is_fatal(&self, close_code: u16) -> bool {
        self.fatal_close_codes.contains(&close_code)
    }

    pub(crate) fn timer(&self) -> ReconnectTimer {
        ReconnectTimer::new(self.reconnect_delay, self.backoff.clone())
    }
}

pub type MessageCallback = Arc<dyn Fn(&Payload) + Send + Sync + 'static>;
pub type OpenCallback = Arc<dyn Fn() + Send + Sync + 'static>;
pub type CloseCallback = Arc<dyn Fn(&CloseInfo) + Send + Sync + 'static>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync + 'static>;
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync + 'static>;

/// Optional lifecycle hooks. Invoked outside of any internal lock.
#[derive(Clone, Default)]
pub struct ChannelCallbacks {
    pub on_message: Option<MessageCallback>,
    pub on_open: Option<OpenCallback>,
    pub on_close: Option<CloseCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_status_change: Option<StatusCallback>,
}

impl ChannelCallbacks {
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(f));
        self
    }

    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&CloseInfo) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_status_change<F>(mut self, f: F) -> Self
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.on_status_change = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for ChannelCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCallbacks")
            .field("on_message", &self.on_message.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_status_change", &self.on_status_change.is_some())
            .finish()
    }
}

/// Builder for RealtimeClient that handles initialization
pub struct RealtimeClientBuilder {
    base_url: String,
    endpoint: String,
    options: ChannelOptions,
    callbacks: ChannelCallbacks,
}

impl RealtimeClientBuilder {
    /// Create a new builder. `endpoint` may be absolute (`ws(s)://`) or relative to `base_url`.
    pub fn new(base_url: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: endpoint.into(),
            options: ChannelOptions::default(),
            callbacks: ChannelCallbacks::default(),
        }
    }

    pub fn options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn callbacks(mut self, callbacks: ChannelCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Build the client. With `auto_connect` the first connect is spawned, so this must
    /// run inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint is empty or does not resolve to a valid URL.
    pub fn build(self) -> Result<RealtimeClient> {
        let url = WebSocketFactory::build_url(&self.base_url, &self.endpoint)?;

        let (status_tx, _status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let client_state = ClientState::new(self.options.timer(), status_tx);

        let client = RealtimeClient {
            id: uuid::Uuid::new_v4(),
            endpoint: self.endpoint,
            url,
            options: Arc::new(self.options),
            callbacks: self.callbacks,
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(client_state)),
        };

        if client.options.auto_connect {
            let client_for_connect = client.clone();
            tokio::spawn(async move {
                client_for_connect.connect().await;
            });
        }

        Ok(client)
    }
}
