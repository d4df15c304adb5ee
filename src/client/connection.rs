use crate::types::{RealtimeError, error::Result};
use crate::types::constants::WS_CLOSE_NORMAL;
use crate::websocket::WsStream;
use futures::SinkExt;
use futures::stream::SplitSink;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tungstenite::Message;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

/// Public lifecycle status of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Socket-level state, mirrors the WebSocket `readyState`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

type WsWriter = SplitSink<WsStream, Message>;

pub struct ConnectionManager {
    ws_write: Arc<RwLock<Option<WsWriter>>>,
    state: Arc<RwLock<ConnectionState>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            ws_write: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::Closed)),
        }
    }

    /// Moves Closed/Closing to Connecting. Returns false when a socket is already
    /// open or being opened.
    pub async fn begin_connect(&self) -> bool {
        let mut state = self.state.write().await;
        match *state {
            ConnectionState::Open | ConnectionState::Connecting => false,
            ConnectionState::Closed | ConnectionState::Closing => {
                *state = ConnectionState::Connecting;
                true
            }
        }
    }

    /// Sets the WebSocket write sink (called after successful connection)
    pub async fn set_writer(&self, writer: WsWriter) {
        let mut ws = self.ws_write.write().await;
        *ws = Some(writer);
    }

    /// Gets the current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Sets the connection state
    pub async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().await;
        *state = new_state;
    }

    /// Checks if currently connected
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Open
    }

    /// Writes a text frame
    pub async fn send_text(&self, text: String) -> Result<()> {
        let mut ws_guard = self.ws_write.write().await;
        match ws_guard.as_mut() {
            Some(ws) => {
                ws.send(Message::Text(text.into())).await?;
                Ok(())
            }
            None => Err(RealtimeError::NotConnected),
        }
    }

    /// Closes the WebSocket with normal closure (1000)
    pub async fn close(&self) -> Result<()> {
        self.set_state(ConnectionState::Closing).await;

        let mut ws_guard = self.ws_write.write().await;
        let result = match ws_guard.as_mut() {
            Some(ws) => {
                let frame = CloseFrame {
                    code: CloseCode::from(WS_CLOSE_NORMAL),
                    reason: "".into(),
                };
                // The peer may already be gone; the sink is dropped either way.
                match ws.send(Message::Close(Some(frame))).await {
                    Ok(()) => ws.close().await.map_err(RealtimeError::from),
                    Err(e) => Err(RealtimeError::from(e)),
                }
            }
            None => Ok(()),
        };
        *ws_guard = None;
        drop(ws_guard);

        self.set_state(ConnectionState::Closed).await;
        result
    }

    /// Clears the writer after the peer closed the socket
    pub async fn clear_writer(&self) {
        let mut ws = self.ws_write.write().await;
        *ws = None;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
