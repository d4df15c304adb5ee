//! Live chat signaling with one voice agent.
//!
//! A [`RealtimeClient`] configured with the chat channel's policy: a fixed retry delay when
//! the server is restarting or going away, exponential backoff otherwise, and no retries at
//! all once the server rejects the credentials.

use crate::client::{ChannelGuard, ChannelOptions, ConnectionStatus, RealtimeClient};
use crate::domain::encode;
use crate::infrastructure::BackoffStrategy;
use crate::messaging::ChannelEvent;
use crate::types::constants::{
    EVENT_BUFFER_SIZE, WS_CLOSE_FORBIDDEN, WS_CLOSE_GOING_AWAY, WS_CLOSE_POLICY_VIOLATION,
    WS_CLOSE_SERVICE_RESTART, WS_CLOSE_UNAUTHORIZED,
};
use crate::types::{Payload, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::ops::Deref;
use tokio::sync::mpsc;

/// Credentials that select one agent's chat channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentChatParams {
    pub client_id: String,
    pub api_key: String,
    pub agent_id: String,
}

pub fn agent_chat_endpoint(params: &AgentChatParams) -> String {
    format!(
        "/ws/agent-chat?client_id={}&api_key={}&agent_id={}",
        encode(&params.client_id),
        encode(&params.api_key),
        encode(&params.agent_id)
    )
}

/// Channel policy of the chat signaling socket
pub fn agent_chat_options() -> ChannelOptions {
    ChannelOptions {
        backoff: BackoffStrategy::CloseCodeAware {
            fixed_codes: vec![WS_CLOSE_GOING_AWAY, WS_CLOSE_SERVICE_RESTART],
        },
        fatal_close_codes: vec![
            WS_CLOSE_POLICY_VIOLATION,
            WS_CLOSE_UNAUTHORIZED,
            WS_CLOSE_FORBIDDEN,
        ],
        ..Default::default()
    }
}

/// Decoded chat traffic
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message {
        content: String,
        sender: Option<String>,
        timestamp: Option<i64>,
    },
    Typing {
        is_typing: bool,
    },
    AgentStatus {
        status: String,
    },
    Error {
        message: String,
    },
    /// Status of the underlying channel
    Connection(ConnectionStatus),
    /// Any other payload, unchanged
    Other(Payload),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    #[serde(alias = "chat_message", alias = "response")]
    Message {
        #[serde(alias = "text", alias = "message")]
        content: String,
        #[serde(default, alias = "role")]
        sender: Option<String>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Typing {
        #[serde(default)]
        is_typing: bool,
    },
    #[serde(alias = "status")]
    AgentStatus { status: String },
    Error {
        #[serde(alias = "error")]
        message: String,
    },
}

impl ChatEvent {
    pub fn from_payload(payload: Payload) -> Self {
        let wire = payload
            .as_json()
            .and_then(|value| WireEvent::deserialize(value).ok());

        match wire {
            Some(WireEvent::Message {
                content,
                sender,
                timestamp,
            }) => Self::Message {
                content,
                sender,
                timestamp,
            },
            Some(WireEvent::Typing { is_typing }) => Self::Typing { is_typing },
            Some(WireEvent::AgentStatus { status }) => Self::AgentStatus { status },
            Some(WireEvent::Error { message }) => Self::Error { message },
            None => Self::Other(payload),
        }
    }
}

/// Chat channel owned by one view; disconnected when dropped
pub struct AgentChat {
    channel: ChannelGuard,
    params: AgentChatParams,
}

impl AgentChat {
    /// Builds the channel without connecting, so listeners can attach first
    pub fn new(ws_base_url: impl Into<String>, params: AgentChatParams) -> Result<Self> {
        Self::with_options(ws_base_url, params, agent_chat_options())
    }

    pub fn with_options(
        ws_base_url: impl Into<String>,
        params: AgentChatParams,
        options: ChannelOptions,
    ) -> Result<Self> {
        let options = ChannelOptions {
            auto_connect: false,
            ..options
        };
        let client = RealtimeClient::new(ws_base_url, agent_chat_endpoint(&params), options)?;
        tracing::info!(agent_id = %params.agent_id, "Agent chat channel created");
        Ok(Self {
            channel: ChannelGuard::new(client),
            params,
        })
    }

    pub fn params(&self) -> &AgentChatParams {
        &self.params
    }

    /// Decoded events of this chat; register before `connect()` to see the first frames
    pub async fn events(&self) -> mpsc::Receiver<ChatEvent> {
        let mut raw = self.channel.on_event().await;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);

        tokio::spawn(async move {
            while let Some(event) = raw.recv().await {
                let event = match event {
                    ChannelEvent::Message(payload) => ChatEvent::from_payload(payload),
                    ChannelEvent::StatusChanged(status) => ChatEvent::Connection(status),
                    ChannelEvent::Error(message) => ChatEvent::Error { message },
                    ChannelEvent::Open | ChannelEvent::Close(_) => continue,
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        rx
    }

    pub async fn send_message(&self, content: &str) -> bool {
        self.channel
            .send(json!({
                "type": "message",
                "content": content,
                "timestamp": chrono::Utc::now().timestamp_millis(),
            }))
            .await
    }

    pub async fn send_typing(&self, is_typing: bool) -> bool {
        self.channel
            .send(json!({ "type": "typing", "is_typing": is_typing }))
            .await
    }

    /// Sends any JSON payload as-is
    pub async fn send_raw(&self, payload: Value) -> bool {
        self.channel.send(payload).await
    }

    pub async fn close(self) {
        self.channel.release().await;
    }
}

impl Deref for AgentChat {
    type Target = RealtimeClient;

    fn deref(&self) -> &Self::Target {
        &self.channel
    }
}
