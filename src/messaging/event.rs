use crate::client::ConnectionStatus;
use crate::types::constants::{
    WS_CLOSE_ABNORMAL, WS_CLOSE_FORBIDDEN, WS_CLOSE_GOING_AWAY, WS_CLOSE_NORMAL,
    WS_CLOSE_POLICY_VIOLATION, WS_CLOSE_SERVICE_RESTART, WS_CLOSE_UNAUTHORIZED,
};
use crate::types::Payload;
use serde::{Deserialize, Serialize};

/// Close details delivered to `on_close` and to event listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseInfo {
    /// Close code from the close frame; `None` when the socket dropped without one
    pub code: Option<u16>,
    pub reason: String,
    pub was_clean: bool,
}

impl CloseInfo {
    pub fn normal() -> Self {
        Self {
            code: Some(WS_CLOSE_NORMAL),
            reason: String::new(),
            was_clean: true,
        }
    }

    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
            was_clean: false,
        }
    }

    /// The effective code, treating a missing close frame as 1006
    pub fn effective_code(&self) -> u16 {
        self.code.unwrap_or(WS_CLOSE_ABNORMAL)
    }
}

/// Events fanned out to `on_event()` listeners
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Open,
    Message(Payload),
    Close(CloseInfo),
    Error(String),
    StatusChanged(ConnectionStatus),
}

impl ChannelEvent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Message(_) => "message",
            Self::Close(_) => "close",
            Self::Error(_) => "error",
            Self::StatusChanged(_) => "status_change",
        }
    }
}

impl std::fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Close code descriptions.
pub fn describe_close_code(code: u16) -> Option<&'static str> {
    match code {
        WS_CLOSE_NORMAL => Some("normal closure"),
        WS_CLOSE_GOING_AWAY => Some("going away"),
        WS_CLOSE_ABNORMAL => Some("abnormal closure (no close frame)"),
        WS_CLOSE_POLICY_VIOLATION => Some("policy violation"),
        WS_CLOSE_SERVICE_RESTART => Some("service restart"),
        WS_CLOSE_UNAUTHORIZED => Some("authentication failed"),
        WS_CLOSE_FORBIDDEN => Some("permission denied"),
        _ => None,
    }
}
