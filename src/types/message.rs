use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::constants::message_types;

/// A decoded inbound frame.
///
/// Text frames are parsed as JSON; anything that fails to parse is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text.to_string()),
        }
    }

    /// The `type` field of a JSON object payload, if any
    pub fn message_type(&self) -> Option<&str> {
        match self {
            Self::Json(value) => value.get("type").and_then(Value::as_str),
            Self::Text(_) => None,
        }
    }

    /// Heartbeat replies never reach consumers
    pub fn is_pong(&self) -> bool {
        self.message_type() == Some(message_types::PONG)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// An outbound frame. Strings go out as-is, everything else is serialized to JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Json(Value),
}

impl Outbound {
    pub fn into_text(self) -> serde_json::Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Json(value) => serde_json::to_string(&value),
        }
    }

    pub fn ping(timestamp_ms: i64) -> Self {
        Self::Json(serde_json::json!({
            "type": message_types::PING,
            "timestamp": timestamp_ms,
        }))
    }
}

impl From<&str> for Outbound {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Outbound {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Outbound {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_payload() {
        let payload = Payload::parse(r#"{"type":"update","data":{"id":"a1"}}"#);
        assert_eq!(payload.message_type(), Some("update"));
        assert!(!payload.is_pong());
        assert_eq!(payload.as_json().unwrap()["data"]["id"], "a1");
    }

    #[test]
    fn test_parse_malformed_keeps_raw_text() {
        let payload = Payload::parse("hello {not json");
        assert_eq!(payload, Payload::Text("hello {not json".to_string()));
        assert_eq!(payload.message_type(), None);
    }

    #[test]
    fn test_pong_detection() {
        assert!(Payload::parse(r#"{"type":"pong","timestamp":1}"#).is_pong());
        assert!(!Payload::parse(r#"["pong"]"#).is_pong());
        assert!(!Payload::parse("pong").is_pong());
    }

    #[test]
    fn test_outbound_text_is_not_reencoded() {
        let text = Outbound::from("already-serialized").into_text().unwrap();
        assert_eq!(text, "already-serialized");

        let json = Outbound::from(json!({"type": "hello"})).into_text().unwrap();
        assert_eq!(json, r#"{"type":"hello"}"#);
    }

    #[test]
    fn test_ping_shape() {
        let Outbound::Json(value) = Outbound::ping(1_700_000_000_000) else {
            panic!("ping must be JSON");
        };
        assert_eq!(value["type"], "ping");
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
    }
}
