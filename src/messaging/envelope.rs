use crate::types::Payload;
use crate::types::constants::{RECORD_KEYS, message_types};
use serde_json::Value;

/// How an inbound payload should be merged into a local collection
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `initial` / `full`, a bare array, or an object carrying a record array
    Replace(Vec<Value>),
    /// `update` / `new`: one record goes to the front
    Prepend(Value),
    /// `batch`: several records go to the front, order preserved
    PrependBatch(Vec<Value>),
    /// Heartbeat reply
    Pong,
}

impl Envelope {
    /// Decode a payload. Returns `None` for shapes that carry no mergeable records.
    pub fn decode(payload: &Payload) -> Option<Self> {
        let value = payload.as_json()?;

        match value {
            Value::Array(records) => Some(Self::Replace(records.clone())),
            Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                Some(message_types::PONG) => Some(Self::Pong),
                Some(message_types::INITIAL) | Some(message_types::FULL) => {
                    record_array(value).map(Self::Replace)
                }
                Some(message_types::UPDATE) | Some(message_types::NEW) => {
                    Some(Self::Prepend(single_record(value)))
                }
                Some(message_types::BATCH) => record_array(value).map(Self::PrependBatch),
                _ => ["activities", "data"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_array))
                    .map(|records| Self::Replace(records.clone())),
            },
            _ => None,
        }
    }
}

fn record_array(value: &Value) -> Option<Vec<Value>> {
    RECORD_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array))
        .cloned()
}

/// An `update`/`new` message carries its record in `data` or `activity`; otherwise
/// the message itself is the record.
fn single_record(value: &Value) -> Value {
    ["data", "activity"]
        .iter()
        .find_map(|key| value.get(*key).filter(|v| v.is_object()))
        .cloned()
        .unwrap_or_else(|| value.clone())
}
