// Domain module - DTOs and per-domain collection sources
pub mod activity;
pub mod agent;
pub mod campaign;
pub mod company;
pub mod invitation;
pub mod ticket;

pub use activity::{Activity, ActivityFeed, ActivitySource};
pub use agent::{Agent, AgentDirectory, AgentSource};
pub use campaign::{Campaign, CampaignList, CampaignSource};
pub use company::Company;
pub use invitation::{Invitation, InvitationAcceptance};
pub use ticket::{
    NewTicket, Ticket, TicketBoard, TicketNote, TicketPriority, TicketSource, TicketStats,
    TicketStatus,
};

use crate::sync::decode_records;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Pulls the record array out of a list response.
///
/// Accepts a bare array or an object carrying the array under one of `keys`.
/// Anything else yields no records.
pub fn extract_records<T: DeserializeOwned>(body: Value, keys: &[&str]) -> Vec<T> {
    match body {
        Value::Array(records) => decode_records(records),
        Value::Object(mut map) => {
            let records = keys
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(records)) => Some(records),
                    _ => None,
                })
                .unwrap_or_default();
            decode_records(records)
        }
        _ => Vec::new(),
    }
}

/// Unwraps `{ "<key>": {..} }` single-record responses; returns the body otherwise
pub fn unwrap_record<T: DeserializeOwned>(body: Value, key: &str) -> serde_json::Result<T> {
    match body {
        Value::Object(mut map) if map.get(key).is_some_and(Value::is_object) => {
            serde_json::from_value(map.remove(key).unwrap_or(Value::Null))
        }
        other => serde_json::from_value(other),
    }
}

/// Percent-encodes one path segment or query value
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Ids come back as strings from some endpoints and integers from others
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
    }

    #[test]
    fn test_extract_records_shapes() {
        let bare: Vec<Row> = extract_records(json!([{"id": "a"}, {"id": 2}]), &["data"]);
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[1].id, "2");

        let wrapped: Vec<Row> = extract_records(json!({"tickets": [{"id": "t1"}]}), &["data", "tickets"]);
        assert_eq!(wrapped, vec![Row { id: "t1".into() }]);

        let empty: Vec<Row> = extract_records(json!({"count": 3}), &["data"]);
        assert!(empty.is_empty());
        let null: Vec<Row> = extract_records(Value::Null, &["data"]);
        assert!(null.is_empty());
    }

    #[test]
    fn test_unwrap_record() {
        let row: Row = unwrap_record(json!({"ticket": {"id": "t1"}}), "ticket").unwrap();
        assert_eq!(row.id, "t1");
        let row: Row = unwrap_record(json!({"id": 9}), "ticket").unwrap();
        assert_eq!(row.id, "9");
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode("co 1/2"), "co+1%2F2");
        assert_eq!(encode("7d"), "7d");
    }
}
