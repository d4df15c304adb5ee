use crate::messaging::Envelope;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// How envelopes are folded into a local list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergePolicy {
    /// Maximum number of records kept, newest first
    pub cap: Option<usize>,
}

impl MergePolicy {
    pub fn capped(cap: usize) -> Self {
        Self { cap: Some(cap) }
    }

    pub fn unbounded() -> Self {
        Self { cap: None }
    }

    pub fn truncate<T>(&self, items: &mut Vec<T>) {
        if let Some(cap) = self.cap {
            items.truncate(cap);
        }
    }

    /// Applies an envelope. Returns true if `items` changed.
    pub fn apply<T: DeserializeOwned>(&self, envelope: Envelope, items: &mut Vec<T>) -> bool {
        match envelope {
            Envelope::Replace(records) => {
                *items = decode_records(records);
            }
            Envelope::Prepend(record) => match serde_json::from_value::<T>(record) {
                Ok(item) => items.insert(0, item),
                Err(e) => {
                    tracing::warn!("Skipping realtime record that failed to decode: {}", e);
                    return false;
                }
            },
            Envelope::PrependBatch(records) => {
                let mut merged = decode_records(records);
                if merged.is_empty() {
                    return false;
                }
                merged.append(items);
                *items = merged;
            }
            Envelope::Pong => return false,
        }
        self.truncate(items);
        true
    }
}

/// Decodes every record that matches `T`, dropping the rest
pub fn decode_records<T: DeserializeOwned>(records: Vec<Value>) -> Vec<T> {
    let total = records.len();
    let decoded: Vec<T> = records
        .into_iter()
        .filter_map(|record| serde_json::from_value(record).ok())
        .collect();
    if decoded.len() != total {
        tracing::warn!(
            "Dropped {} of {} records that failed to decode",
            total - decoded.len(),
            total
        );
    }
    decoded
}
