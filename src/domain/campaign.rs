use super::{encode, extract_records, opt_string_or_number, string_or_number};
use crate::infrastructure::ApiClient;
use crate::sync::{CollectionSource, RemoteCollection};
use crate::types::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An outbound calling campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub company_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub total_contacts: Option<u64>,
    #[serde(default)]
    pub completed_calls: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Campaign {
    /// Completed share of the contact list, when both counts are known
    pub fn progress(&self) -> Option<f64> {
        match (self.completed_calls, self.total_contacts) {
            (Some(done), Some(total)) if total > 0 => Some(done as f64 / total as f64),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct CampaignSource {
    api: ApiClient,
}

impl CampaignSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl CollectionSource for CampaignSource {
    type Item = Campaign;

    fn name(&self) -> &'static str {
        "campaigns"
    }

    async fn fetch(&self, company_id: &str) -> Result<Vec<Campaign>> {
        let path = format!("/api/campaigns?company_id={}", encode(company_id));
        let body: Value = self.api.get_json(&path).await?;
        Ok(extract_records(body, &["campaigns", "data", "items"]))
    }

    fn channel_endpoint(&self, company_id: &str) -> Option<String> {
        Some(format!("/ws/campaigns/{}", encode(company_id)))
    }
}

pub type CampaignList = RemoteCollection<CampaignSource>;
