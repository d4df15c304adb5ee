use super::{encode, extract_records, opt_string_or_number, string_or_number};
use crate::infrastructure::ApiClient;
use crate::sync::{CollectionSource, MergePolicy, RemoteCollection};
use crate::types::Result;
use crate::types::constants::{ACTIVITY_CAP, DEFAULT_ACTIVITY_WINDOW};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of the company activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub company_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default, rename = "type", alias = "activity_type")]
    pub kind: Option<String>,
    #[serde(default, alias = "message")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Activities of one company over a time window, newest first
#[derive(Clone)]
pub struct ActivitySource {
    api: ApiClient,
    window: String,
}

impl ActivitySource {
    pub fn new(api: ApiClient) -> Self {
        Self::with_window(api, DEFAULT_ACTIVITY_WINDOW)
    }

    pub fn with_window(api: ApiClient, window: impl Into<String>) -> Self {
        Self {
            api,
            window: window.into(),
        }
    }

    pub fn window(&self) -> &str {
        &self.window
    }
}

impl CollectionSource for ActivitySource {
    type Item = Activity;

    fn name(&self) -> &'static str {
        "activities"
    }

    async fn fetch(&self, company_id: &str) -> Result<Vec<Activity>> {
        let path = format!(
            "/api/activities/{}?timeframe={}",
            encode(company_id),
            encode(&self.window)
        );
        let body: Value = self.api.get_json(&path).await?;
        Ok(extract_records(body, &["activities", "data", "items"]))
    }

    fn channel_endpoint(&self, company_id: &str) -> Option<String> {
        Some(format!(
            "/ws/activities/{}?timeframe={}",
            encode(company_id),
            encode(&self.window)
        ))
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::capped(ACTIVITY_CAP)
    }
}

pub type ActivityFeed = RemoteCollection<ActivitySource>;

impl ActivityFeed {
    /// Activity feed bound to the configured window and WebSocket base URL
    pub fn from_config(api: ApiClient, config: &crate::config::AppConfig) -> Self {
        RemoteCollection::new(
            ActivitySource::with_window(api, config.activity_window.clone()),
            config.ws_base_url.clone(),
        )
    }

    /// Items of the given `type`, newest first
    pub fn of_kind(&self, kind: &str) -> Vec<Activity> {
        self.items()
            .into_iter()
            .filter(|a| a.kind.as_deref() == Some(kind))
            .collect()
    }
}
