use super::{encode, extract_records, opt_string_or_number, string_or_number};
use crate::infrastructure::ApiClient;
use crate::sync::{CollectionSource, RemoteCollection};
use crate::types::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A configured voice agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub company_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Drops agents whose name was already seen; the first occurrence wins
pub fn dedup_by_name(agents: Vec<Agent>) -> Vec<Agent> {
    let mut seen = HashSet::new();
    agents
        .into_iter()
        .filter(|agent| seen.insert(agent.name.clone()))
        .collect()
}

/// REST-only agent list of one company
#[derive(Clone)]
pub struct AgentSource {
    api: ApiClient,
}

impl AgentSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl CollectionSource for AgentSource {
    type Item = Agent;

    fn name(&self) -> &'static str {
        "agents"
    }

    async fn fetch(&self, company_id: &str) -> Result<Vec<Agent>> {
        let path = format!("/api/agents?company_id={}", encode(company_id));
        let body: Value = self.api.get_json(&path).await?;
        Ok(dedup_by_name(extract_records(body, &["agents", "data", "items"])))
    }

    fn channel_endpoint(&self, _company_id: &str) -> Option<String> {
        None
    }
}

pub type AgentDirectory = RemoteCollection<AgentSource>;

impl AgentDirectory {
    pub fn find(&self, agent_id: &str) -> Option<Agent> {
        self.items().into_iter().find(|a| a.id == agent_id)
    }
}
