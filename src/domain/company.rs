use super::{encode, string_or_number, unwrap_record};
use crate::infrastructure::ApiClient;
use crate::types::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl ApiClient {
    pub async fn get_company(&self, company_id: &str) -> Result<Company> {
        let body: Value = self
            .get_json(&format!("/api/companies/{}", encode(company_id)))
            .await?;
        Ok(unwrap_record(body, "company")?)
    }

    /// Company of the signed-in user, if the profile names one
    pub async fn current_company(&self) -> Result<Option<Company>> {
        match self.session().current().company_id() {
            Some(company_id) => self.get_company(&company_id).await.map(Some),
            None => Ok(None),
        }
    }
}
