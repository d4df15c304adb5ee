use super::{encode, opt_string_or_number, unwrap_record};
use crate::infrastructure::ApiClient;
use crate::session::UserProfile;
use crate::types::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// An invitation for someone to join a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub company_id: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// Response of accepting an invitation: a fresh session for the invitee
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvitationAcceptance {
    #[serde(alias = "access_token")]
    pub token: String,
    pub user: UserProfile,
}

impl ApiClient {
    pub async fn create_invitation(&self, email: &str, role: &str) -> Result<Invitation> {
        let body: Value = self
            .post_json("/api/invitations", &json!({ "email": email, "role": role }))
            .await?;
        Ok(unwrap_record(body, "invitation")?)
    }

    pub async fn get_invitation(&self, token: &str) -> Result<Invitation> {
        let body: Value = self
            .get_json(&format!("/api/invitations/{}", encode(token)))
            .await?;
        Ok(unwrap_record(body, "invitation")?)
    }

    /// Accepts the invitation and signs the invitee in
    pub async fn accept_invitation(&self, token: &str) -> Result<UserProfile> {
        let acceptance: InvitationAcceptance = self
            .post_json(
                &format!("/api/invitations/{}/accept", encode(token)),
                &json!({}),
            )
            .await?;
        self.session().login(acceptance.token, acceptance.user.clone());
        Ok(acceptance.user)
    }
}
