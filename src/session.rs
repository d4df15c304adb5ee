//! Observable session state.
//!
//! Holds the bearer token and user profile. Components subscribe to the store directly
//! instead of re-reading persisted state when some out-of-band signal fires.

use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn company_id(&self) -> Option<String> {
        self.user.as_ref().and_then(|u| u.company_id.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Shared handle to the current session. Cloning shares the same state.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_session(Session::default())
    }

    pub fn with_session(session: Session) -> Self {
        let (tx, _rx) = watch::channel(session);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.tx.borrow().token.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.tx.borrow().user.clone()
    }

    pub fn login(&self, token: impl Into<String>, user: UserProfile) {
        let token = token.into();
        tracing::info!(user_id = %user.id, "Session started");
        self.tx.send_replace(Session {
            token: Some(token),
            user: Some(user),
        });
    }

    pub fn set_user(&self, user: Option<UserProfile>) {
        self.tx.send_modify(|session| session.user = user);
    }

    pub fn logout(&self) {
        tracing::info!("Session cleared");
        self.tx.send_replace(Session::default());
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// A receiver that only changes when the user's company changes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn company_id_watch(&self) -> watch::Receiver<Option<String>> {
        let mut sessions = self.tx.subscribe();
        let initial = sessions.borrow_and_update().company_id();
        let (tx, rx) = watch::channel(initial);

        tokio::spawn(async move {
            while sessions.changed().await.is_ok() {
                let company_id = sessions.borrow_and_update().company_id();
                tx.send_if_modified(|current| {
                    if *current != company_id {
                        *current = company_id;
                        true
                    } else {
                        false
                    }
                });
                if tx.is_closed() {
                    break;
                }
            }
        });

        rx
    }

    /// Restores a session persisted by [`save_to`](Self::save_to). A missing file yields an
    /// empty session.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let session: Session = serde_json::from_str(&raw)?;
        Ok(Self::with_session(session))
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.current())?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
