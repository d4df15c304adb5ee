use super::{encode, extract_records, opt_string_or_number, string_or_number, unwrap_record};
use crate::infrastructure::ApiClient;
use crate::sync::{CollectionSnapshot, CollectionSource, RemoteCollection};
use crate::types::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
    #[serde(other)]
    Unknown,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketNote {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(alias = "note", alias = "content")]
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub company_id: Option<String>,
    #[serde(default, alias = "subject")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Option<TicketPriority>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub notes: Vec<TicketNote>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_status() -> TicketStatus {
    TicketStatus::Open
}

/// Aggregate counts derived by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub open: u64,
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default)]
    pub resolved: u64,
    #[serde(default)]
    pub closed: u64,
}

/// Body of `POST /api/tickets`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTicket {
    pub company_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
}

impl NewTicket {
    pub fn new(company_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            title: title.into(),
            description: None,
            priority: None,
            customer_name: None,
            customer_phone: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn priority(mut self, priority: TicketPriority) -> Self {
        self.priority = Some(priority);
        self
    }
}

#[derive(Clone)]
pub struct TicketSource {
    api: ApiClient,
}

impl TicketSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl CollectionSource for TicketSource {
    type Item = Ticket;

    fn name(&self) -> &'static str {
        "tickets"
    }

    async fn fetch(&self, company_id: &str) -> Result<Vec<Ticket>> {
        let path = format!("/api/tickets?company_id={}", encode(company_id));
        let body: Value = self.api.get_json(&path).await?;
        Ok(extract_records(body, &["tickets", "data", "items"]))
    }

    fn channel_endpoint(&self, company_id: &str) -> Option<String> {
        Some(format!("/ws/tickets/{}", encode(company_id)))
    }
}

/// Ticket collection plus backend-derived stats.
///
/// Mutations go through REST and, once the backend accepts them, reload both the collection
/// and the stats. Local state is never patched optimistically. Stats belong to the company
/// they were loaded for: a company change clears them and late results for a previous
/// company are dropped.
#[derive(Clone)]
pub struct TicketBoard {
    api: ApiClient,
    tickets: RemoteCollection<TicketSource>,
    stats: Arc<watch::Sender<Option<TicketStats>>>,
    /// Collection generation the current stats were loaded under
    stats_generation: Arc<AtomicU64>,
    watcher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TicketBoard {
    pub fn new(api: ApiClient, ws_base_url: impl Into<String>) -> Self {
        let tickets = RemoteCollection::new(TicketSource::new(api.clone()), ws_base_url);
        Self::with_collection(api, tickets)
    }

    pub fn with_collection(api: ApiClient, tickets: RemoteCollection<TicketSource>) -> Self {
        let (stats, _rx) = watch::channel(None);
        Self {
            api,
            tickets,
            stats: Arc::new(stats),
            stats_generation: Arc::new(AtomicU64::new(0)),
            watcher: Arc::new(Mutex::new(None)),
        }
    }

    pub fn tickets(&self) -> &RemoteCollection<TicketSource> {
        &self.tickets
    }

    pub fn snapshot(&self) -> CollectionSnapshot<Ticket> {
        self.tickets.snapshot()
    }

    /// Stats of the bound company. `None` until they load, or once the collection has
    /// moved to another company without them being reloaded.
    pub fn stats(&self) -> Option<TicketStats> {
        let stats = self.stats.borrow();
        if self.stats_generation.load(Ordering::SeqCst) != self.tickets.generation() {
            return None;
        }
        stats.clone()
    }

    pub fn watch_stats(&self) -> watch::Receiver<Option<TicketStats>> {
        self.stats.subscribe()
    }

    /// Binds to a company and loads its stats alongside the collection.
    ///
    /// `None` after a company was bound releases the channel and clears both the tickets
    /// and the stats.
    pub async fn set_company(&self, company_id: Option<String>) {
        if self.tickets.identity().await == company_id {
            return;
        }
        self.stats.send_replace(None);
        self.tickets.set_identity(company_id).await;
        self.reload_stats().await;
    }

    /// Drives `set_company` from a watch channel until the sender goes away or
    /// [`shutdown()`](Self::shutdown) is called
    pub async fn bind_identity(&self, mut companies: watch::Receiver<Option<String>>) {
        let board = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let company_id = companies.borrow_and_update().clone();
                board.set_company(company_id).await;
                if companies.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Some(previous) = self.watcher.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Tickets with the given status, in collection order
    pub fn with_status(&self, status: TicketStatus) -> Vec<Ticket> {
        self.tickets
            .items()
            .into_iter()
            .filter(|t| t.status == status)
            .collect()
    }

    pub async fn fetch_stats(&self, company_id: &str) -> Result<TicketStats> {
        let path = format!("/api/tickets/stats?company_id={}", encode(company_id));
        let body: Value = self.api.get_json(&path).await?;
        Ok(unwrap_record(body, "stats")?)
    }

    /// Re-reads stats for the bound company. Failures keep the previous value, and a
    /// result that arrives after the company changed is dropped.
    pub async fn reload_stats(&self) {
        let generation = self.tickets.generation();
        let Some(company_id) = self.tickets.identity().await else {
            return;
        };
        let stats = match self.fetch_stats(&company_id).await {
            Ok(stats) => stats,
            Err(e) if e.is_not_found() => TicketStats::default(),
            Err(e) => {
                tracing::warn!("Failed to load ticket stats for {}: {}", company_id, e);
                return;
            }
        };

        let applied = self.stats.send_if_modified(|current| {
            if self.tickets.generation() != generation {
                return false;
            }
            self.stats_generation.store(generation, Ordering::SeqCst);
            *current = Some(stats);
            true
        });
        if !applied {
            tracing::debug!("Discarding ticket stats for stale company {}", company_id);
        }
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        let body: Value = self.api.post_json("/api/tickets", ticket).await?;
        let created = unwrap_record(body, "ticket")?;
        self.reload().await;
        Ok(created)
    }

    pub async fn update_status(&self, ticket_id: &str, status: TicketStatus) -> Result<()> {
        let path = format!("/api/tickets/{}/status", encode(ticket_id));
        let _: Value = self
            .api
            .patch_json(&path, &json!({ "status": status }))
            .await?;
        self.reload().await;
        Ok(())
    }

    pub async fn add_note(&self, ticket_id: &str, text: &str) -> Result<()> {
        let path = format!("/api/tickets/{}/notes", encode(ticket_id));
        let _: Value = self.api.post_json(&path, &json!({ "note": text })).await?;
        self.reload().await;
        Ok(())
    }

    async fn reload(&self) {
        tokio::join!(self.tickets.reload(), self.reload_stats());
    }

    pub async fn shutdown(&self) {
        if let Some(watcher) = self.watcher.lock().await.take() {
            watcher.abort();
        }
        self.tickets.shutdown().await;
        self.stats.send_replace(None);
    }
}
