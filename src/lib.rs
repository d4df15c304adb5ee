//! # AgentDesk Realtime
//!
//! Realtime and data-sync core of the AgentDesk dashboard: a reconnecting WebSocket channel
//! client, REST + realtime backed collections for activities, tickets, campaigns and agents,
//! and the agent chat signaling channel.
//!
//! ## Example
//!
//! ```no_run
//! use agentdesk_realtime::{ApiClient, AppConfig, SessionStore, domain::ActivityFeed};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env()?;
//!     let session = SessionStore::new();
//!     let api = ApiClient::from_config(&config, session.clone())?;
//!
//!     let feed = ActivityFeed::from_config(api, &config);
//!     feed.bind_identity(session.company_id_watch()).await;
//!
//!     let mut updates = feed.watch();
//!     while updates.changed().await.is_ok() {
//!         println!("{} activities", updates.borrow().items.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod client;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod messaging;
pub mod session;
pub mod sync;
pub mod types;
pub mod websocket;

pub use chat::{AgentChat, AgentChatParams, ChatEvent};
pub use client::{
    ChannelCallbacks, ChannelGuard, ChannelOptions, ConnectionStatus, RealtimeClient,
    RealtimeClientBuilder,
};
pub use config::AppConfig;
pub use infrastructure::{ApiClient, BackoffStrategy};
pub use messaging::{ChannelEvent, CloseInfo, Envelope};
pub use session::{Session, SessionStore, UserProfile};
pub use sync::{CollectionSnapshot, CollectionSource, MergePolicy, RemoteCollection};
pub use types::{Outbound, Payload, RealtimeError, Result};
