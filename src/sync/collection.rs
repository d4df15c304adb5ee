use super::MergePolicy;
use crate::client::{ChannelGuard, ChannelOptions, ConnectionStatus, RealtimeClient};
use crate::messaging::{ChannelEvent, Envelope};
use crate::types::{Payload, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

/// Shown when the REST fallback could not reach the backend
pub const NETWORK_ERROR_MESSAGE: &str = "Unable to reach the server. Showing last known data.";

/// Where a collection's records come from
pub trait CollectionSource: Send + Sync + 'static {
    type Item: DeserializeOwned + Clone + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Full load over REST for one identity (e.g. a company id)
    fn fetch(&self, identity: &str) -> impl Future<Output = Result<Vec<Self::Item>>> + Send;

    /// Realtime endpoint for the identity; `None` for REST-only collections
    fn channel_endpoint(&self, identity: &str) -> Option<String>;

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::default()
    }
}

/// Ready-to-render view of a collection
#[derive(Debug, Clone)]
pub struct CollectionSnapshot<T> {
    pub identity: Option<String>,
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub status: ConnectionStatus,
    pub last_updated: Option<DateTime<Utc>>,
}

impl<T> Default for CollectionSnapshot<T> {
    fn default() -> Self {
        Self {
            identity: None,
            items: Vec::new(),
            loading: false,
            error: None,
            status: ConnectionStatus::Disconnected,
            last_updated: None,
        }
    }
}

#[derive(Default)]
struct Binding {
    identity: Option<String>,
    channel: Option<ChannelGuard>,
    pump: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
}

struct Inner<S: CollectionSource> {
    source: S,
    ws_base_url: String,
    channel_options: ChannelOptions,
    snapshot: watch::Sender<CollectionSnapshot<S::Item>>,
    binding: Mutex<Binding>,
    /// Bumped on every identity change; results tagged with an older value are dropped
    generation: AtomicU64,
}

/// A REST-loaded, realtime-updated list of records bound to one identity at a time.
///
/// Changing the identity tears down the old channel, clears the items and loads again.
/// Results that arrive for a previous identity are discarded.
pub struct RemoteCollection<S: CollectionSource> {
    inner: Arc<Inner<S>>,
}

impl<S: CollectionSource> Clone for RemoteCollection<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CollectionSource> RemoteCollection<S> {
    pub fn new(source: S, ws_base_url: impl Into<String>) -> Self {
        Self::with_channel_options(source, ws_base_url, ChannelOptions::default())
    }

    pub fn with_channel_options(
        source: S,
        ws_base_url: impl Into<String>,
        channel_options: ChannelOptions,
    ) -> Self {
        let (snapshot, _rx) = watch::channel(CollectionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                source,
                ws_base_url: ws_base_url.into(),
                channel_options,
                snapshot,
                binding: Mutex::new(Binding::default()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn snapshot(&self) -> CollectionSnapshot<S::Item> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn items(&self) -> Vec<S::Item> {
        self.inner.snapshot.borrow().items.clone()
    }

    pub fn watch(&self) -> watch::Receiver<CollectionSnapshot<S::Item>> {
        self.inner.snapshot.subscribe()
    }

    pub async fn identity(&self) -> Option<String> {
        self.inner.binding.lock().await.identity.clone()
    }

    /// The realtime channel of the current identity, if any
    pub async fn channel(&self) -> Option<RealtimeClient> {
        let binding = self.inner.binding.lock().await;
        binding.channel.as_deref().cloned()
    }

    /// Binds the collection to an identity.
    ///
    /// A new value tears down the previous channel, opens one for the new identity and
    /// issues one REST fetch. `None` before any identity was bound means it is still
    /// loading and nothing happens. `None` after a binding (sign-out) releases the channel
    /// and empties the collection like [`clear()`](Self::clear).
    pub async fn set_identity(&self, identity: Option<String>) {
        let Some(identity) = identity else {
            let mut binding = self.inner.binding.lock().await;
            match binding.identity.take() {
                Some(previous) => {
                    tracing::info!(
                        collection = self.inner.source.name(),
                        "Identity {} went away, releasing",
                        previous
                    );
                    self.reset(&mut binding).await;
                }
                None => {
                    tracing::debug!(collection = self.inner.source.name(), "Identity not available yet");
                }
            }
            return;
        };

        let generation = {
            let mut binding = self.inner.binding.lock().await;
            if binding.identity.as_deref() == Some(identity.as_str()) {
                return;
            }

            teardown(&mut binding).await;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            binding.identity = Some(identity.clone());

            self.inner.snapshot.send_replace(CollectionSnapshot {
                identity: Some(identity.clone()),
                loading: true,
                ..Default::default()
            });

            tracing::info!(
                collection = self.inner.source.name(),
                "Binding to identity {}",
                identity
            );

            if let Some(endpoint) = self.inner.source.channel_endpoint(&identity) {
                self.bind_channel(&mut binding, endpoint, generation).await;
            }
            generation
        };

        self.fetch_for(generation, identity).await;
    }

    async fn bind_channel(&self, binding: &mut Binding, endpoint: String, generation: u64) {
        let auto_connect = self.inner.channel_options.auto_connect;
        let options = ChannelOptions {
            // Listener must be registered before the first frame can arrive
            auto_connect: false,
            ..self.inner.channel_options.clone()
        };

        let client = match RealtimeClient::new(self.inner.ws_base_url.clone(), endpoint, options) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(
                    collection = self.inner.source.name(),
                    "Cannot create realtime channel: {}",
                    e
                );
                self.inner.snapshot.send_modify(|s| s.status = ConnectionStatus::Error);
                return;
            }
        };

        let events = client.on_event().await;
        binding.pump = Some(tokio::spawn(pump(
            Arc::downgrade(&self.inner),
            generation,
            events,
        )));

        if auto_connect {
            let client_for_connect = client.clone();
            tokio::spawn(async move {
                client_for_connect.connect().await;
            });
        }
        binding.channel = Some(ChannelGuard::new(client));
    }

    /// Drives `set_identity` from a watch channel until the sender goes away
    pub async fn bind_identity(&self, mut identities: watch::Receiver<Option<String>>) {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                match weak.upgrade() {
                    Some(inner) => RemoteCollection { inner }.set_identity(identity).await,
                    None => break,
                }
                if identities.changed().await.is_err() {
                    break;
                }
            }
        });

        let mut binding = self.inner.binding.lock().await;
        if let Some(previous) = binding.watcher.replace(handle) {
            previous.abort();
        }
    }

    /// Reconnects a live channel to get a fresh `initial` payload, or re-fetches over REST
    pub async fn refresh(&self) {
        let (channel, identity) = {
            let binding = self.inner.binding.lock().await;
            (binding.channel.as_deref().cloned(), binding.identity.clone())
        };
        let Some(identity) = identity else {
            return;
        };

        if let Some(client) = channel
            && client.is_connected().await
        {
            client.reconnect().await;
            return;
        }

        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.fetch_for(generation, identity).await;
    }

    /// Re-fetches over REST regardless of the channel
    pub async fn reload(&self) {
        let Some(identity) = self.identity().await else {
            return;
        };
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.fetch_for(generation, identity).await;
    }

    async fn fetch_for(&self, generation: u64, identity: String) {
        let name = self.inner.source.name();
        self.inner.snapshot.send_if_modified(|s| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.loading = true;
            true
        });

        let result = self.inner.source.fetch(&identity).await;
        let policy = self.inner.source.merge_policy();

        let applied = self.inner.snapshot.send_if_modified(|s| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.loading = false;
            match result {
                Ok(mut items) => {
                    policy.truncate(&mut items);
                    s.items = items;
                    s.error = None;
                    s.last_updated = Some(Utc::now());
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(collection = name, "No records yet for {}", identity);
                    s.items.clear();
                    s.error = None;
                }
                Err(e) if e.is_network() => {
                    tracing::warn!(collection = name, "Fetch failed, keeping last known data: {}", e);
                    s.error = Some(NETWORK_ERROR_MESSAGE.to_string());
                }
                Err(e) => {
                    tracing::error!(collection = name, "Fetch failed: {}", e);
                    s.items.clear();
                    s.error = Some(e.to_string());
                }
            }
            true
        });

        if !applied {
            tracing::debug!(collection = name, "Discarding fetch result for stale identity {}", identity);
        }
    }

    /// Tears down the channel and forgets the identity
    pub async fn clear(&self) {
        let mut binding = self.inner.binding.lock().await;
        binding.identity = None;
        self.reset(&mut binding).await;
    }

    async fn reset(&self, binding: &mut Binding) {
        teardown(binding).await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.snapshot.send_replace(CollectionSnapshot::default());
    }

    /// Bumped on every identity change. Lets callers tag their own identity-scoped
    /// requests and drop the results once the collection has moved on.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// `clear()` plus stopping the identity watcher
    pub async fn shutdown(&self) {
        self.clear().await;
        if let Some(watcher) = self.inner.binding.lock().await.watcher.take() {
            watcher.abort();
        }
    }
}

async fn teardown(binding: &mut Binding) {
    if let Some(pump) = binding.pump.take() {
        pump.abort();
    }
    if let Some(channel) = binding.channel.take() {
        channel.release().await;
    }
}

impl<S: CollectionSource> Inner<S> {
    fn apply_payload(&self, generation: u64, payload: &Payload) {
        let Some(envelope) = Envelope::decode(payload) else {
            tracing::debug!(collection = self.source.name(), "Ignoring unrecognized payload");
            return;
        };
        if envelope == Envelope::Pong {
            return;
        }

        let policy = self.source.merge_policy();
        self.snapshot.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            if !policy.apply(envelope, &mut s.items) {
                return false;
            }
            s.loading = false;
            s.last_updated = Some(Utc::now());
            true
        });
    }

    fn apply_status(&self, generation: u64, status: ConnectionStatus) {
        self.snapshot.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation || s.status == status {
                return false;
            }
            s.status = status;
            true
        });
    }
}

async fn pump<S: CollectionSource>(
    inner: Weak<Inner<S>>,
    generation: u64,
    mut events: mpsc::Receiver<ChannelEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.generation.load(Ordering::SeqCst) != generation {
            break;
        }

        match event {
            ChannelEvent::Message(payload) => inner.apply_payload(generation, &payload),
            ChannelEvent::StatusChanged(status) => inner.apply_status(generation, status),
            ChannelEvent::Error(detail) => {
                tracing::debug!(collection = inner.source.name(), "Channel error: {}", detail);
            }
            ChannelEvent::Open | ChannelEvent::Close(_) => {}
        }
    }
}
