use super::RealtimeClient;
use std::ops::Deref;

/// Owns a channel and guarantees it is disconnected when the owner goes away.
///
/// Prefer [`release`](Self::release) where an async context is available; `Drop` falls back
/// to spawning the disconnect, or aborting the channel's tasks outside a runtime.
pub struct ChannelGuard {
    client: Option<RealtimeClient>,
}

impl ChannelGuard {
    pub fn new(client: RealtimeClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Disconnects and consumes the guard
    pub async fn release(mut self) {
        if let Some(client) = self.client.take() {
            client.disconnect().await;
        }
    }
}

impl Deref for ChannelGuard {
    type Target = RealtimeClient;

    fn deref(&self) -> &Self::Target {
        self.client
            .as_ref()
            .unwrap_or_else(|| unreachable!("client is only taken on release or drop"))
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    client.disconnect().await;
                });
            }
            Err(_) => client.abort_now(),
        }
    }
}
