use super::ChannelEvent;
use crate::client::{ChannelCallbacks, ClientState};
use crate::types::Payload;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

/// Routes inbound text frames of one socket into channel state and subscribers
pub struct MessageRouter {
    state: Arc<RwLock<ClientState>>,
    callbacks: ChannelCallbacks,
    generation: u64,
}

impl MessageRouter {
    pub fn new_with_state(
        state: Arc<RwLock<ClientState>>,
        callbacks: ChannelCallbacks,
        generation: u64,
    ) -> Self {
        Self {
            state,
            callbacks,
            generation,
        }
    }

    /// Parses and routes a text frame. Returns the payload if it reached consumers.
    pub async fn route(&self, text: &str) -> Option<Payload> {
        let payload = Payload::parse(text);

        // Heartbeat replies are consumed here
        if payload.is_pong() {
            tracing::trace!("Received pong");
            return None;
        }

        let listeners = {
            let mut state = self.state.write().await;
            if state.generation != self.generation {
                tracing::debug!("Dropping message from superseded socket");
                return None;
            }
            state.latest = Some(payload.clone());
            state.last_update = Some(chrono::Utc::now());
            state.listeners()
        };

        if let Some(on_message) = &self.callbacks.on_message {
            on_message(&payload);
        }
        dispatch(&listeners, ChannelEvent::Message(payload.clone()));

        Some(payload)
    }
}

/// Delivers an event to every listener without waiting.
///
/// A listener whose buffer is full loses the event, so a consumer that stops reading
/// can never stall the read task or `disconnect()`. Closed listeners are skipped.
pub fn dispatch(listeners: &[mpsc::Sender<ChannelEvent>], event: ChannelEvent) {
    for listener in listeners {
        match listener.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Listener buffer full, dropping '{}' event", event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Listener dropped before '{}' event", event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectionStatus;
    use crate::infrastructure::ReconnectTimer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::watch;

    fn router(generation: u64, callbacks: ChannelCallbacks) -> (MessageRouter, Arc<RwLock<ClientState>>) {
        let (tx, _rx) = watch::channel(ConnectionStatus::Connected);
        let mut state = ClientState::new(ReconnectTimer::default(), tx);
        state.generation = 1;
        let state = Arc::new(RwLock::new(state));
        (
            MessageRouter::new_with_state(Arc::clone(&state), callbacks, generation),
            state,
        )
    }

    #[tokio::test]
    async fn test_pong_is_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = Arc::clone(&calls);
        let callbacks = ChannelCallbacks::default().on_message(move |_| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        });
        let (router, state) = router(1, callbacks);
        let (tx, mut rx) = mpsc::channel(8);
        state.write().await.listeners.push(tx);

        assert!(router.route(r#"{"type":"pong","timestamp":5}"#).await.is_none());

        let state = state.read().await;
        assert!(state.latest.is_none());
        assert!(state.last_update.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_message_updates_state_and_notifies() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_cb = Arc::clone(&calls);
        let callbacks = ChannelCallbacks::default().on_message(move |_| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        });
        let (router, state) = router(1, callbacks);
        let (tx, mut rx) = mpsc::channel(8);
        state.write().await.listeners.push(tx);

        let routed = router.route(r#"{"type":"update","data":{"id":"a"}}"#).await;
        assert!(routed.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(state.read().await.last_update.is_some());
        assert!(matches!(rx.try_recv(), Ok(ChannelEvent::Message(Payload::Json(_)))));
    }

    #[tokio::test]
    async fn test_raw_text_passes_through() {
        let (router, state) = router(1, ChannelCallbacks::default());
        router.route("plain text").await;
        assert_eq!(
            state.read().await.latest,
            Some(Payload::Text("plain text".into()))
        );
    }

    #[tokio::test]
    async fn test_full_listener_does_not_block() {
        let (router, state) = router(1, ChannelCallbacks::default());
        let (stuck_tx, _stuck_rx) = mpsc::channel(1);
        let (live_tx, mut live_rx) = mpsc::channel(8);
        state.write().await.listeners.push(stuck_tx);
        state.write().await.listeners.push(live_tx);

        for i in 0..3 {
            let routed = tokio::time::timeout(
                std::time::Duration::from_millis(200),
                router.route(&format!(r#"{{"type":"update","data":{{"id":"{i}"}}}}"#)),
            )
            .await
            .expect("routing blocked on a full listener");
            assert!(routed.is_some());
        }

        let mut delivered = 0;
        while live_rx.try_recv().is_ok() {
            delivered += 1;
        }
        assert_eq!(delivered, 3);
    }

    #[tokio::test]
    async fn test_superseded_socket_is_ignored() {
        let (router, state) = router(0, ChannelCallbacks::default());
        assert!(router.route(r#"{"type":"new"}"#).await.is_none());
        assert!(state.read().await.latest.is_none());
    }
}
