use crate::client::ConnectionManager;
use crate::types::Outbound;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

const DEFAULT_HEARTBEAT_INTERVAL: Duration =
    Duration::from_millis(crate::types::constants::HEARTBEAT_INTERVAL);

/// Sends `{"type":"ping","timestamp":..}` while the socket is open
pub struct HeartbeatManager {
    interval: Duration,
    connection: Weak<ConnectionManager>,
}

impl HeartbeatManager {
    pub fn new(connection: Weak<ConnectionManager>) -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            connection,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawns the heartbeat task that runs periodically
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let mut interval_timer = time::interval_at(time::Instant::now() + self.interval, self.interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            interval_timer.tick().await;

            let Some(connection) = self.connection.upgrade() else {
                // Client dropped
                break;
            };

            if !connection.is_connected().await {
                continue;
            }

            let ping = Outbound::ping(chrono::Utc::now().timestamp_millis());
            let text = match ping.into_text() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("[Heartbeat] Failed to encode ping: {}", e);
                    continue;
                }
            };

            match connection.send_text(text).await {
                Ok(()) => tracing::debug!("Sent heartbeat ping"),
                Err(e) => tracing::warn!("[Heartbeat] Failed to send: {}", e),
            }
        }
    }
}
