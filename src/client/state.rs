use super::connection::ConnectionStatus;
use crate::infrastructure::{ReconnectTimer, TaskManager};
use crate::messaging::ChannelEvent;
use crate::types::Payload;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Consolidated mutable state for RealtimeClient
/// Using a single struct reduces lock contention
pub struct ClientState {
    pub status: ConnectionStatus,

    /// Bumped on every connect and disconnect; events from older sockets are dropped
    pub generation: u64,

    /// Reconnect attempt counter and backoff
    pub timer: ReconnectTimer,

    /// Whether the disconnect was manual (prevents auto-reconnect)
    pub was_manual_disconnect: bool,

    pub last_error: Option<String>,

    /// Latest non-pong payload
    pub latest: Option<Payload>,
    pub last_update: Option<DateTime<Utc>>,

    /// Socket read task
    pub task_manager: TaskManager,
    pub heartbeat_task: Option<JoinHandle<()>>,
    pub reconnect_task: Option<JoinHandle<()>>,

    /// `on_event()` subscribers
    pub listeners: Vec<mpsc::Sender<ChannelEvent>>,

    /// Sender for status change notifications
    pub status_tx: watch::Sender<ConnectionStatus>,
}

impl ClientState {
    pub fn new(timer: ReconnectTimer, status_tx: watch::Sender<ConnectionStatus>) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            generation: 0,
            timer,
            was_manual_disconnect: false,
            last_error: None,
            latest: None,
            last_update: None,
            task_manager: TaskManager::new(),
            heartbeat_task: None,
            reconnect_task: None,
            listeners: Vec::new(),
            status_tx,
        }
    }

    /// Updates the status. Returns false if it was already `status`.
    pub fn set_status(&mut self, status: ConnectionStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.status_tx.send_replace(status);
        true
    }

    /// Live listeners, pruning the ones whose receiver was dropped
    pub fn listeners(&mut self) -> Vec<mpsc::Sender<ChannelEvent>> {
        self.listeners.retain(|tx| !tx.is_closed());
        self.listeners.clone()
    }

    pub fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat_task.take() {
            handle.abort();
        }
    }

    pub fn cancel_reconnect(&mut self) -> bool {
        match self.reconnect_task.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts every background task owned by the channel
    pub fn abort_tasks(&mut self) {
        self.cancel_reconnect();
        self.stop_heartbeat();
        self.task_manager.abort_all();
    }
}
