/// Inbound/outbound message `type` strings
pub mod message_types {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const INITIAL: &str = "initial";
    pub const FULL: &str = "full";
    pub const UPDATE: &str = "update";
    pub const NEW: &str = "new";
    pub const BATCH: &str = "batch";
}

/// Keys that may carry record arrays inside an envelope, in lookup order
pub const RECORD_KEYS: [&str; 3] = ["data", "activities", "items"];

/// Default maximum reconnect attempts before the channel gives up
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default base reconnect delay (milliseconds), doubled per attempt
pub const DEFAULT_RECONNECT_DELAY: u64 = 2000;

/// Default heartbeat interval (milliseconds)
pub const HEARTBEAT_INTERVAL: u64 = 30_000;

/// Delay between teardown and reopen in `reconnect()` (milliseconds)
pub const RECONNECT_SETTLE_DELAY: u64 = 100;

/// Default HTTP timeout (milliseconds)
pub const DEFAULT_TIMEOUT: u64 = 10_000;

/// Listener queue depth for `on_event()` receivers
pub const EVENT_BUFFER_SIZE: usize = 100;

/// Activity feed cap
pub const ACTIVITY_CAP: usize = 100;

/// Default activity time window
pub const DEFAULT_ACTIVITY_WINDOW: &str = "7d";

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
pub const WS_CLOSE_GOING_AWAY: u16 = 1001;
pub const WS_CLOSE_ABNORMAL: u16 = 1006;
pub const WS_CLOSE_POLICY_VIOLATION: u16 = 1008;
pub const WS_CLOSE_SERVICE_RESTART: u16 = 1012;
pub const WS_CLOSE_UNAUTHORIZED: u16 = 4001;
pub const WS_CLOSE_FORBIDDEN: u16 = 4003;

/// Environment variable names
pub mod env_vars {
    pub const API_URL: &str = "AGENTDESK_API_URL";
    pub const WS_URL: &str = "AGENTDESK_WS_URL";
    pub const ACTIVITY_WINDOW: &str = "AGENTDESK_ACTIVITY_WINDOW";
    pub const HTTP_TIMEOUT_MS: &str = "AGENTDESK_HTTP_TIMEOUT_MS";
}
