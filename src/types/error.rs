use thiserror::Error;

/// Errors that can occur when using the AgentDesk realtime client.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authentication or authorization error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error that is not a connectivity problem
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server could not be reached (connect refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The requested resource does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-2xx API response with the server's `error`/`message` text
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (session persistence, file upload)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,
}

impl RealtimeError {
    /// Whether this error means the backend was unreachable rather than refusing the request
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
