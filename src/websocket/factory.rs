use crate::types::{RealtimeError, Result};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket factory for creating WebSocket connections
pub struct WebSocketFactory;

impl WebSocketFactory {
    /// Open a WebSocket connection
    pub async fn create(url: &str) -> Result<WsStream> {
        tracing::debug!("Creating WebSocket connection to: {}", url);
        let (stream, response) = connect_async(url).await?;
        tracing::debug!("WebSocket handshake completed with status {}", response.status());
        Ok(stream)
    }

    /// Resolve an endpoint against a base URL.
    ///
    /// `ws://`/`wss://` endpoints pass through unchanged. Relative endpoints are joined to
    /// the base, whose `http(s)` scheme is rewritten to `ws(s)`.
    pub fn build_url(base_url: &str, endpoint: &str) -> Result<String> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(RealtimeError::Connection("endpoint is required".to_string()));
        }

        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            Url::parse(endpoint)?;
            return Ok(endpoint.to_string());
        }

        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(RealtimeError::Config(format!(
                "no WebSocket base URL configured for endpoint '{}'",
                endpoint
            )));
        }

        let joined = format!(
            "{}/{}",
            http_to_ws_endpoint(base),
            endpoint.trim_start_matches('/')
        );
        Url::parse(&joined)?;
        Ok(joined)
    }
}

/// Converts an HTTP endpoint to its WebSocket equivalent
pub fn http_to_ws_endpoint(endpoint: &str) -> String {
    if let Some(rest) = endpoint.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_endpoint_passes_through() {
        let url = WebSocketFactory::build_url("wss://ignored", "ws://localhost:9000/ws/x").unwrap();
        assert_eq!(url, "ws://localhost:9000/ws/x");
    }

    #[test]
    fn test_relative_endpoint_is_joined() {
        let url = WebSocketFactory::build_url("wss://api.example.com/", "/ws/activities/co_1").unwrap();
        assert_eq!(url, "wss://api.example.com/ws/activities/co_1");

        let url = WebSocketFactory::build_url("https://api.example.com", "ws/tickets/co_1").unwrap();
        assert_eq!(url, "wss://api.example.com/ws/tickets/co_1");

        let url = WebSocketFactory::build_url("http://localhost:8000", "/ws/campaigns/c").unwrap();
        assert_eq!(url, "ws://localhost:8000/ws/campaigns/c");
    }

    #[test]
    fn test_missing_base_or_endpoint() {
        assert!(matches!(
            WebSocketFactory::build_url("", "/ws/activities/co_1"),
            Err(RealtimeError::Config(_))
        ));
        assert!(matches!(
            WebSocketFactory::build_url("wss://api.example.com", "  "),
            Err(RealtimeError::Connection(_))
        ));
    }
}
