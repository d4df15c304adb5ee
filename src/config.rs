use crate::types::constants::{DEFAULT_ACTIVITY_WINDOW, DEFAULT_TIMEOUT, env_vars};
use crate::types::{RealtimeError, Result};
use std::time::Duration;
use url::Url;

/// Endpoints and tunables read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the REST API (`http(s)://`)
    pub api_base_url: String,
    /// Base URL of the realtime endpoints (`ws(s)://` or `http(s)://`)
    pub ws_base_url: String,
    /// Time window passed to the activity feed
    pub activity_window: String,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`] when a required variable is missing or not a URL.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api = get(env_vars::API_URL);
        let ws = get(env_vars::WS_URL);

        let missing: Vec<&str> = [(env_vars::API_URL, &api), (env_vars::WS_URL, &ws)]
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(RealtimeError::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let api_base_url = validate_url(env_vars::API_URL, api.unwrap_or_default(), &["http", "https"])?;
        let ws_base_url = validate_url(
            env_vars::WS_URL,
            ws.unwrap_or_default(),
            &["ws", "wss", "http", "https"],
        )?;

        let request_timeout = match get(env_vars::HTTP_TIMEOUT_MS) {
            Some(raw) => raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| {
                RealtimeError::Config(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    env_vars::HTTP_TIMEOUT_MS,
                    raw
                ))
            })?,
            None => Duration::from_millis(DEFAULT_TIMEOUT),
        };

        Ok(Self {
            api_base_url,
            ws_base_url,
            activity_window: get(env_vars::ACTIVITY_WINDOW)
                .unwrap_or_else(|| DEFAULT_ACTIVITY_WINDOW.to_string()),
            request_timeout,
        })
    }
}

fn validate_url(key: &str, raw: String, schemes: &[&str]) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/').to_string();
    let url = Url::parse(&trimmed)
        .map_err(|e| RealtimeError::Config(format!("{} is not a valid URL: {}", key, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(RealtimeError::Config(format!(
            "{} has unsupported scheme '{}'",
            key,
            url.scheme()
        )));
    }
    Ok(trimmed)
}
