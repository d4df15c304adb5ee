use crate::config::AppConfig;
use crate::session::SessionStore;
use crate::types::constants::DEFAULT_TIMEOUT;
use crate::types::{RealtimeError, error::Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Result of a file upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// JSON REST client authenticated with the session's bearer token
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    session: SessionStore,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Result<Self> {
        Self::with_timeout(base_url, session, Duration::from_millis(DEFAULT_TIMEOUT))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        session: SessionStore,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            http,
        })
    }

    pub fn from_config(config: &AppConfig, session: SessionStore) -> Result<Self> {
        Self::with_timeout(config.api_base_url.clone(), session, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.http.get(self.url(path));
        self.execute(request, path).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.url(path)).json(body);
        self.execute(request, path).await
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.patch(self.url(path)).json(body);
        self.execute(request, path).await
    }

    /// Uploads one file as `multipart/form-data` under the `file` field
    pub async fn upload_file(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<UploadedFile> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self.http.post(self.url(path)).multipart(form);
        self.execute(request, path).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T> {
        let request = match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("GET {} returned 404", path);
            return Err(RealtimeError::NotFound(path.to_string()));
        }

        let body = response.bytes().await.map_err(classify_send_error)?;

        if !status.is_success() {
            let message = error_message(status, &body);
            tracing::warn!("Request to {} failed with {}: {}", path, status, message);
            if status == StatusCode::UNAUTHORIZED {
                return Err(RealtimeError::Auth(message));
            }
            return Err(RealtimeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if body.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

fn classify_send_error(e: reqwest::Error) -> RealtimeError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        RealtimeError::Network(e.to_string())
    } else {
        RealtimeError::Http(e)
    }
}

/// Extracts the `error` or `message` field of an error body, falling back to the status text
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message", "detail"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
