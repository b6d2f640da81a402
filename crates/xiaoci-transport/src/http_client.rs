//! HTTP client for outbound API calls.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reqwest::ClientBuilder;
use serde_json::Value;
use tracing::{debug, info};

use xiaoci_core::{PostJsonFn, TransportError, TransportResult};

/// Default timeout for one API request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for [`http_post_json`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL, e.g. `http://127.0.0.1:3000`.
    pub api_url: String,
    /// Bearer token, if the gateway requires one.
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Joins a base URL and an endpoint with exactly one slash.
pub fn endpoint_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Builds a [`PostJsonFn`] that posts to `{api_url}/{endpoint}`.
pub fn http_post_json(config: HttpClientConfig) -> TransportResult<PostJsonFn> {
    info!(url = %config.api_url, "Creating HTTP API client");

    let client = ClientBuilder::new()
        .timeout(config.timeout)
        .build()
        .map_err(|e| TransportError::Io(e.to_string()))?;
    let base = Arc::new(config.api_url);
    let token = Arc::new(config.access_token);

    let post_json: PostJsonFn = Arc::new(move |endpoint: String, body: Value| {
        let client = client.clone();
        let url = endpoint_url(&base, &endpoint);
        let token = token.clone();
        async move {
            debug!(url = %url, "POST");
            let mut req = client.post(&url).json(&body);
            if let Some(t) = token.as_deref() {
                req = req.bearer_auth(t);
            }
            let resp = req.send().await.map_err(|e| {
                if e.is_connect() {
                    TransportError::ConnectionFailed {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                } else {
                    TransportError::SendFailed(e.to_string())
                }
            })?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(TransportError::Io(format!(
                    "HTTP {} error: {}",
                    status.as_u16(),
                    text
                )));
            }
            resp.json::<Value>()
                .await
                .map_err(|e| TransportError::Io(e.to_string()))
        }
        .boxed()
    });

    Ok(post_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        assert_eq!(
            endpoint_url("http://127.0.0.1:3000", "send_msg"),
            "http://127.0.0.1:3000/send_msg"
        );
        assert_eq!(
            endpoint_url("http://127.0.0.1:3000/", "/send_group_forward_msg"),
            "http://127.0.0.1:3000/send_group_forward_msg"
        );
    }

    #[test]
    fn test_config_drops_empty_token() {
        let config = HttpClientConfig::new("http://x").with_access_token(Some(String::new()));
        assert!(config.access_token.is_none());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
