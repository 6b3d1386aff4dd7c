//! Transport abstraction for executing requests.
//!
//! This module defines the `Transport` trait to abstract request execution,
//! enabling the session gate to wrap any implementation and tests to script
//! responses without a server.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{ReauthError, Result};
use crate::request::ApiRequest;
use crate::response::{ApiError, ApiResult, normalize};

mod mock;

pub use mock::{MockCall, MockTransport};

/// Trait for executing a single request.
///
/// Implementations perform exactly one attempt: no retries, no state carried
/// between calls. Every outcome, including network failures, is reported
/// through the returned [`ApiResult`].
///
/// # Example
/// ```ignore
/// let transport = ReqwestTransport::new(TransportConfig::default())?;
/// match transport.execute(&ApiRequest::get("/tasks")).await {
///     Ok(response) => println!("{}", response.body),
///     Err(error) => eprintln!("{error}"),
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request` once and return the normalized outcome.
    async fn execute(&self, request: &ApiRequest) -> ApiResult;
}

/// Configuration for [`ReqwestTransport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL every request path is appended to (e.g., <https://api.example.com>)
    pub base_url: String,

    /// Timeout for each individual request in milliseconds
    pub timeout_ms: u64,

    /// Keep cookies set by the server and send them on later requests.
    ///
    /// Session tokens issued as cookies by `/auth/*` endpoints only reach the
    /// other endpoints when this is on.
    pub cookie_store: bool,

    /// Headers sent with every request
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 30_000,
            cookie_store: true,
            default_headers: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production transport using reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    timeout_ms: u64,
}

impl ReqwestTransport {
    /// Build a transport from configuration.
    ///
    /// # Errors
    /// Returns [`ReauthError::InvalidConfig`] if the base URL or a default
    /// header doesn't parse, and [`ReauthError::HttpClient`] if the underlying
    /// client can't be built.
    pub fn new(config: TransportConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ReauthError::InvalidConfig(format!("base_url '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ReauthError::InvalidConfig(format!(
                "base_url '{}' cannot be used as a base",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ReauthError::InvalidConfig(format!("default header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ReauthError::InvalidConfig(format!("default header '{}' value: {}", name, e))
            })?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .cookie_store(config.cookie_store)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout_ms: config.timeout_ms,
        })
    }

    /// Full URL for a request path.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(request = %request))]
    async fn execute(&self, request: &ApiRequest) -> ApiResult {
        let url = self.url_for(&request.path);

        tracing::debug!(url = %url, timeout_ms = self.timeout_ms, "Executing HTTP request");

        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            tracing::error!(method = %request.method, error = %e, "Invalid HTTP method");
            ApiError::InvalidRequest(format!("invalid HTTP method '{}': {}", request.method, e))
        })?;

        let mut req = self
            .client
            .request(method, &url)
            .timeout(Duration::from_millis(self.timeout_ms));

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if request.sends_body()
            && let Some(body) = &request.body
        {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "HTTP request failed");
            ApiError::from_reqwest(&e, self.timeout_ms)
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(&e, self.timeout_ms))?;

        tracing::debug!(status, response_len = body.len(), "HTTP request completed");

        normalize(status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout_ms, 30_000);
        assert!(config.cookie_store);
        assert!(ReqwestTransport::new(config).is_ok());
    }

    #[test]
    fn test_url_for_joins_slashes() {
        let transport = ReqwestTransport::new(TransportConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(transport.url_for("/tasks"), "https://api.example.com/v1/tasks");
        assert_eq!(transport.url_for("tasks"), "https://api.example.com/v1/tasks");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let result = ReqwestTransport::new(TransportConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ReauthError::InvalidConfig(_))));

        let result = ReqwestTransport::new(TransportConfig {
            base_url: "mailto:someone@example.com".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ReauthError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_default_header() {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("bad header".to_string(), "x".to_string());

        let result = ReqwestTransport::new(TransportConfig {
            default_headers,
            ..Default::default()
        });
        assert!(matches!(result, Err(ReauthError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_invalid_method_is_reported_not_sent() {
        let transport = ReqwestTransport::new(TransportConfig::default()).unwrap();
        let request = ApiRequest::new("NOT A METHOD", "/tasks");

        let result = transport.execute(&request).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }
}
