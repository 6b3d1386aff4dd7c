//! Normalized results returned by every transport.
//!
//! Each call produces exactly one [`ApiResult`]: `Ok` with the response payload
//! for 2xx statuses, or an [`ApiError`] for anything else. The session gate only
//! ever looks at the error's status code; all other detail is passed through to
//! the caller untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of a single request.
pub type ApiResult = std::result::Result<HttpResponse, ApiError>;

/// Successful response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// A failed request.
///
/// Owned strings only, so results can be cloned, compared, and handed to
/// several waiters.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum ApiError {
    /// Server answered with a non-2xx status.
    #[error("HTTP request returned error status code: {status} - {body}")]
    Http { status: u16, body: String },

    /// Connection-level failure (DNS, refused, reset, TLS, body read).
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured timeout.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The request could not be constructed (bad method, header, or URL).
    #[error("Failed to build HTTP request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Status code carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body carried by the error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Convert a reqwest failure, keeping timeouts distinguishable.
    pub fn from_reqwest(error: &reqwest::Error, timeout_ms: u64) -> Self {
        if error.is_timeout() {
            ApiError::Timeout { timeout_ms }
        } else if error.is_builder() {
            ApiError::InvalidRequest(error.to_string())
        } else {
            ApiError::Network(error.to_string())
        }
    }
}

/// Turn a raw status/body pair into an [`ApiResult`].
///
/// 2xx is success; every other status is an [`ApiError::Http`].
pub fn normalize(status: u16, body: String) -> ApiResult {
    if (200..300).contains(&status) {
        Ok(HttpResponse { status, body })
    } else {
        Err(ApiError::Http { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_success_range() {
        assert_eq!(
            normalize(200, "ok".to_string()),
            Ok(HttpResponse {
                status: 200,
                body: "ok".to_string()
            })
        );
        assert!(normalize(204, String::new()).is_ok());
        assert!(normalize(299, String::new()).is_ok());
    }

    #[test]
    fn test_normalize_error_statuses() {
        for status in [100, 301, 400, 401, 403, 404, 429, 500, 503] {
            let result = normalize(status, "nope".to_string());
            assert_eq!(
                result,
                Err(ApiError::Http {
                    status,
                    body: "nope".to_string()
                }),
                "status {status} should be a failure"
            );
        }
    }

    #[test]
    fn test_status_and_body_accessors() {
        let http = ApiError::Http {
            status: 401,
            body: "expired".to_string(),
        };
        assert_eq!(http.status(), Some(401));
        assert_eq!(http.body(), Some("expired"));

        let network = ApiError::Network("connection refused".to_string());
        assert_eq!(network.status(), None);
        assert_eq!(network.body(), None);
        assert_eq!(ApiError::Timeout { timeout_ms: 10 }.status(), None);
    }

    #[test]
    fn test_json_payload() {
        #[derive(Deserialize)]
        struct Task {
            id: u32,
            title: String,
        }

        let response = HttpResponse {
            status: 200,
            body: r#"{"id": 3, "title": "Water plants"}"#.to_string(),
        };
        let task: Task = response.json().unwrap();
        assert_eq!(task.id, 3);
        assert_eq!(task.title, "Water plants");
    }

    #[test]
    fn test_error_messages() {
        let error = ApiError::Http {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "HTTP request returned error status code: 500 - boom"
        );
        assert_eq!(
            ApiError::Timeout { timeout_ms: 250 }.to_string(),
            "Request timed out after 250ms"
        );
    }
}
