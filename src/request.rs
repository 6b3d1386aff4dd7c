//! Request descriptions submitted to a transport.
//!
//! An [`ApiRequest`] is a plain value: it says what to send, not how. The
//! session gate re-submits the exact same value when it retries, so nothing
//! downstream is allowed to mutate one.

use std::collections::BTreeMap;

use serde::Serialize;

/// One HTTP call against the API.
///
/// Built with the verb constructors and consuming `with_*` methods:
///
/// ```
/// use reauth::ApiRequest;
///
/// let request = ApiRequest::get("/tasks")
///     .with_query("listId", "42")
///     .with_header("x-client", "web");
/// assert_eq!(request.key(), "GET /tasks");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct ApiRequest {
    /// HTTP method, upper-case (e.g., "GET", "POST")
    pub method: String,

    /// Path relative to the transport's base URL (e.g., "/tasks")
    pub path: String,

    /// Query string pairs, in insertion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,

    /// Extra headers for this request only
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// JSON body, sent with `Content-Type: application/json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a request with an arbitrary method. The method is upper-cased.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new("PUT", path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new("PATCH", path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path)
    }

    /// Append a query pair.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the JSON body.
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` and set it as the JSON body.
    pub fn with_body<B: Serialize>(self, body: &B) -> serde_json::Result<Self> {
        Ok(self.with_json(serde_json::to_value(body)?))
    }

    /// Key identifying the endpoint, formatted as "{method} {path}".
    ///
    /// Used in log fields and by [`MockTransport`](crate::transport::MockTransport)
    /// to look up scripted responses.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Whether a body should be sent for this method.
    ///
    /// GET, HEAD and DELETE requests never carry one, even if `body` is set.
    pub fn sends_body(&self) -> bool {
        self.body.is_some() && !matches!(self.method.as_str(), "GET" | "HEAD" | "DELETE")
    }
}

impl std::fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
