//! Session-aware request layer for the task list API.
//!
//! Callers hand [`ApiRequest`]s to a [`SessionGate`], which forwards them to a
//! [`Transport`]. When the session has expired, the gate runs a single shared
//! refresh for every request that noticed, then retries each of those requests
//! exactly once. If the refresh fails, callers get their original unauthorized
//! error back and can send the user to sign in.
//!
//! ```ignore
//! let transport = Arc::new(ReqwestTransport::new(TransportConfig {
//!     base_url: "https://api.example.com".to_string(),
//!     ..Default::default()
//! })?);
//! let gate = SessionGate::new(transport, GateConfig::default());
//!
//! let tasks = gate.execute(&ApiRequest::get("/tasks")).await?;
//! ```

pub mod auth;
pub mod error;
pub mod gate;
pub mod request;
pub mod response;
pub mod transport;

// Re-export commonly used types
pub use auth::Credentials;
pub use error::{ReauthError, Result};
pub use gate::{GateConfig, GateStats, RefreshState, SessionGate, default_should_refresh};
pub use request::ApiRequest;
pub use response::{ApiError, ApiResult, HttpResponse};
pub use transport::{MockTransport, ReqwestTransport, Transport, TransportConfig};
