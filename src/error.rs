//! Error types for building and configuring the request layer.
//!
//! Per-request failures are not errors of this kind: they travel as
//! [`ApiError`](crate::response::ApiError) inside an
//! [`ApiResult`](crate::response::ApiResult) so the gate can inspect and forward them.

use thiserror::Error;

/// Result type alias using the reauth error type.
pub type Result<T> = std::result::Result<T, ReauthError>;

/// Errors raised while constructing transports and gates.
#[derive(Error, Debug)]
pub enum ReauthError {
    /// Configuration value is unusable (e.g., a base URL that doesn't parse)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
