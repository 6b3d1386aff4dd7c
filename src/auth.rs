//! Request descriptions for the session endpoints under `/auth`.

use serde::{Deserialize, Serialize};

use crate::request::ApiRequest;

pub const REFRESH_PATH: &str = "/auth/refresh";
pub const SIGN_IN_PATH: &str = "/auth/signin";
pub const SIGN_UP_PATH: &str = "/auth/signup";
pub const SIGN_OUT_PATH: &str = "/auth/signout";
pub const ME_PATH: &str = "/auth/me";

/// Email/password pair for sign-in and sign-up.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `POST /auth/refresh`: re-establish the session from the refresh credential.
pub fn refresh() -> ApiRequest {
    ApiRequest::post(REFRESH_PATH)
}

/// `POST /auth/signin`.
pub fn sign_in(credentials: &Credentials) -> serde_json::Result<ApiRequest> {
    ApiRequest::post(SIGN_IN_PATH).with_body(credentials)
}

/// `POST /auth/signup`.
pub fn sign_up(credentials: &Credentials) -> serde_json::Result<ApiRequest> {
    ApiRequest::post(SIGN_UP_PATH).with_body(credentials)
}

pub fn sign_out() -> ApiRequest {
    ApiRequest::post(SIGN_OUT_PATH)
}

/// `GET /auth/me`: the signed-in user.
pub fn me() -> ApiRequest {
    ApiRequest::get(ME_PATH)
}
