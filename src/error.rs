//! Error taxonomy for the edge.
//!
//! # Classes
//! - [`ConfigError`]: fatal, raised before the listener binds
//! - [`ProxyError`]: transport class, recovered into a uniform 500 response
//! - [`AuthError`]: credential class, stops the refresh loop or fails a wait
//! - [`ClientError`]: raised by the authenticated client before or while sending

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::config::validation::ValidationError;

/// Fatal configuration problems. None of these are recoverable per request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// The tenant identity is empty or missing. The proxy must not serve.
    #[error("tenant identity is not configured (set TENANT_DOMAIN or tenant.domain)")]
    MissingTenant,

    /// The tenant identity cannot be carried in an HTTP header.
    #[error("tenant domain '{0}' is not a valid header value")]
    InvalidTenant(String),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures inside a single forward. Always rendered as a 500.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid destination: {0}")]
    Resolve(String),

    #[error("request transform failed: {0}")]
    Transform(String),

    #[error("response transform failed: {0}")]
    ResponseTransform(String),

    #[error("invalid header value for {name}")]
    InvalidHeader { name: String },

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl ProxyError {
    /// Short client-visible message. Never includes the wrapped error's source chain.
    pub fn client_message(&self) -> String {
        format!("Proxy error: {self}")
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        // Only the top-level message; reqwest's source chain can leak internal addresses.
        let kind = if err.is_connect() {
            "connection failed"
        } else if err.is_timeout() {
            "timed out"
        } else if err.is_body() {
            "body stream error"
        } else {
            "request error"
        };
        ProxyError::Upstream(kind.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.client_message()).into_response()
    }
}

/// Credential lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credential not available within {0:?}")]
    WaitTimeout(Duration),

    #[error("refresh credential is missing")]
    MissingRefreshCredential,

    #[error("refresh rejected with status {0}")]
    RefreshRejected(StatusCode),

    #[error("credential endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credential endpoint returned an invalid body: {0}")]
    InvalidResponse(String),

    #[error("refresh scheduler already started")]
    NotIdle,

    #[error("refresh scheduler was stopped")]
    Stopped,
}

impl AuthError {
    /// Whether this error means the caller must re-authenticate (401 class).
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::MissingRefreshCredential | AuthError::RefreshRejected(_)
        )
    }
}

/// Errors from [`crate::auth::ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No bearer credential arrived in time; the request was not sent.
    #[error("credential unavailable: {0}")]
    CredentialUnavailable(#[source] AuthError),

    #[error("invalid endpoint path: {0}")]
    InvalidPath(String),

    #[error("bearer token is not a valid header value")]
    InvalidToken,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
