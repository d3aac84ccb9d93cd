//! Where fresh credentials come from.

use axum::http::{header, StatusCode};
use futures_util::future::BoxFuture;
use url::Url;

use crate::auth::credential::Credential;
use crate::error::AuthError;

/// Mints a new [`Credential`]. Called once by `start` and once per scheduled refresh.
pub trait CredentialSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<Credential, AuthError>>;
}

/// Calls the edge refresh route with the refresh cookie.
#[derive(Clone)]
pub struct HttpCredentialSource {
    client: reqwest::Client,
    endpoint: Url,
    cookie_name: String,
    refresh_credential: Option<String>,
}

impl std::fmt::Debug for HttpCredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCredentialSource")
            .field("endpoint", &self.endpoint.as_str())
            .field("cookie_name", &self.cookie_name)
            .field("has_refresh_credential", &self.refresh_credential.is_some())
            .finish()
    }
}

impl HttpCredentialSource {
    /// `refresh_credential` of `None` makes every fetch fail with
    /// [`AuthError::MissingRefreshCredential`] without touching the network.
    pub fn new(
        client: reqwest::Client,
        endpoint: Url,
        cookie_name: impl Into<String>,
        refresh_credential: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            cookie_name: cookie_name.into(),
            refresh_credential: refresh_credential.filter(|v| !v.is_empty()),
        }
    }

    async fn fetch_once(&self) -> Result<Credential, AuthError> {
        let refresh = self
            .refresh_credential
            .as_deref()
            .ok_or(AuthError::MissingRefreshCredential)?;

        let response = self
            .client
            .get(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, format!("{}={}", self.cookie_name, refresh))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(status = %status, endpoint = %self.endpoint, "Credential refresh rejected");
            return Err(AuthError::RefreshRejected(status));
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<Credential>(&body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}

impl CredentialSource for HttpCredentialSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        Box::pin(self.fetch_once())
    }
}
