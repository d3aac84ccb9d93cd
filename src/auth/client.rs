//! Outbound client that attaches the bearer credential.
//!
//! # Responsibilities
//! - Pass unprotected endpoints (sign-up, login, ...) through untouched
//! - Wait for the store, then replace any `Authorization` header with the bearer
//! - Never send a protected request without a credential

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header::AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response};
use url::Url;

use crate::auth::store::CredentialStore;
use crate::config::AuthConfig;
use crate::error::ClientError;

/// HTTP client bound to one API base URL and one credential store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<CredentialStore>,
    unprotected: Vec<String>,
    wait_timeout: Duration,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        store: Arc<CredentialStore>,
        unprotected: Vec<String>,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            store,
            unprotected,
            wait_timeout,
        }
    }

    /// Allow-list and wait timeout taken from `[auth]`.
    pub fn from_config(
        http: reqwest::Client,
        base_url: Url,
        store: Arc<CredentialStore>,
        config: &AuthConfig,
    ) -> Self {
        Self::new(
            http,
            base_url,
            store,
            config.unprotected_prefixes.clone(),
            Duration::from_millis(config.wait_timeout_ms),
        )
    }

    /// `path` is appended to the base URL, e.g. `/accounts/login/` on `http://edge/api`.
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| ClientError::InvalidPath(format!("{path}: {e}")))
    }

    /// Start a request; send it with [`send`](Self::send).
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    pub fn is_unprotected(&self, path: &str) -> bool {
        self.unprotected
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        self.execute(builder.build()?).await
    }

    pub async fn execute(&self, mut request: Request) -> Result<Response, ClientError> {
        if self.is_unprotected(request.url().path()) {
            tracing::trace!(path = request.url().path(), "Unprotected endpoint, no bearer");
            return Ok(self.http.execute(request).await?);
        }

        let token = self
            .store
            .wait_for(self.wait_timeout)
            .await
            .map_err(|err| {
                tracing::warn!(
                    path = request.url().path(),
                    error = %err,
                    "No credential for protected request, not sending"
                );
                ClientError::CredentialUnavailable(err)
            })?;

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|_| ClientError::InvalidToken)?;
        value.set_sensitive(true);
        // `insert` drops every existing Authorization value.
        request.headers_mut().insert(AUTHORIZATION, value);

        Ok(self.http.execute(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    fn client(store: Arc<CredentialStore>) -> ApiClient {
        ApiClient::from_config(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/api").unwrap(),
            store,
            &AuthConfig::default(),
        )
    }

    #[test]
    fn joins_paths_under_base() {
        let client = client(Arc::new(CredentialStore::new()));
        assert_eq!(
            client.url("/accounts/login/").unwrap().as_str(),
            "http://127.0.0.1:9/api/accounts/login/"
        );
        assert_eq!(
            client.url("widgets?x=1").unwrap().as_str(),
            "http://127.0.0.1:9/api/widgets?x=1"
        );
    }

    #[test]
    fn allow_list_matches_prefixes() {
        let client = client(Arc::new(CredentialStore::new()));
        assert!(client.is_unprotected("/api/accounts/login/"));
        assert!(client.is_unprotected("/api/accounts/password/reset/confirm/"));
        assert!(!client.is_unprotected("/api/accounts/logout/"));
        assert!(!client.is_unprotected("/api/widgets"));
    }

    #[tokio::test(start_paused = true)]
    async fn protected_call_without_credential_is_not_sent() {
        let store = Arc::new(CredentialStore::new());
        let client = client(store.clone());

        let builder = client.request(Method::GET, "/widgets").unwrap();
        let err = client.send(builder).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::CredentialUnavailable(AuthError::WaitTimeout(_))
        ));
        assert_eq!(store.waiter_count(), 0);
    }
}
