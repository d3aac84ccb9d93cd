//! Refresh route: exchanges the refresh cookie for a bearer credential.
//!
//! # Responsibilities
//! - Read the refresh cookie (absent → 401)
//! - POST `{"refresh": <cookie>}` to the backend refresh path with the tenant header set
//! - Pass a successful body through unchanged
//! - Delete the cookie whenever the backend refuses or cannot be reached
//!
//! # Design Decisions
//! - The call goes through the same [`UpstreamTransport`] as forwarded traffic
//! - A backend refusal is always reported as 401, whatever status the backend used

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request, Response, StatusCode},
    response::IntoResponse,
};
use url::Url;

use crate::error::ProxyError;
use crate::observability::metrics;
use crate::proxy::{parse_destination, CookieJar, TenantIdentity, UpstreamTransport};

/// Edge side of the credential contract.
pub struct RefreshEndpoint {
    destination: Url,
    cookie_name: String,
    tenant_header: HeaderName,
    identity: TenantIdentity,
    transport: Arc<dyn UpstreamTransport>,
}

impl std::fmt::Debug for RefreshEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshEndpoint")
            .field("destination", &self.destination.as_str())
            .field("cookie_name", &self.cookie_name)
            .field("tenant", &self.identity)
            .finish()
    }
}

impl RefreshEndpoint {
    /// `upstream_path` is joined onto `base_url` as-is.
    pub fn new(
        base_url: &Url,
        upstream_path: &str,
        cookie_name: impl Into<String>,
        tenant_header: HeaderName,
        identity: TenantIdentity,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Result<Self, ProxyError> {
        let base = base_url.as_str().trim_end_matches('/');
        let destination = parse_destination(&format!("{base}{upstream_path}"))?;
        Ok(Self {
            destination,
            cookie_name: cookie_name.into(),
            tenant_header,
            identity,
            transport,
        })
    }

    pub fn destination(&self) -> &Url {
        &self.destination
    }

    pub async fn handle(&self, cookies: &CookieJar) -> Response<Body> {
        let Some(refresh) = cookies.get(&self.cookie_name) else {
            tracing::debug!(cookie = %self.cookie_name, "Refresh requested without cookie");
            metrics::record_credential_refresh("missing_cookie");
            return StatusCode::UNAUTHORIZED.into_response();
        };

        match self.exchange(refresh).await {
            Ok(response) if response.status().is_success() => {
                metrics::record_credential_refresh("success");
                passthrough(response)
            }
            Ok(response) => {
                tracing::warn!(
                    status = response.status().as_u16(),
                    tenant = %self.identity,
                    "Backend rejected refresh credential"
                );
                metrics::record_credential_refresh("rejected");
                self.clear_cookie(StatusCode::UNAUTHORIZED.into_response())
            }
            Err(err) => {
                tracing::error!(error = %err, tenant = %self.identity, "Refresh exchange failed");
                metrics::record_credential_refresh("failure");
                self.clear_cookie(err.into_response())
            }
        }
    }

    async fn exchange(&self, refresh: &str) -> Result<Response<Body>, ProxyError> {
        let payload = serde_json::json!({ "refresh": refresh });
        let body =
            serde_json::to_vec(&payload).map_err(|e| ProxyError::Transform(e.to_string()))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.destination.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header(&self.tenant_header, self.identity.header_value().clone())
            .body(Body::from(body))
            .map_err(|e| ProxyError::Resolve(e.to_string()))?;

        self.transport.send(request).await
    }

    fn clear_cookie(&self, mut response: Response<Body>) -> Response<Body> {
        let expired = format!("{}=; Path=/; Max-Age=0", self.cookie_name);
        match HeaderValue::from_str(&expired) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(_) => {
                tracing::warn!(cookie = %self.cookie_name, "Cookie name is not a valid header value");
            }
        }
        response
    }
}

/// Status forced to 200; content type and body kept.
fn passthrough(upstream: Response<Body>) -> Response<Body> {
    let (parts, body) = upstream.into_parts();
    let mut response = Response::new(body);
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    response
}
