//! Tenant-injecting backend proxy.
//!
//! # Responsibilities
//! - Forward backend traffic to `base_url + path + query`
//! - Strip any client-supplied tenant header, then set the configured identity
//! - Refuse to exist without a tenant identity
//!
//! # Design Decisions
//! - The identity is read once from server-side config and never from the request
//! - A missing identity is a construction error, not a per-request error

use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Response},
};
use url::{Position, Url};

use crate::error::{ConfigError, ProxyError};
use crate::proxy::forwarder::{
    parse_destination, DestinationResolver, ProxyForwarder, RequestTransform,
};
use crate::proxy::headers::HeaderExclusionSet;
use crate::proxy::request::IncomingRequest;
use crate::proxy::transport::UpstreamTransport;

/// The tenant domain this deployment serves.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantIdentity {
    domain: Arc<str>,
    header_value: HeaderValue,
}

impl TenantIdentity {
    /// Fails with [`ConfigError::MissingTenant`] when `domain` is absent or blank,
    /// and with [`ConfigError::InvalidTenant`] when it is not a legal header value.
    pub fn new(domain: Option<&str>) -> Result<Self, ConfigError> {
        let domain = domain
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(ConfigError::MissingTenant)?;
        let header_value = HeaderValue::from_str(domain)
            .map_err(|_| ConfigError::InvalidTenant(domain.to_string()))?;
        Ok(Self {
            domain: Arc::from(domain),
            header_value,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.domain
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.header_value
    }
}

impl fmt::Debug for TenantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TenantIdentity").field(&self.domain).finish()
    }
}

impl fmt::Display for TenantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.domain)
    }
}

/// Backend proxy that pins every request to one tenant.
#[derive(Debug, Clone)]
pub struct TenantProxy {
    forwarder: ProxyForwarder,
    identity: TenantIdentity,
    header_name: HeaderName,
}

impl TenantProxy {
    pub fn new(
        identity: TenantIdentity,
        header_name: HeaderName,
        base_url: Url,
        exclusions: HeaderExclusionSet,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Self {
        let forwarder = ProxyForwarder::new("backend", backend_resolver(base_url), transport)
            .with_request_transform(tenant_transform(header_name.clone(), identity.clone()))
            .with_exclusions(exclusions);

        tracing::info!(tenant = %identity, header = %header_name, "Tenant proxy ready");

        Self {
            forwarder,
            identity,
            header_name,
        }
    }

    pub fn identity(&self) -> &TenantIdentity {
        &self.identity
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    pub async fn forward(&self, request: IncomingRequest) -> Response<Body> {
        self.forwarder.forward(request).await
    }
}

/// `base_url` joined with the inbound path and query, verbatim.
pub fn backend_resolver(base_url: Url) -> DestinationResolver {
    let base = base_url.as_str().trim_end_matches('/').to_string();
    Arc::new(move |url: &Url, _: &IncomingRequest| {
        parse_destination(&format!(
            "{base}{}",
            &url[Position::BeforePath..Position::AfterQuery]
        ))
    })
}

/// Strip-then-set: no client value of `header_name` survives.
pub fn tenant_transform(header_name: HeaderName, identity: TenantIdentity) -> RequestTransform {
    Arc::new(
        move |request: IncomingRequest| -> Result<IncomingRequest, ProxyError> {
            let mut headers = request.headers().clone();
            headers.remove(&header_name);
            headers.insert(header_name.clone(), identity.header_value().clone());
            Ok(request.with_headers(headers))
        },
    )
}
