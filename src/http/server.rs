//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the tenant proxy (refusing to start without a tenant identity)
//! - Create the Axum Router: backend prefix, third-party tunnels, refresh route
//! - Wire up middleware (timeout, request ID, tracing)
//! - Serve on a listener until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::validation::ValidationError;
use crate::config::EdgeConfig;
use crate::error::ConfigError;
use crate::http::refresh::RefreshEndpoint;
use crate::proxy::{
    prefix_proxy, CookieJar, HeaderExclusionSet, HttpTransport, IncomingRequest, ProxyForwarder,
    TenantIdentity, TenantProxy, UpstreamTransport,
};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub tenant: Arc<TenantProxy>,
    pub refresh: Arc<RefreshEndpoint>,
}

/// HTTP server for the tenant edge.
pub struct HttpServer {
    router: Router,
    config: EdgeConfig,
}

impl HttpServer {
    /// Build the server over a `reqwest` transport.
    ///
    /// Fails with [`ConfigError::MissingTenant`] when no tenant identity is configured.
    pub fn new(config: EdgeConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeouts.connect_secs))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build the server over any transport.
    pub fn with_transport(
        config: EdgeConfig,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Result<Self, ConfigError> {
        let identity = TenantIdentity::new(Some(&config.tenant.domain))?;

        let header_name = HeaderName::from_bytes(config.tenant.header_name.as_bytes())
            .map_err(|e| invalid("tenant.header_name", e))?;
        let base_url =
            Url::parse(&config.upstream.base_url).map_err(|e| invalid("upstream.base_url", e))?;
        let exclusions = HeaderExclusionSet::new(&config.upstream.exclude_headers)
            .map_err(|e| invalid("upstream.exclude_headers", e))?;

        let refresh = RefreshEndpoint::new(
            &base_url,
            &config.auth.upstream_refresh_path,
            config.auth.refresh_cookie.clone(),
            header_name.clone(),
            identity.clone(),
            transport.clone(),
        )
        .map_err(|e| invalid("auth.upstream_refresh_path", e))?;

        let tenant = TenantProxy::new(
            identity,
            header_name,
            base_url,
            exclusions,
            transport.clone(),
        );

        let state = AppState {
            tenant: Arc::new(tenant),
            refresh: Arc::new(refresh),
        };

        let router = Self::build_router(&config, state, transport);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &EdgeConfig,
        state: AppState,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Router {
        let prefix = config.upstream.proxy_prefix.as_str();

        let mut router = Router::new()
            .route(prefix, any(backend_handler))
            .route(&format!("{prefix}/"), any(backend_handler))
            .route(&format!("{prefix}/{{*path}}"), any(backend_handler))
            .route(&config.auth.refresh_path, get(refresh_handler))
            .with_state(state);

        for tunnel in &config.prefix_proxies {
            let forwarder = Arc::new(prefix_proxy(
                &tunnel.prefix,
                &tunnel.target,
                transport.clone(),
            ));
            tracing::info!(prefix = %tunnel.prefix, target = %tunnel.target, "Tunnel mounted");
            router = router.merge(tunnel_router(&tunnel.prefix, forwarder));
        }

        router
            .fallback(not_found)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The assembled router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            prefix = %self.config.upstream.proxy_prefix,
            tunnels = self.config.prefix_proxies.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }
}

fn invalid(field: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Validation(vec![ValidationError::new(field, err.to_string())])
}

fn tunnel_router(prefix: &str, forwarder: Arc<ProxyForwarder>) -> Router {
    Router::new()
        .route(prefix, any(tunnel_handler))
        .route(&format!("{prefix}/"), any(tunnel_handler))
        .route(&format!("{prefix}/{{*path}}"), any(tunnel_handler))
        .with_state(forwarder)
}

/// Backend traffic: tenant header injected, path unchanged.
async fn backend_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match IncomingRequest::from_http(request) {
        Ok(incoming) => state.tenant.forward(incoming).await,
        Err(err) => err.into_response(),
    }
}

async fn tunnel_handler(
    State(forwarder): State<Arc<ProxyForwarder>>,
    request: Request<Body>,
) -> Response {
    match IncomingRequest::from_http(request) {
        Ok(incoming) => forwarder.forward(incoming).await,
        Err(err) => err.into_response(),
    }
}

async fn refresh_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state
        .refresh
        .handle(&CookieJar::from_headers(&headers))
        .await
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
