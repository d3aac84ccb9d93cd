//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the tenant edge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single backend this deployment fronts.
    pub upstream: UpstreamConfig,

    /// Tenant identity injected into every forwarded request.
    pub tenant: TenantConfig,

    /// Credential endpoint and bearer injection settings.
    pub auth: AuthConfig,

    /// Third-party tunnels (prefix stripped, forwarded verbatim).
    pub prefix_proxies: Vec<PrefixProxyConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend origin (e.g., "https://backend.internal").
    pub base_url: String,

    /// Inbound path prefix forwarded to the backend with the path unchanged.
    pub proxy_prefix: String,

    /// Extra header names never forwarded (`host` is always excluded).
    pub exclude_headers: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            proxy_prefix: "/api".to_string(),
            exclude_headers: Vec::new(),
        }
    }
}

/// Tenant configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TenantConfig {
    /// Tenant domain. Empty means "not configured" and is fatal at startup.
    pub domain: String,

    /// Header carrying the tenant domain to the backend.
    pub header_name: String,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            header_name: "X-Tenant-Domain".to_string(),
        }
    }
}

/// Credential lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Edge route that mints a bearer credential from the refresh cookie.
    pub refresh_path: String,

    /// Name of the cookie holding the refresh credential.
    pub refresh_cookie: String,

    /// Backend path that exchanges a refresh credential for a bearer token.
    pub upstream_refresh_path: String,

    /// Path prefixes exempt from bearer injection.
    pub unprotected_prefixes: Vec<String>,

    /// How long a protected call waits for a credential, in milliseconds.
    pub wait_timeout_ms: u64,

    /// Renewal happens this many seconds before expiry.
    pub safety_margin_secs: u64,

    /// Lower bound on the delay between two refreshes, in milliseconds.
    pub min_refresh_interval_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/refresh-token".to_string(),
            refresh_cookie: "refresh-token".to_string(),
            upstream_refresh_path: "/api/accounts/token/refresh/".to_string(),
            unprotected_prefixes: vec![
                "/api/accounts/signup/".to_string(),
                "/api/accounts/login/".to_string(),
                "/api/accounts/token/refresh/".to_string(),
                "/api/accounts/password/reset/".to_string(),
                "/api/accounts/password/reset/confirm/".to_string(),
            ],
            wait_timeout_ms: 10_000,
            safety_margin_secs: 5,
            min_refresh_interval_ms: 1_000,
        }
    }
}

/// A third-party tunnel such as `/posthog` → `https://app.posthog.com`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrefixProxyConfig {
    /// Inbound prefix, stripped before forwarding.
    pub prefix: String,

    /// Target origin the remaining path is appended to.
    pub target: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout towards upstreams, in seconds.
    pub connect_secs: u64,

    /// Edge-level request timeout, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
