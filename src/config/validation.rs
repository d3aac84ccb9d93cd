//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs, path prefixes and header names
//! - Detect route collisions between the backend prefix, tunnels and the refresh route
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - An empty tenant domain is left to `TenantProxy` construction

use std::collections::HashSet;
use std::fmt;

use axum::http::HeaderName;
use url::Url;

use crate::config::schema::EdgeConfig;

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_origin(&mut errors, "upstream.base_url", &config.upstream.base_url);
    check_prefix(&mut errors, "upstream.proxy_prefix", &config.upstream.proxy_prefix);
    check_prefix(&mut errors, "auth.refresh_path", &config.auth.refresh_path);

    if !config.auth.upstream_refresh_path.starts_with('/') {
        errors.push(ValidationError::new(
            "auth.upstream_refresh_path",
            "must start with '/'",
        ));
    }

    if HeaderName::from_bytes(config.tenant.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "tenant.header_name",
            format!("'{}' is not a valid header name", config.tenant.header_name),
        ));
    }

    for name in &config.upstream.exclude_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "upstream.exclude_headers",
                format!("'{name}' is not a valid header name"),
            ));
        } else if name.eq_ignore_ascii_case(&config.tenant.header_name) {
            errors.push(ValidationError::new(
                "upstream.exclude_headers",
                "must not exclude the tenant header",
            ));
        }
    }

    if config.auth.refresh_cookie.is_empty() {
        errors.push(ValidationError::new("auth.refresh_cookie", "must not be empty"));
    }

    if config.auth.wait_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "auth.wait_timeout_ms",
            "must be greater than zero",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be greater than zero",
        ));
    }

    let mut mounted: HashSet<&str> = HashSet::new();
    mounted.insert(config.upstream.proxy_prefix.as_str());
    if !mounted.insert(config.auth.refresh_path.as_str()) {
        errors.push(ValidationError::new(
            "auth.refresh_path",
            "collides with upstream.proxy_prefix",
        ));
    }

    for (i, tunnel) in config.prefix_proxies.iter().enumerate() {
        let field = format!("prefix_proxies[{i}]");
        check_prefix(&mut errors, &format!("{field}.prefix"), &tunnel.prefix);
        check_origin(&mut errors, &format!("{field}.target"), &tunnel.target);
        if !mounted.insert(tunnel.prefix.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.prefix"),
                format!("'{}' is already mounted", tunnel.prefix),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_origin(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
        Ok(_) => errors.push(ValidationError::new(
            field,
            format!("'{value}' must be an absolute http(s) URL with a host"),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("'{value}': {e}"))),
    }
}

fn check_prefix(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !value.starts_with('/') || value.len() < 2 {
        errors.push(ValidationError::new(
            field,
            "must start with '/' and name at least one segment",
        ));
    } else if value.ends_with('/') {
        errors.push(ValidationError::new(field, "must not end with '/'"));
    } else if value.contains(['{', '}', '*']) {
        errors.push(ValidationError::new(field, "must be a literal path"));
    }
}
