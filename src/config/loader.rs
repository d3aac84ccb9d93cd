//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::EdgeConfig;
use crate::config::validation::validate_config;
use crate::error::ConfigError;

/// Overrides `tenant.domain`.
pub const TENANT_DOMAIN_ENV: &str = "TENANT_DOMAIN";
/// Overrides `upstream.base_url`.
pub const UPSTREAM_URL_ENV: &str = "EDGE_UPSTREAM_URL";

/// Load, apply environment overrides and validate a TOML file.
pub fn load_config(path: &Path) -> Result<EdgeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: EdgeConfig = toml::from_str(&content)?;
    finalize(config, |key| std::env::var(key).ok())
}

/// Build a configuration from defaults plus the environment, for running without a file.
pub fn load_from_env() -> Result<EdgeConfig, ConfigError> {
    finalize(EdgeConfig::default(), |key| std::env::var(key).ok())
}

/// Apply overrides from `lookup`, then validate.
pub fn finalize<F>(mut config: EdgeConfig, lookup: F) -> Result<EdgeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Server-side environment wins over the file. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut EdgeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(domain) = lookup(TENANT_DOMAIN_ENV).filter(|v| !v.trim().is_empty()) {
        config.tenant.domain = domain.trim().to_string();
    }
    if let Some(url) = lookup(UPSTREAM_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.upstream.base_url = url.trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = EdgeConfig::default();
        config.tenant.domain = "from-file.example.com".into();

        let config = finalize(
            config,
            env(&[
                (TENANT_DOMAIN_ENV, "acme.example.com"),
                (UPSTREAM_URL_ENV, "https://backend.internal"),
            ]),
        )
        .unwrap();

        assert_eq!(config.tenant.domain, "acme.example.com");
        assert_eq!(config.upstream.base_url, "https://backend.internal");
    }

    #[test]
    fn blank_environment_is_ignored() {
        let mut config = EdgeConfig::default();
        config.tenant.domain = "from-file.example.com".into();

        let config = finalize(config, env(&[(TENANT_DOMAIN_ENV, "   ")])).unwrap();
        assert_eq!(config.tenant.domain, "from-file.example.com");
    }

    #[test]
    fn invalid_override_fails_validation() {
        let err = finalize(EdgeConfig::default(), env(&[(UPSTREAM_URL_ENV, "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
