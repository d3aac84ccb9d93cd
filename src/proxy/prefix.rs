//! Prefix-stripping tunnels to third-party origins.
//!
//! `/posthog/decide?v=3` with prefix `/posthog` and target
//! `https://app.posthog.com` is forwarded to `https://app.posthog.com/decide?v=3`.

use std::sync::Arc;

use url::{Position, Url};

use crate::proxy::forwarder::{parse_destination, DestinationResolver, ProxyForwarder};
use crate::proxy::request::IncomingRequest;
use crate::proxy::transport::UpstreamTransport;

/// Forwarder for one tunnel. Only `host` is excluded and no tenant header is added.
pub fn prefix_proxy(
    prefix: &str,
    target: &str,
    transport: Arc<dyn UpstreamTransport>,
) -> ProxyForwarder {
    ProxyForwarder::new(
        format!("tunnel:{prefix}"),
        prefix_resolver(prefix, target),
        transport,
    )
}

/// Strip a leading `prefix` from the path and append the rest to `target`.
pub fn prefix_resolver(prefix: &str, target: &str) -> DestinationResolver {
    let prefix = prefix.trim_end_matches('/').to_string();
    let target = target.trim_end_matches('/').to_string();
    Arc::new(move |url: &Url, _: &IncomingRequest| {
        let path = url.path();
        let rest = match path.strip_prefix(prefix.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        };
        let query = &url[Position::AfterPath..Position::AfterQuery];
        parse_destination(&format!("{target}{rest}{query}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};

    fn resolve(prefix: &str, target: &str, inbound: &str) -> String {
        let resolver = prefix_resolver(prefix, target);
        let url = Url::parse(inbound).unwrap();
        let request = IncomingRequest::new(Method::GET, url.clone(), HeaderMap::new(), None);
        resolver(&url, &request).unwrap().to_string()
    }

    #[test]
    fn strips_prefix_and_keeps_query() {
        assert_eq!(
            resolve("/posthog", "https://app.posthog.com", "http://edge.local/posthog/decide?v=3"),
            "https://app.posthog.com/decide?v=3"
        );
    }

    #[test]
    fn bare_prefix_maps_to_target_root() {
        assert_eq!(
            resolve("/posthog", "https://app.posthog.com/", "http://edge.local/posthog"),
            "https://app.posthog.com/"
        );
    }

    #[test]
    fn only_whole_segments_are_stripped() {
        assert_eq!(
            resolve("/posthog", "https://app.posthog.com", "http://edge.local/posthogx/e"),
            "https://app.posthog.com/posthogx/e"
        );
    }
}
