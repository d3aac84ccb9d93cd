//! Header exclusion.
//!
//! # Responsibilities
//! - Hold the set of header names never forwarded upstream
//! - Always exclude `host`; the forwarder sets it from the destination
//!
//! # Design Decisions
//! - Names are stored as `HeaderName`, which is lowercase, so membership is case-insensitive
//! - Exclusion copies into a new map; the inbound map is never mutated

use std::collections::HashSet;

use axum::http::{
    header::{HeaderName, InvalidHeaderName, HOST},
    HeaderMap,
};

/// Case-insensitive set of header names stripped before forwarding.
#[derive(Debug, Clone)]
pub struct HeaderExclusionSet {
    names: HashSet<HeaderName>,
}

impl HeaderExclusionSet {
    /// Build a set containing `host` plus the given names.
    pub fn new<I, S>(extra: I) -> Result<Self, InvalidHeaderName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = HashSet::new();
        names.insert(HOST);
        for name in extra {
            names.insert(HeaderName::from_bytes(name.as_ref().trim().as_bytes())?);
        }
        Ok(Self { names })
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Copy `headers` minus excluded names, keeping every value of a repeated header in order.
    pub fn apply(&self, headers: &HeaderMap) -> HeaderMap {
        let mut forwarded = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if !self.contains(name) {
                forwarded.append(name.clone(), value.clone());
            }
        }
        forwarded
    }
}

impl Default for HeaderExclusionSet {
    fn default() -> Self {
        let mut names = HashSet::new();
        names.insert(HOST);
        Self { names }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn host_always_excluded() {
        let set = HeaderExclusionSet::new(Vec::<String>::new()).unwrap();
        assert!(set.contains(&HOST));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn exclusion_is_case_insensitive() {
        let set = HeaderExclusionSet::new(["X-Internal-Secret", "CONNECTION"]).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-internal-secret", HeaderValue::from_static("s3cr3t"));
        headers.insert("Connection", HeaderValue::from_static("keep-alive"));
        headers.insert("Host", HeaderValue::from_static("edge.local"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        let forwarded = set.apply(&headers);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded["accept"], "*/*");
    }

    #[test]
    fn repeated_values_keep_their_order() {
        let set = HeaderExclusionSet::default();

        let mut headers = HeaderMap::new();
        headers.append("x-trace", HeaderValue::from_static("first"));
        headers.append("x-trace", HeaderValue::from_static("second"));

        let forwarded = set.apply(&headers);
        let values: Vec<_> = forwarded.get_all("x-trace").iter().collect();
        assert_eq!(values, ["first", "second"]);
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(HeaderExclusionSet::new(["bad header"]).is_err());
    }
}
