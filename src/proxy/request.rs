//! Inbound request value.
//!
//! # Responsibilities
//! - Turn the server's request into an owned value with an absolute URL
//! - Parse client cookies once so hooks can read them
//! - Hand transforms an owned value; a transform returns a new one
//!
//! # Design Decisions
//! - The body stays a stream and is moved, never buffered
//! - Absolute URL built from the URI authority, else the `Host` header

use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderMap, Method, Request},
};
use url::Url;

use crate::error::ProxyError;

/// Client cookies parsed from every `Cookie` header, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    pairs: Vec<(String, String)>,
}

impl CookieJar {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let pairs = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect();
        Self { pairs }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A request as received at the edge.
#[derive(Debug)]
pub struct IncomingRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
    cookies: CookieJar,
}

impl IncomingRequest {
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: Option<Body>) -> Self {
        let cookies = CookieJar::from_headers(&headers);
        Self {
            method,
            url,
            headers,
            body,
            cookies,
        }
    }

    /// Build from a server request. The body is dropped to `None` when it is known to be empty.
    pub fn from_http(request: Request<Body>) -> Result<Self, ProxyError> {
        let (parts, body) = request.into_parts();

        let authority = parts
            .uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                parts
                    .headers
                    .get(header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "localhost".to_string());
        let scheme = parts.uri.scheme_str().unwrap_or("http");
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let url = Url::parse(&format!("{scheme}://{authority}{path_and_query}"))
            .map_err(|e| ProxyError::Resolve(format!("inbound URL: {e}")))?;

        let body = if body.is_end_stream() { None } else { Some(body) };

        Ok(Self::new(parts.method, url, parts.headers, body))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Same request with a replaced header map.
    pub fn with_headers(self, headers: HeaderMap) -> Self {
        Self { headers, ..self }
    }

    /// Same request with a replaced URL.
    pub fn with_url(self, url: Url) -> Self {
        Self { url, ..self }
    }

    pub fn into_parts(self) -> (Method, Url, HeaderMap, Option<Body>, CookieJar) {
        (self.method, self.url, self.headers, self.body, self.cookies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_built_from_host_header() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/widgets?x=1")
            .header("host", "edge.acme.example.com")
            .body(Body::empty())
            .unwrap();

        let incoming = IncomingRequest::from_http(request).unwrap();
        assert_eq!(
            incoming.url().as_str(),
            "http://edge.acme.example.com/api/widgets?x=1"
        );
        assert!(!incoming.has_body());
    }

    #[test]
    fn absolute_uri_wins_over_host_header() {
        let request = Request::builder()
            .uri("https://edge.example.com/api/ping")
            .header("host", "ignored.example.com")
            .body(Body::empty())
            .unwrap();

        let incoming = IncomingRequest::from_http(request).unwrap();
        assert_eq!(incoming.url().as_str(), "https://edge.example.com/api/ping");
    }

    #[test]
    fn body_kept_when_present() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/widgets")
            .body(Body::from("{\"name\":\"gear\"}"))
            .unwrap();

        let incoming = IncomingRequest::from_http(request).unwrap();
        assert!(incoming.has_body());
        assert_eq!(incoming.url().host_str(), Some("localhost"));
    }

    #[test]
    fn cookies_parsed_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, "session=abc; theme=dark".parse().unwrap());
        headers.append(header::COOKIE, "refresh-token=\"r1\"".parse().unwrap());

        let jar = CookieJar::from_headers(&headers);
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("session"), Some("abc"));
        assert_eq!(jar.get("refresh-token"), Some("r1"));
        assert_eq!(jar.get("missing"), None);
    }
}
