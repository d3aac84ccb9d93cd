//! Hook-driven request forwarding.
//!
//! # Algorithm
//! ```text
//! IncomingRequest
//!     → request transform (optional, returns a new value)
//!     → destination resolver (must yield an absolute http(s) URL)
//!     → headers minus HeaderExclusionSet (last header step)
//!     → host := destination host
//!     → transport (method + streamed body, redirects not followed)
//!     → response transform (optional, sees destination + cookies)
//!     → response returned verbatim
//! ```
//!
//! Any failure along the way becomes one 500 response. Nothing is retried.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header::HOST, HeaderValue, Request, Response},
    response::IntoResponse,
};
use url::{Position, Url};

use crate::error::ProxyError;
use crate::observability::metrics;
use crate::proxy::headers::HeaderExclusionSet;
use crate::proxy::request::{CookieJar, IncomingRequest};
use crate::proxy::transport::UpstreamTransport;

/// Computes the absolute destination from the (transformed) inbound URL and request.
pub type DestinationResolver =
    Arc<dyn Fn(&Url, &IncomingRequest) -> Result<Url, ProxyError> + Send + Sync>;

/// Produces a new request from the inbound one.
pub type RequestTransform =
    Arc<dyn Fn(IncomingRequest) -> Result<IncomingRequest, ProxyError> + Send + Sync>;

/// Rewrites the upstream response with access to request-scoped context.
pub type ResponseTransform =
    Arc<dyn Fn(Response<Body>, &ResponseContext) -> Result<Response<Body>, ProxyError> + Send + Sync>;

/// Request-scoped values handed to the response transform.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    /// Resolved destination the request was sent to.
    pub destination: Url,
    /// URL the client asked for, after the request transform.
    pub inbound: Url,
    /// Client cookies.
    pub cookies: CookieJar,
}

/// Forwards requests to a destination chosen by its resolver.
///
/// Holds no per-request state; one forwarder serves every request of a route.
#[derive(Clone)]
pub struct ProxyForwarder {
    name: String,
    resolver: DestinationResolver,
    request_transform: Option<RequestTransform>,
    response_transform: Option<ResponseTransform>,
    exclusions: HeaderExclusionSet,
    transport: Arc<dyn UpstreamTransport>,
}

impl std::fmt::Debug for ProxyForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyForwarder")
            .field("name", &self.name)
            .field("exclusions", &self.exclusions)
            .field("request_transform", &self.request_transform.is_some())
            .field("response_transform", &self.response_transform.is_some())
            .finish()
    }
}

impl ProxyForwarder {
    /// Create a forwarder with no transforms and only `host` excluded.
    pub fn new(
        name: impl Into<String>,
        resolver: DestinationResolver,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            resolver,
            request_transform: None,
            response_transform: None,
            exclusions: HeaderExclusionSet::default(),
            transport,
        }
    }

    pub fn with_request_transform(mut self, transform: RequestTransform) -> Self {
        self.request_transform = Some(transform);
        self
    }

    pub fn with_response_transform(mut self, transform: ResponseTransform) -> Self {
        self.response_transform = Some(transform);
        self
    }

    pub fn with_exclusions(mut self, exclusions: HeaderExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward `request`. Failures are rendered as a 500 `Proxy error: ...` response.
    pub async fn forward(&self, request: IncomingRequest) -> Response<Body> {
        let start = Instant::now();
        let method = request.method().to_string();
        let path = request.url().path().to_string();

        let response = match self.try_forward(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    route = %self.name,
                    method = %method,
                    path = %path,
                    error = %err,
                    "Proxy forward failed"
                );
                err.into_response()
            }
        };

        tracing::debug!(
            route = %self.name,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            "Forwarded request"
        );
        metrics::record_request(&method, response.status().as_u16(), &self.name, start);
        response
    }

    /// Forward without the error boundary.
    pub async fn try_forward(&self, request: IncomingRequest) -> Result<Response<Body>, ProxyError> {
        let request = match &self.request_transform {
            Some(transform) => transform(request)?,
            None => request,
        };

        let destination = (self.resolver)(request.url(), &request)?;
        ensure_absolute(&destination)?;

        let mut headers = self.exclusions.apply(request.headers());
        let host = &destination[Position::BeforeHost..Position::AfterPort];
        let host_value = HeaderValue::from_str(host).map_err(|_| ProxyError::InvalidHeader {
            name: HOST.to_string(),
        })?;
        headers.insert(HOST, host_value);

        let (method, inbound, _, body, cookies) = request.into_parts();

        let mut outbound = Request::builder()
            .method(method)
            .uri(destination.as_str())
            .body(body.unwrap_or_else(Body::empty))
            .map_err(|e| ProxyError::Resolve(e.to_string()))?;
        *outbound.headers_mut() = headers;

        let response = self.transport.send(outbound).await?;

        match &self.response_transform {
            Some(transform) => {
                let context = ResponseContext {
                    destination,
                    inbound,
                    cookies,
                };
                transform(response, &context)
            }
            None => Ok(response),
        }
    }
}

/// Parse a resolver's string output into an absolute http(s) URL.
pub fn parse_destination(raw: &str) -> Result<Url, ProxyError> {
    let url = Url::parse(raw).map_err(|e| ProxyError::Resolve(format!("'{raw}': {e}")))?;
    ensure_absolute(&url)?;
    Ok(url)
}

fn ensure_absolute(url: &Url) -> Result<(), ProxyError> {
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ProxyError::Resolve(format!(
            "'{url}' is not an absolute http(s) URL"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::transport::testing::RecordingTransport;
    use axum::http::{header, HeaderMap, Method, StatusCode};

    fn fixed(dest: &'static str) -> DestinationResolver {
        Arc::new(move |_: &Url, _: &IncomingRequest| parse_destination(dest))
    }

    fn inbound(method: Method, url: &str, headers: &[(&str, &str)], body: Option<&str>) -> IncomingRequest {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.append(
                header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                v.parse().unwrap(),
            );
        }
        IncomingRequest::new(
            method,
            Url::parse(url).unwrap(),
            map,
            body.map(|b| Body::from(b.to_string())),
        )
    }

    #[tokio::test]
    async fn host_header_follows_destination() {
        let transport = Arc::new(RecordingTransport::ok());
        let forwarder = ProxyForwarder::new(
            "test",
            fixed("https://backend.internal:8443/x"),
            transport.clone(),
        );

        let response = forwarder
            .forward(inbound(
                Method::GET,
                "http://edge.local/x",
                &[("host", "evil.example.com")],
                None,
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let seen = transport.last();
        assert_eq!(seen.headers[HOST], "backend.internal:8443");
        assert_eq!(seen.headers.get_all(HOST).iter().count(), 1);
        assert_eq!(seen.uri, "https://backend.internal:8443/x");
    }

    #[tokio::test]
    async fn excluded_headers_never_forwarded_even_if_transform_adds_them() {
        let transport = Arc::new(RecordingTransport::ok());
        let transform: RequestTransform = Arc::new(|req: IncomingRequest| -> Result<IncomingRequest, ProxyError> {
            let mut headers = req.headers().clone();
            headers.insert("x-internal-secret", HeaderValue::from_static("re-added"));
            headers.insert("x-added", HeaderValue::from_static("allowed"));
            Ok(req.with_headers(headers))
        });
        let forwarder = ProxyForwarder::new("test", fixed("http://backend.internal/"), transport.clone())
            .with_request_transform(transform)
            .with_exclusions(HeaderExclusionSet::new(["X-Internal-Secret"]).unwrap());

        forwarder
            .forward(inbound(
                Method::GET,
                "http://edge.local/",
                &[("x-internal-secret", "client")],
                None,
            ))
            .await;

        let seen = transport.last();
        assert!(seen.headers.get("x-internal-secret").is_none());
        assert_eq!(seen.headers["x-added"], "allowed");
    }

    #[tokio::test]
    async fn method_and_body_preserved() {
        let transport = Arc::new(RecordingTransport::ok());
        let forwarder = ProxyForwarder::new("test", fixed("http://backend.internal/items"), transport.clone());

        forwarder
            .forward(inbound(
                Method::PATCH,
                "http://edge.local/items",
                &[("content-type", "application/json")],
                Some("{\"qty\":3}"),
            ))
            .await;

        let seen = transport.last();
        assert_eq!(seen.method, Method::PATCH);
        assert_eq!(seen.body, b"{\"qty\":3}");
        assert_eq!(seen.headers[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn redirects_returned_unmodified() {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("https://elsewhere/login"));
        let transport = Arc::new(RecordingTransport::with_status(StatusCode::FOUND, headers));
        let forwarder = ProxyForwarder::new("test", fixed("http://backend.internal/"), transport.clone());

        let response = forwarder
            .forward(inbound(Method::GET, "http://edge.local/", &[], None))
            .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://elsewhere/login");
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn resolver_failure_is_a_500_and_nothing_is_sent() {
        let transport = Arc::new(RecordingTransport::ok());
        let forwarder = ProxyForwarder::new("test", fixed("/relative/only"), transport.clone());

        let response = forwarder
            .forward(inbound(Method::GET, "http://edge.local/", &[], None))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"Proxy error: invalid destination"));
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_is_a_500() {
        let transport = Arc::new(RecordingTransport::failing());
        let forwarder = ProxyForwarder::new("test", fixed("http://backend.internal/"), transport.clone());

        let response = forwarder
            .forward(inbound(Method::GET, "http://edge.local/", &[], None))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Proxy error: upstream request failed: connection failed");
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn response_transform_sees_destination_and_cookies() {
        let transport = Arc::new(RecordingTransport::ok());
        let transform: ResponseTransform = Arc::new(
            |mut response: Response<Body>, ctx: &ResponseContext| -> Result<Response<Body>, ProxyError> {
            let session = ctx.cookies.get("session").unwrap_or("none").to_string();
            let echoed = HeaderValue::from_str(&format!("{}|{}", ctx.destination, session))
                .map_err(|e| ProxyError::ResponseTransform(e.to_string()))?;
            response.headers_mut().insert("x-context", echoed);
            Ok(response)
        },
        );
        let forwarder = ProxyForwarder::new("test", fixed("http://backend.internal/a"), transport)
            .with_response_transform(transform);

        let response = forwarder
            .forward(inbound(
                Method::GET,
                "http://edge.local/a",
                &[("cookie", "session=abc")],
                None,
            ))
            .await;

        assert_eq!(response.headers()["x-context"], "http://backend.internal/a|abc");
    }

    #[tokio::test]
    async fn failing_request_transform_is_a_500() {
        let transport = Arc::new(RecordingTransport::ok());
        let transform: RequestTransform =
            Arc::new(|_: IncomingRequest| -> Result<IncomingRequest, ProxyError> {
                Err(ProxyError::Transform("boom".into()))
            });
        let forwarder = ProxyForwarder::new("test", fixed("http://backend.internal/"), transport.clone())
            .with_request_transform(transform);

        let response = forwarder
            .forward(inbound(Method::GET, "http://edge.local/", &[], None))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.count(), 0);
    }
}
