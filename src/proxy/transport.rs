//! Upstream transport.
//!
//! # Responsibilities
//! - Issue one outbound request and hand back the upstream response
//! - Stream the request body while the response may already be arriving
//! - Never follow redirects; a 3xx goes back to the caller untouched
//!
//! # Design Decisions
//! - Behind a trait so forwarding can run against a recording transport
//! - No request timeout here beyond connect; the edge timeout layer owns that

use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    http::{Request, Response},
};
use futures_util::future::BoxFuture;

use crate::error::ProxyError;

/// Sends a fully built outbound request. The request URI is always absolute.
pub trait UpstreamTransport: Send + Sync {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, ProxyError>>;
}

/// `reqwest`-backed transport with redirects disabled.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl UpstreamTransport for HttpTransport {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, ProxyError>> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let url = parts.uri.to_string();

            let mut outbound = self
                .client
                .request(parts.method, url)
                .headers(parts.headers);
            if !body.is_end_stream() {
                outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
            }

            let upstream = outbound.send().await?;

            let mut response = Response::builder()
                .status(upstream.status())
                .version(upstream.version());
            if let Some(headers) = response.headers_mut() {
                *headers = upstream.headers().clone();
            }
            response
                .body(Body::from_stream(upstream.bytes_stream()))
                .map_err(|e| ProxyError::Upstream(e.to_string()))
        })
    }
}
