//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
use tokio::net::TcpListener;

use tenant_edge::{EdgeConfig, HttpServer, Shutdown};

pub const TENANT: &str = "acme.example.com";
pub const GOOD_REFRESH: &str = "good-refresh";
pub const ACCESS_TOKEN: &str = "access-123";

/// What the echo backend received.
#[derive(Debug, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

impl Echo {
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(name).map(Vec::as_slice)
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn start_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Backend that echoes every request as JSON, plus:
/// - `/api/redirect` answers 302
/// - `POST /api/accounts/token/refresh/` mints a credential for [`GOOD_REFRESH`]
pub fn backend_router() -> Router {
    Router::new()
        .route("/api/redirect", any(redirect))
        .route("/api/accounts/token/refresh/", post(refresh))
        .fallback(echo)
}

pub async fn start_echo_backend() -> SocketAddr {
    start_backend(backend_router()).await
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn edge_config(backend: SocketAddr) -> EdgeConfig {
    let mut config = EdgeConfig::default();
    config.tenant.domain = TENANT.to_string();
    config.upstream.base_url = format!("http://{backend}");
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Running edge; dropping it does not stop the server, call `shutdown.trigger()`.
pub struct Edge {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl Edge {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_edge(config: EdgeConfig) -> Edge {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    Edge { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers.iter() {
        seen.entry(name.as_str().to_string())
            .or_default()
            .push(value.to_str().unwrap_or_default().to_string());
    }
    Json(json!({
        "method": method.as_str(),
        "path": uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
        "headers": seen,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn redirect() -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "/api/elsewhere")],
        "moved",
    )
        .into_response()
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh: String,
}

async fn refresh(headers: HeaderMap, Json(request): Json<RefreshRequest>) -> Response {
    if headers.get("x-tenant-domain").and_then(|v| v.to_str().ok()) != Some(TENANT) {
        return (StatusCode::BAD_REQUEST, "missing tenant").into_response();
    }
    if request.refresh != GOOD_REFRESH {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired" })),
        )
            .into_response();
    }
    let expires = OffsetDateTime::now_utc() + Duration::hours(1);
    Json(json!({
        "access": ACCESS_TOKEN,
        "access_expiration": expires.format(&Rfc3339).unwrap(),
    }))
    .into_response()
}
