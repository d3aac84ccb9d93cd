//! Tenant-aware edge proxy library.
//!
//! Forwards backend traffic with a server-side tenant identity, tunnels
//! third-party traffic by prefix, and keeps a bearer credential fresh for
//! outbound API clients.

// Edge
pub mod config;
pub mod http;
pub mod proxy;

// Client-side credential lifecycle
pub mod auth;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::EdgeConfig;
pub use error::{AuthError, ClientError, ConfigError, ProxyError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
