//! HTTP edge subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace)
//!     → {proxy_prefix}/*   → proxy::TenantProxy (tenant header injected)
//!     → {tunnel prefix}/*  → proxy::prefix_proxy (prefix stripped)
//!     → GET {refresh_path} → refresh.rs (cookie → bearer credential)
//!     → anything else      → 404
//! ```

pub mod refresh;
pub mod server;

pub use refresh::RefreshEndpoint;
pub use server::{AppState, HttpServer};
