//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! axum request
//!     → request.rs (IncomingRequest: absolute URL, cookies, streamed body)
//!     → tenant.rs / prefix.rs (strategy hooks for one route)
//!     → forwarder.rs (transform → resolve → exclude → host → send)
//!     → transport.rs (reqwest, redirects disabled)
//!     → upstream response returned verbatim
//! ```
//!
//! # Design Decisions
//! - Hooks are injected closures, not subclasses
//! - Exclusion runs after every header transform
//! - Errors collapse into one 500 at the forward boundary

pub mod forwarder;
pub mod headers;
pub mod prefix;
pub mod request;
pub mod tenant;
pub mod transport;

pub use forwarder::{
    parse_destination, DestinationResolver, ProxyForwarder, RequestTransform, ResponseContext,
    ResponseTransform,
};
pub use headers::HeaderExclusionSet;
pub use prefix::prefix_proxy;
pub use request::{CookieJar, IncomingRequest};
pub use tenant::{TenantIdentity, TenantProxy};
pub use transport::{HttpTransport, UpstreamTransport};
