//! Credential lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! source.rs (credential endpoint)
//!     → scheduler.rs (start: fetch now; then fetch before each expiry)
//!     → store.rs (single slot; waiters released on set)
//!     → client.rs (wait, attach `Authorization: Bearer`, send)
//! ```
//!
//! # Design Decisions
//! - The store is an explicit instance shared through `Arc`, not global state
//! - A refresh failure after start is final for the session
//! - Waits are bounded; a timeout means the request is never sent

pub mod client;
pub mod credential;
pub mod scheduler;
pub mod source;
pub mod store;

pub use client::ApiClient;
pub use credential::{BearerToken, Credential};
pub use scheduler::{next_refresh_delay, RefreshScheduler, RefreshSettings, SchedulerState};
pub use source::{CredentialSource, HttpCredentialSource};
pub use store::CredentialStore;
