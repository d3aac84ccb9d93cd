//! Single-slot credential store with bounded waits.
//!
//! # Responsibilities
//! - Hold the current bearer token, or nothing yet
//! - Release every pending waiter on `set`, in registration order
//! - Time out waiters that never see a value, and deregister them
//!
//! # Design Decisions
//! - Value and waiter list share one lock; `set` drains and releases under it,
//!   so a released waiter and `get` can never disagree about the value
//! - A timed-out waiter that `set` already drained keeps the value: the
//!   release happened before the timeout check
//! - Dropping a pending `wait_for` future deregisters its waiter

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::auth::credential::BearerToken;
use crate::error::AuthError;

struct Waiter {
    id: u64,
    tx: oneshot::Sender<BearerToken>,
}

#[derive(Default)]
struct StoreState {
    value: Option<BearerToken>,
    waiters: Vec<Waiter>,
    next_id: u64,
}

/// Holds at most one bearer token. Shared by reference (`Arc`) with whoever needs it.
#[derive(Default)]
pub struct CredentialStore {
    state: Mutex<StoreState>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CredentialStore")
            .field("is_set", &state.value.is_some())
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value and release all pending waiters with it. Last write wins.
    pub fn set(&self, token: BearerToken) {
        let mut state = self.state.lock();
        state.value = Some(token.clone());
        let released = state.waiters.len();
        for waiter in state.waiters.drain(..) {
            // A closed receiver belongs to a caller that gave up; nothing to do.
            let _ = waiter.tx.send(token.clone());
        }
        drop(state);

        if released > 0 {
            tracing::debug!(released, "Credential set, released waiters");
        } else {
            tracing::trace!("Credential set");
        }
    }

    /// Non-blocking snapshot.
    pub fn get(&self) -> Option<BearerToken> {
        self.state.lock().value.clone()
    }

    pub fn is_set(&self) -> bool {
        self.state.lock().value.is_some()
    }

    /// Number of callers currently suspended in [`wait_for`](Self::wait_for).
    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Current value, or the next one `set` within `timeout`.
    pub async fn wait_for(&self, timeout: Duration) -> Result<BearerToken, AuthError> {
        let (id, mut rx) = {
            let mut state = self.state.lock();
            if let Some(token) = &state.value {
                return Ok(token.clone());
            }
            let id = state.next_id;
            state.next_id += 1;
            let (tx, rx) = oneshot::channel();
            state.waiters.push(Waiter { id, tx });
            (id, rx)
        };
        let _registration = Registration { store: self, id };

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(_)) => Err(AuthError::WaitTimeout(timeout)),
            Err(_) => {
                if self.deregister(id) {
                    tracing::debug!(?timeout, "Credential wait timed out");
                    Err(AuthError::WaitTimeout(timeout))
                } else {
                    // Drained by `set` before we got the lock: the value is already in the channel.
                    rx.try_recv().map_err(|_| AuthError::WaitTimeout(timeout))
                }
            }
        }
    }

    /// Remove waiter `id`. Returns whether it was still pending.
    fn deregister(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        match state.waiters.iter().position(|w| w.id == id) {
            Some(index) => {
                state.waiters.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Deregisters a waiter whose future is dropped before completion.
struct Registration<'a> {
    store: &'a CredentialStore,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.store.deregister(self.id);
    }
}
