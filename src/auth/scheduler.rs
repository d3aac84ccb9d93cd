//! Periodic credential renewal.
//!
//! # State Machine
//! ```text
//! Idle ──start() ok──▶ Running ──refresh fails / stop()──▶ Stopped
//!   │                                                       ▲
//!   └──────────────────────── stop() ───────────────────────┘
//! start() failing leaves the scheduler Idle.
//! ```
//!
//! # Design Decisions
//! - One spawned task is the single outstanding scheduled refresh
//! - The task checks the state at the top of every wake-up and again before
//!   writing to the store, so `stop()` wins even against a fired timer
//! - A failed scheduled refresh is final: callback, Stopped, no retry

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::auth::credential::Credential;
use crate::auth::source::CredentialSource;
use crate::auth::store::CredentialStore;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::observability::metrics;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Timing knobs for renewal.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    /// Renew this long before expiry.
    pub safety_margin: Duration,
    /// Never schedule sooner than this.
    pub min_interval: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            safety_margin: Duration::from_secs(5),
            min_interval: Duration::from_secs(1),
        }
    }
}

impl From<&AuthConfig> for RefreshSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            safety_margin: Duration::from_secs(config.safety_margin_secs),
            min_interval: Duration::from_millis(config.min_refresh_interval_ms),
        }
    }
}

/// Delay until the next refresh: `expires_at - now - margin`, never below `floor`.
pub fn next_refresh_delay(
    expires_at: OffsetDateTime,
    now: OffsetDateTime,
    margin: Duration,
    floor: Duration,
) -> Duration {
    let remaining = expires_at - now;
    let delay = Duration::try_from(remaining)
        .unwrap_or(Duration::ZERO)
        .saturating_sub(margin);
    delay.max(floor)
}

/// Invoked once when a scheduled refresh fails.
pub type RefreshErrorCallback = Box<dyn Fn(&AuthError) + Send + Sync>;

struct Inner {
    state: SchedulerState,
    starting: bool,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    source: Arc<dyn CredentialSource>,
    store: Arc<CredentialStore>,
    settings: RefreshSettings,
    on_error: Option<RefreshErrorCallback>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn delay_for(&self, credential: &Credential) -> Duration {
        next_refresh_delay(
            credential.expires_at,
            OffsetDateTime::now_utc(),
            self.settings.safety_margin,
            self.settings.min_interval,
        )
    }

    fn is_running(&self) -> bool {
        self.inner.lock().state == SchedulerState::Running
    }

    fn stop(&self) {
        let handle = {
            let mut inner = self.inner.lock();
            if inner.state != SchedulerState::Stopped {
                tracing::debug!(from = ?inner.state, "Stopping credential refresh scheduler");
            }
            inner.state = SchedulerState::Stopped;
            inner.handle.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Keeps a [`CredentialStore`] populated by renewing before expiry.
///
/// Dropping the scheduler stops it.
pub struct RefreshScheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("state", &self.state())
            .field("settings", &self.shared.settings)
            .finish()
    }
}

impl RefreshScheduler {
    pub fn new(
        source: Arc<dyn CredentialSource>,
        store: Arc<CredentialStore>,
        settings: RefreshSettings,
    ) -> Self {
        Self::build(source, store, settings, None)
    }

    /// Same as [`new`](Self::new), with a callback for a failed scheduled refresh.
    pub fn with_error_callback(
        source: Arc<dyn CredentialSource>,
        store: Arc<CredentialStore>,
        settings: RefreshSettings,
        on_error: RefreshErrorCallback,
    ) -> Self {
        Self::build(source, store, settings, Some(on_error))
    }

    fn build(
        source: Arc<dyn CredentialSource>,
        store: Arc<CredentialStore>,
        settings: RefreshSettings,
        on_error: Option<RefreshErrorCallback>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                store,
                settings,
                on_error,
                inner: Mutex::new(Inner {
                    state: SchedulerState::Idle,
                    starting: false,
                    handle: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.inner.lock().state
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.shared.store
    }

    /// Fetch now, publish the token, and schedule the next refresh.
    ///
    /// On failure the scheduler stays `Idle` and the error is returned.
    pub async fn start(&self) -> Result<(), AuthError> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != SchedulerState::Idle || inner.starting {
                return Err(AuthError::NotIdle);
            }
            inner.starting = true;
        }
        let mut starting = StartingFlag {
            inner: &self.shared.inner,
            armed: true,
        };

        let fetched = self.shared.source.fetch().await;

        let mut inner = self.shared.inner.lock();
        inner.starting = false;
        starting.armed = false;
        let credential = match fetched {
            Ok(credential) => credential,
            Err(err) => {
                metrics::record_credential_refresh("initial_failure");
                tracing::warn!(error = %err, "Initial credential refresh failed");
                return Err(err);
            }
        };
        if inner.state != SchedulerState::Idle {
            return Err(AuthError::Stopped);
        }

        self.shared.store.set(credential.token.clone());
        let delay = self.shared.delay_for(&credential);
        inner.state = SchedulerState::Running;
        inner.handle = Some(tokio::spawn(refresh_loop(Arc::clone(&self.shared), delay)));
        drop(inner);

        metrics::record_credential_refresh("success");
        tracing::info!(next_refresh_in = ?delay, "Credential refresh scheduler started");
        Ok(())
    }

    /// Cancel any scheduled refresh. Idempotent; never fails.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Stop when `shutdown` fires. The watcher does not keep the scheduler alive.
    pub fn stop_on(&self, mut shutdown: broadcast::Receiver<()>) {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            if let Some(shared) = shared.upgrade() {
                tracing::debug!("Shutdown received, stopping credential refresh scheduler");
                shared.stop();
            }
        });
    }
}

/// Clears `starting` if a `start()` future is dropped mid-fetch.
struct StartingFlag<'a> {
    inner: &'a Mutex<Inner>,
    armed: bool,
}

impl Drop for StartingFlag<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.lock().starting = false;
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn refresh_loop(shared: Arc<Shared>, mut delay: Duration) {
    loop {
        tokio::time::sleep(delay).await;
        if !shared.is_running() {
            return;
        }

        match shared.source.fetch().await {
            Ok(credential) => {
                {
                    let inner = shared.inner.lock();
                    if inner.state != SchedulerState::Running {
                        return;
                    }
                    shared.store.set(credential.token.clone());
                }

                delay = shared.delay_for(&credential);
                metrics::record_credential_refresh("success");
                tracing::debug!(next_refresh_in = ?delay, "Credential refreshed");
            }
            Err(err) => {
                {
                    let mut inner = shared.inner.lock();
                    if inner.state != SchedulerState::Running {
                        return;
                    }
                    inner.state = SchedulerState::Stopped;
                    // Detach our own handle; aborting it here would cancel this task.
                    inner.handle = None;
                }
                metrics::record_credential_refresh("failure");
                tracing::warn!(error = %err, "Scheduled credential refresh failed, scheduler stopped");
                if let Some(on_error) = &shared.on_error {
                    on_error(&err);
                }
                return;
            }
        }
    }
}
