//! The session state machine.
//!
//! A single `SessionController` owns session state, orchestrates
//! login/logout/startup recovery, drives the refresh timer, and invalidates
//! the data cache inside identity-changing transitions. All session-mutating
//! flows are serialized through one mutex, so an operation issued while
//! another is in flight queues behind it; duplicate logins with identical
//! credentials share a single in-flight outcome instead of queueing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthClient};
use crate::cache::CacheInvalidator;
use crate::config::Config;

use super::gateway::{AuthGateway, Credentials};
use super::scheduler::RefreshScheduler;
use super::token::{Credential, TokenHolder, TokenReader};

/// Cadence for proactive credential renewal. Server-issued tokens outlive
/// this comfortably, so a renewal always lands before expiry.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60);

/// Session lifecycle states. `Authenticated` holds exactly when the token
/// holder has a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Initializing,
    Authenticated,
    LoggingOut,
}

/// Terminal failures for a single attempt; nothing here is retried
/// automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("credentials rejected")]
    RejectedCredentials,

    #[error("session expired")]
    SessionExpired,
}

type SharedLogin = Shared<BoxFuture<'static, Result<(), SessionError>>>;

struct PendingLogin {
    credentials: Credentials,
    outcome: SharedLogin,
}

/// Handle onto the session state machine. Cloning shares the underlying
/// session; consumers hold a handle or subscribe to the change streams
/// rather than importing shared mutable state.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    gateway: Arc<dyn AuthGateway>,
    cache: Arc<dyn CacheInvalidator>,
    tokens: TokenHolder,
    state_tx: watch::Sender<SessionState>,
    /// Bumped on every identity-changing transition; timer callbacks armed
    /// under an older epoch are discarded on arrival.
    epoch: AtomicU64,
    /// Serializes login, logout, startup recovery, and scheduled refresh.
    mutation_lock: Mutex<()>,
    /// One-shot latch for `initialize`.
    init: OnceCell<()>,
    scheduler: RefreshScheduler,
    pending_login: std::sync::Mutex<Option<PendingLogin>>,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn AuthGateway>, cache: Arc<dyn CacheInvalidator>) -> Self {
        Self::with_refresh_interval(gateway, cache, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(
        gateway: Arc<dyn AuthGateway>,
        cache: Arc<dyn CacheInvalidator>,
        refresh_interval: Duration,
    ) -> Self {
        let (state_tx, _rx) = watch::channel(SessionState::Unauthenticated);
        Self {
            inner: Arc::new(SessionInner {
                gateway,
                cache,
                tokens: TokenHolder::new(),
                state_tx,
                epoch: AtomicU64::new(0),
                mutation_lock: Mutex::new(()),
                init: OnceCell::new(),
                scheduler: RefreshScheduler::new(refresh_interval),
                pending_login: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Build a controller backed by the HTTP gateway described in `config`.
    pub fn from_config(
        config: &Config,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Result<Self, ApiError> {
        let gateway = AuthClient::new(
            &config.auth_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::with_refresh_interval(
            Arc::new(gateway),
            cache,
            config.refresh_interval(),
        ))
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state_tx.borrow()
    }

    /// Change stream over the session state, for UI routing guards.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Current credential, if authenticated.
    pub fn token(&self) -> Option<Credential> {
        self.inner.tokens.get()
    }

    /// Read-only token view for the request layer.
    pub fn token_reader(&self) -> TokenReader {
        self.inner.tokens.reader()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Whether the proactive refresh timer is currently armed.
    pub fn refresh_armed(&self) -> bool {
        self.inner.scheduler.is_armed()
    }

    /// Best-effort recovery of an existing session at process start.
    ///
    /// Performs one refresh attempt against the ambient refresh mechanism.
    /// Callable any number of times (startup hooks may double-fire); the
    /// underlying refresh runs exactly once, and later callers wait for it.
    /// A failed attempt is the normal no-prior-session case, not an error.
    /// Does nothing if a login has already established a session.
    pub async fn initialize(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner
            .init
            .get_or_init(|| async move {
                SessionInner::startup_refresh(&inner).await;
            })
            .await;
    }

    /// Authenticate with the remote service.
    ///
    /// A second call issued while a login for the same credentials is in
    /// flight joins it: one gateway call, one shared outcome. A login for
    /// different credentials starts its own attempt, queued behind whatever
    /// mutation is in flight.
    pub async fn login(&self, credentials: Credentials) -> Result<(), SessionError> {
        let outcome = {
            let mut pending = self.inner.pending_login.lock().unwrap();
            match pending.as_ref() {
                Some(p) if p.credentials == credentials => p.outcome.clone(),
                _ => {
                    let inner = Arc::clone(&self.inner);
                    let creds = credentials.clone();
                    let outcome: SharedLogin =
                        async move { SessionInner::run_login(&inner, creds).await }
                            .boxed()
                            .shared();
                    *pending = Some(PendingLogin {
                        credentials,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };
        outcome.await
    }

    /// End the session.
    ///
    /// The remote side is notified best-effort; local state is cleared
    /// regardless of the outcome, so the user-visible session always ends.
    /// Queues behind any in-flight session mutation. No-op when already
    /// unauthenticated.
    pub async fn logout(&self) {
        let inner = &self.inner;
        let _guard = inner.mutation_lock.lock().await;
        if *inner.state_tx.borrow() == SessionState::Unauthenticated {
            return;
        }

        inner.state_tx.send_replace(SessionState::LoggingOut);
        if let Err(err) = inner.gateway.logout().await {
            debug!(error = %err, "remote logout failed, clearing local session anyway");
        }
        inner.teardown();
        info!("logged out");
    }
}

impl SessionInner {
    async fn startup_refresh(this: &Arc<Self>) {
        let _guard = this.mutation_lock.lock().await;
        if *this.state_tx.borrow() != SessionState::Unauthenticated {
            // A login won the race; leave the live session alone.
            debug!("startup recovery skipped, session already established");
            return;
        }
        this.state_tx.send_replace(SessionState::Initializing);

        match this.gateway.refresh().await {
            Ok(credential) => {
                info!("recovered existing session");
                Self::establish(this, credential, false);
            }
            Err(err) => {
                // Normal first-run case: nothing to recover.
                debug!(error = %err, "no existing session to recover");
                this.state_tx.send_replace(SessionState::Unauthenticated);
            }
        }
    }

    async fn run_login(this: &Arc<Self>, credentials: Credentials) -> Result<(), SessionError> {
        let result = {
            let _guard = this.mutation_lock.lock().await;
            match this.gateway.login(&credentials).await {
                Ok(credential) => {
                    info!("login succeeded");
                    Self::establish(this, credential, true);
                    Ok(())
                }
                Err(err) => {
                    warn!(error = %err, "login failed");
                    Err(match err {
                        ApiError::Unauthorized | ApiError::AccessDenied(_) => {
                            SessionError::RejectedCredentials
                        }
                        other => SessionError::Network(other.to_string()),
                    })
                }
            }
        };
        this.clear_pending(&credentials);
        result
    }

    /// Timer callback. Returns `false` to stop the timer loop.
    async fn scheduled_refresh(self: Arc<Self>, epoch: u64) -> bool {
        let _guard = self.mutation_lock.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            // Armed before a logout or re-login; the session this timer
            // belonged to no longer exists.
            debug!(epoch, "discarding stale refresh tick");
            return false;
        }

        match self.gateway.refresh().await {
            Ok(credential) => {
                debug!("credential renewed");
                // Same identity: token changes, state and cache do not.
                self.tokens.set(Some(credential));
                true
            }
            Err(err) => {
                // Not surfaced interactively; routing guards react to the
                // state change.
                let reason = match err {
                    ApiError::Unauthorized | ApiError::AccessDenied(_) => {
                        SessionError::SessionExpired
                    }
                    other => SessionError::Network(other.to_string()),
                };
                warn!(error = %reason, "background refresh failed, dropping session");
                self.teardown();
                false
            }
        }
    }

    /// Transition into `Authenticated`. Caller holds the mutation lock.
    fn establish(this: &Arc<Self>, credential: Credential, identity_changed: bool) {
        let epoch = this.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        this.tokens.set(Some(credential));
        this.state_tx.send_replace(SessionState::Authenticated);

        let weak = Arc::downgrade(this);
        this.scheduler.start(epoch, move |tick_epoch| {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.scheduled_refresh(tick_epoch).await,
                    None => false,
                }
            }
        });

        if identity_changed {
            this.cache.invalidate_all();
        }
    }

    /// Transition into `Unauthenticated`, clearing everything session-bound.
    /// Caller holds the mutation lock.
    fn teardown(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.scheduler.stop();
        self.tokens.set(None);
        self.state_tx.send_replace(SessionState::Unauthenticated);
        self.cache.invalidate_all();
    }

    fn clear_pending(&self, credentials: &Credentials) {
        let mut pending = self.pending_login.lock().unwrap();
        if pending
            .as_ref()
            .is_some_and(|p| &p.credentials == credentials)
        {
            *pending = None;
        }
    }
}
