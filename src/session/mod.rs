//! Auth session manager: the single owner of session state.
//!
//! STATES
//! ======
//! `Anonymous` and `Authenticated`. Transitions:
//! - `login`: Anonymous/Authenticated → Authenticated, or Anonymous plus
//!   an error when the response is unusable.
//! - `logout`: to Anonymous. Server notification is best-effort; the local
//!   transition always happens.
//! - `revalidate`: Authenticated → Authenticated | Anonymous, fail-closed.
//! - storage logout marker → Anonymous locally, without any network call
//!   and without touching storage.
//! - storage token/user change → whatever storage now holds, verbatim.
//!
//! GENERATIONS
//! ===========
//! Every transition bumps a generation counter. Async work captures the
//! generation before suspending and drops its result if the counter moved
//! in the meantime, so a response that raced a logout cannot resurrect or
//! destroy a session it was never about.
//!
//! The manager is `Clone` and cheap to pass around; all clones share one
//! state. Consumers observe transitions through `subscribe()`.

pub mod gate;
pub mod scheduler;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, auth};
use crate::error::PortalError;
use crate::events::{self, AuthSignal};
use crate::model::{Session, UserRecord};
use crate::storage::{SessionStore, StorageEvent};

pub use gate::RevalidationGate;
#[cfg(unix)]
pub use scheduler::spawn_signal_trigger_task;
pub use scheduler::{RevalidationTrigger, spawn_revalidation_task, spawn_storage_sync_task};

const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: Session,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidateOutcome {
    /// No session to check.
    Skipped,
    /// Suppressed by the minimum-interval gate.
    Debounced,
    Valid,
    /// The backend did not vouch for the token; the session was ended.
    Invalidated,
    /// The session changed while the check was in flight; result ignored.
    Stale,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    state: watch::Sender<SessionSnapshot>,
    gate: Mutex<RevalidationGate>,
}

impl SessionManager {
    /// Load the persisted session and take ownership of it.
    ///
    /// Leftover keys that do not form a complete session are cleared.
    pub fn new(api: ApiClient, debounce: Duration) -> Self {
        let session = api.store().read_session();
        if !session.is_authenticated() {
            api.store().clear();
        }
        let (state, _) = watch::channel(SessionSnapshot { session, generation: 0 });
        Self {
            inner: Arc::new(Inner { api, state, gate: Mutex::new(RevalidationGate::new(debounce)) }),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.state.borrow().session.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserRecord> {
        self.inner.state.borrow().session.user().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().session.is_authenticated()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.state.borrow().generation
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    fn store(&self) -> &SessionStore {
        self.inner.api.store()
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Log in and persist the new session.
    ///
    /// # Errors
    ///
    /// `Validation` for empty/short input (nothing is sent), transport or
    /// HTTP errors from the backend, and `InvalidLoginResponse` when the
    /// reply lacks a success marker, token or user. In the last case the
    /// session and storage are cleared before returning.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserRecord, PortalError> {
        validate_credentials(username, password)?;

        match auth::login(self.api(), username, password).await {
            Ok((token, user)) => {
                self.transition(Session::authenticated(token, user.clone()), true);
                self.gate().reset();
                info!(username = %user.username, role = %user.role, "session started");
                Ok(user)
            }
            Err(e @ PortalError::InvalidLoginResponse) => {
                self.transition(Session::Anonymous, true);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// End the session everywhere. Never fails.
    pub async fn logout(&self) {
        if self.is_authenticated() {
            auth::logout_server(self.api()).await;
        }
        self.transition(Session::Anonymous, true);
        self.store().broadcast_logout();
        info!("logged out");
    }

    /// End the session locally without contacting the backend, e.g. after
    /// this client saw a 401.
    pub fn expire(&self, reason: &str) {
        if !self.is_authenticated() {
            return;
        }
        self.transition(Session::Anonymous, true);
        info!(reason, "session expired");
    }

    /// Confirm the held token with the backend; log out if it is not
    /// accepted. Never fails.
    pub async fn revalidate(&self, trigger: RevalidationTrigger) -> RevalidateOutcome {
        self.revalidate_at(trigger, Instant::now()).await
    }

    pub(crate) async fn revalidate_at(&self, trigger: RevalidationTrigger, now: Instant) -> RevalidateOutcome {
        let before = self.snapshot();
        if !before.session.is_authenticated() {
            return RevalidateOutcome::Skipped;
        }
        if !self.gate().try_acquire_at(now) {
            debug!(?trigger, "revalidation debounced");
            return RevalidateOutcome::Debounced;
        }

        let valid = auth::validate_token(self.api()).await;

        if self.generation() != before.generation {
            debug!(?trigger, "discarding revalidation result for a replaced session");
            return RevalidateOutcome::Stale;
        }
        if valid {
            debug!(?trigger, "session still valid");
            return RevalidateOutcome::Valid;
        }

        warn!(?trigger, "session failed revalidation; logging out");
        self.logout().await;
        RevalidateOutcome::Invalidated
    }

    /// React to a storage mutation made by another client.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> Option<AuthSignal> {
        let signal = events::classify(event)?;
        match signal {
            AuthSignal::Logout { ts } => {
                // Local only: storage may already hold a newer session.
                if self.is_authenticated() {
                    info!(ts, "logout broadcast received");
                    self.transition(Session::Anonymous, false);
                }
            }
            AuthSignal::SessionChanged => {
                let next = self.store().read_session();
                if next != self.session() {
                    debug!(authenticated = next.is_authenticated(), "adopting session from storage");
                    self.transition(next, false);
                }
            }
        }
        Some(signal)
    }

    /// Await `fut`, discarding its output if the session changed meanwhile.
    pub async fn run_guarded<F: Future>(&self, fut: F) -> Option<F::Output> {
        let generation = self.generation();
        let output = fut.await;
        (self.generation() == generation).then_some(output)
    }

    fn transition(&self, next: Session, persist: bool) {
        if persist {
            self.store().write_session(&next);
        }
        self.inner.state.send_modify(|snap| {
            snap.session = next;
            snap.generation += 1;
        });
    }

    fn gate(&self) -> std::sync::MutexGuard<'_, RevalidationGate> {
        self.inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), PortalError> {
    if username.trim().is_empty() {
        return Err(PortalError::validation("Username required"));
    }
    if password.is_empty() {
        return Err(PortalError::validation("Password required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortalError::validation("Too short"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
