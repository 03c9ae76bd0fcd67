//! The session manager: the one owner of session state.
//!
//! `SessionManager` ties the [`SessionRegistry`] (in memory) to the
//! [`CredentialStore`] (persisted) and the [`SessionBackend`] (network).
//! Everything the UI, guards, scheduler and transport hooks need goes
//! through it.
//!
//! # Concurrency note
//!
//! The registry sits behind a `parking_lot::Mutex` that is never held
//! across an `.await`. Each state transition (store write plus registry
//! update) happens inside one critical section in a small synchronous
//! helper, so two overlapping async completions for the same session type
//! can't interleave half-way. Network calls happen outside the lock; their
//! results are re-checked against the store before being committed.
//!
//! ## Lifecycle per session type
//!
//! ```text
//!            login / hydration
//!  [logged out] ─────────────────→ [authenticated] ──refresh──┐
//!       ↑                               │    ↑                 │
//!       └──logout / expiry / 401────────┘    └─────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use orderpass_protocol::{
    InvalidationCode, LoginCredentials, SessionSet, SessionType, UserRecord,
};
use orderpass_refresh::Refresher;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    BackendError, Clock, CredentialRecord, CredentialStore, InitPhase,
    KeyValueStorage, SessionBackend, SessionConfig, SessionEntry,
    SessionError, SessionRegistry, SystemClock,
};

/// Result of a successful refresh call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The renewed token replaced the stored one.
    Rotated,
    /// The session was logged out or re-logged-in while the call was in
    /// flight. The renewed token was dropped.
    Orphaned,
}

/// Owns all session state for the three session types.
///
/// Share it with `Arc`; every method takes `&self`.
pub struct SessionManager<B, S> {
    pub(crate) registry: Mutex<SessionRegistry>,
    pub(crate) store: CredentialStore<S>,
    pub(crate) backend: B,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: SessionConfig,
}

impl<B: SessionBackend, S: KeyValueStorage> SessionManager<B, S> {
    /// Creates a manager with every session logged out and initialization
    /// pending.
    pub fn new(backend: B, storage: S, config: SessionConfig) -> Self {
        Self {
            registry: Mutex::new(SessionRegistry::new()),
            store: CredentialStore::new(storage),
            backend,
            clock: Arc::new(SystemClock),
            config: config.validated(),
        }
    }

    /// Replaces the wall clock (tests use [`ManualClock`](crate::ManualClock)).
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &CredentialStore<S> {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ---------------------------------------------------------------------
    // Read surface
    // ---------------------------------------------------------------------

    // Every read below first retires sessions whose credential is gone or
    // past the lifetime ceiling, so an entry never reads as authenticated
    // without a live record behind it.

    /// Snapshot of one session's entry.
    pub fn session(&self, kind: SessionType) -> SessionEntry {
        let mut registry = self.registry.lock();
        if registry.is_authenticated(kind) {
            self.retire_if_stale(&mut registry, kind);
        }
        registry.entry(kind).clone()
    }

    pub fn is_authenticated(&self, kind: SessionType) -> bool {
        let mut registry = self.registry.lock();
        registry.is_authenticated(kind) && self.retire_if_stale(&mut registry, kind)
    }

    /// The session ambiguous requests are sent as: the explicit active
    /// pointer if still authenticated, else Restaurant > Admin > Customer.
    pub fn active_session(&self) -> Option<SessionType> {
        let mut registry = self.registry.lock();
        self.sweep_stale(&mut registry);
        registry.resolve_active()
    }

    pub fn authenticated(&self) -> SessionSet {
        let mut registry = self.registry.lock();
        self.sweep_stale(&mut registry);
        registry.authenticated()
    }

    pub fn init_phase(&self) -> InitPhase {
        self.registry.lock().phase()
    }

    /// Whether boot initialization has finished.
    pub fn is_settled(&self) -> bool {
        self.registry.lock().is_settled()
    }

    /// Watch the set of authenticated session types.
    pub fn subscribe(&self) -> watch::Receiver<SessionSet> {
        self.registry.lock().subscribe()
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Logs `kind` in and makes it the active session.
    ///
    /// Other session types are not touched. Logging in over an existing
    /// session of the same type replaces it.
    ///
    /// # Errors
    /// - [`SessionError::LoginRejected`]: the backend refused; `message`
    ///   is the backend's explanation.
    /// - [`SessionError::Backend`]: the backend could not be reached or
    ///   answered with garbage.
    /// - [`SessionError::Storage`]: the credential could not be persisted;
    ///   the session is left logged out.
    pub async fn login(
        &self,
        kind: SessionType,
        credentials: &LoginCredentials,
    ) -> Result<UserRecord, SessionError> {
        let grant = self
            .backend
            .login(kind, credentials)
            .await
            .map_err(|e| login_error(kind, e))?;

        let record = CredentialRecord {
            token: grant.token,
            issued_at: self.clock.now(),
            cached_user: Some(grant.user.clone()),
        };
        self.commit_login(kind, &record, grant.user.clone())?;

        info!(session = %kind, user = %grant.user.id, "logged in");
        Ok(grant.user)
    }

    fn commit_login(
        &self,
        kind: SessionType,
        record: &CredentialRecord,
        user: UserRecord,
    ) -> Result<(), SessionError> {
        let mut registry = self.registry.lock();
        if let Err(e) = self.store.save(kind, record) {
            // The previous record (if any) is gone too.
            registry.invalidate(kind);
            return Err(e.into());
        }
        registry.authenticate(kind, user);
        registry.set_active(kind);
        Ok(())
    }

    /// Logs `kind` out. Always succeeds.
    ///
    /// Local state is cleared first; the backend is then told on a
    /// best-effort basis and its failures are ignored.
    pub async fn logout(&self, kind: SessionType) {
        let Some(token) = self.end_session(kind, "logout") else {
            return;
        };
        if let Err(e) = self.backend.logout(kind, &token).await {
            debug!(session = %kind, error = %e, "logout endpoint failed, ignored");
        }
    }

    /// Makes `kind` the active session. Fails if it isn't authenticated.
    pub fn switch_active(&self, kind: SessionType) -> bool {
        let switched = self.registry.lock().set_active(kind);
        if switched {
            debug!(session = %kind, "active session switched");
        }
        switched
    }

    /// Synchronous, local-only credential check.
    ///
    /// `true` if a credential younger than the lifetime ceiling is stored
    /// for `kind`. A stale one is cleared and the session logged out on
    /// the spot.
    pub fn check_auth(&self, kind: SessionType) -> bool {
        let mut registry = self.registry.lock();
        self.retire_if_stale(&mut registry, kind)
    }

    /// Forces `kind` into the logged-out state without calling the backend.
    ///
    /// Returns whether there was anything to clear.
    pub fn invalidate(&self, kind: SessionType) -> bool {
        let was_authenticated = self.registry.lock().is_authenticated(kind);
        self.end_session(kind, "invalidated").is_some() || was_authenticated
    }

    /// Handles a backend rejection of `token`.
    ///
    /// Scans the stored credentials for an exact match and logs that one
    /// session out. No match (the token was already rotated or cleared) is
    /// a silent no-op.
    pub fn handle_rejection(
        &self,
        token: &str,
        code: InvalidationCode,
    ) -> Option<SessionType> {
        let mut registry = self.registry.lock();
        let Some(kind) = self.store.find_by_token(token) else {
            debug!(%code, "rejected token matches no stored credential, ignoring");
            return None;
        };
        self.store.clear(kind);
        registry.invalidate(kind);
        info!(session = %kind, %code, "session invalidated by backend");
        Some(kind)
    }

    /// Exchanges the stored token of `kind` for a renewed one.
    ///
    /// The session entry itself is unchanged. If the session was logged
    /// out, or a newer login replaced the token, while the call was in
    /// flight, the renewed token is dropped ([`RefreshOutcome::Orphaned`]).
    ///
    /// # Errors
    /// - [`SessionError::NotAuthenticated`]: nothing to refresh.
    /// - [`SessionError::CredentialExpired`]: the credential is past the
    ///   ceiling; the session has been logged out.
    /// - [`SessionError::Backend`]: the refresh call failed. The session
    ///   stays authenticated.
    /// - [`SessionError::Storage`]: the renewed token could not be stored;
    ///   the session has been logged out.
    pub async fn refresh_credential(
        &self,
        kind: SessionType,
    ) -> Result<RefreshOutcome, SessionError> {
        let record = self.live_credential(kind)?;
        let renewed = self.backend.refresh(kind, &record.token).await?;
        self.commit_refresh(kind, &record.token, &renewed)
    }

    fn commit_refresh(
        &self,
        kind: SessionType,
        previous: &str,
        renewed: &str,
    ) -> Result<RefreshOutcome, SessionError> {
        let mut registry = self.registry.lock();
        let still_current = registry.is_authenticated(kind)
            && self
                .store
                .read(kind)
                .is_some_and(|record| record.token == previous);
        if !still_current {
            debug!(session = %kind, "session changed during refresh, dropping renewed token");
            return Ok(RefreshOutcome::Orphaned);
        }

        if let Err(e) = self.store.replace_token(kind, renewed, self.clock.now()) {
            registry.invalidate(kind);
            return Err(e.into());
        }
        debug!(session = %kind, "credential refreshed");
        Ok(RefreshOutcome::Rotated)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// The stored record for an authenticated, unexpired session.
    ///
    /// An expired record is cleared (and the session logged out) as a side
    /// effect, so an expired credential is never sent.
    pub(crate) fn live_credential(
        &self,
        kind: SessionType,
    ) -> Result<CredentialRecord, SessionError> {
        let mut registry = self.registry.lock();
        if !registry.is_authenticated(kind) {
            return Err(SessionError::NotAuthenticated(kind));
        }
        let Some(record) = self.store.read(kind) else {
            registry.invalidate(kind);
            warn!(session = %kind, "authenticated session had no stored credential, logged out");
            return Err(SessionError::NotAuthenticated(kind));
        };
        if self.config.is_expired(record.issued_at, self.clock.now()) {
            self.store.clear(kind);
            registry.invalidate(kind);
            info!(session = %kind, "credential exceeded its lifetime, logged out");
            return Err(SessionError::CredentialExpired(kind));
        }
        Ok(record)
    }

    /// `true` if a credential within the lifetime ceiling is stored for
    /// `kind`. Otherwise the record is cleared and the session logged out.
    fn retire_if_stale(&self, registry: &mut SessionRegistry, kind: SessionType) -> bool {
        match self.store.read(kind) {
            Some(record) if self.config.is_expired(record.issued_at, self.clock.now()) => {
                self.store.clear(kind);
                if registry.invalidate(kind) {
                    info!(session = %kind, "credential exceeded its lifetime, logged out");
                }
                false
            }
            Some(_) => true,
            None => {
                if registry.invalidate(kind) {
                    warn!(session = %kind, "authenticated session had no stored credential, logged out");
                }
                false
            }
        }
    }

    fn sweep_stale(&self, registry: &mut SessionRegistry) {
        for kind in registry.authenticated().iter() {
            self.retire_if_stale(registry, kind);
        }
    }

    /// Clears store and registry for `kind` in one step. Returns the token
    /// that was stored, if any.
    fn end_session(&self, kind: SessionType, reason: &'static str) -> Option<String> {
        let mut registry = self.registry.lock();
        let token = self.store.read(kind).map(|record| record.token);
        self.store.clear(kind);
        if registry.invalidate(kind) {
            info!(session = %kind, reason, "session ended");
        }
        token
    }
}

impl<B: SessionBackend, S: KeyValueStorage> Refresher for SessionManager<B, S> {
    type Error = SessionError;

    fn refresh(
        &self,
        kind: SessionType,
    ) -> impl Future<Output = Result<(), SessionError>> + Send {
        async move { self.refresh_credential(kind).await.map(|_| ()) }
    }

    fn credential_age(&self, kind: SessionType) -> Option<Duration> {
        let record = self.store.read(kind)?;
        let age = self.clock.now().signed_duration_since(record.issued_at);
        Some(age.to_std().unwrap_or(Duration::ZERO))
    }
}

fn login_error(kind: SessionType, error: BackendError) -> SessionError {
    match error {
        BackendError::Rejected {
            status, message, ..
        } => SessionError::LoginRejected {
            kind,
            message: message.unwrap_or_else(|| match status {
                401 | 403 => "invalid email or password".to_string(),
                _ => format!("login failed with status {status}"),
            }),
        },
        other => SessionError::Backend(other),
    }
}
