//! Boot hydration.
//!
//! Restores sessions from the credential store when the process starts.
//! Each type is handled on its own: a stale admin credential doesn't stop a
//! fresh customer one from being restored.

use orderpass_protocol::{SessionSet, SessionType, UserRecord};
use tracing::{debug, info, warn};

use crate::{KeyValueStorage, SessionBackend, SessionManager};

/// What [`SessionManager::initialize`] did with each session type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Restored as authenticated.
    pub hydrated: SessionSet,
    /// Credential was past the lifetime ceiling and was cleared.
    pub expired: SessionSet,
    /// The backend didn't accept the stored credential (or couldn't be
    /// reached); the credential was cleared.
    pub failed: SessionSet,
    /// Nothing stored.
    pub absent: SessionSet,
}

impl<B: SessionBackend, S: KeyValueStorage> SessionManager<B, S> {
    /// Runs boot hydration for Customer, Restaurant and Admin, in that
    /// order, then marks initialization settled.
    ///
    /// Runs once. Later calls return an empty report without touching
    /// anything. Failures are never returned; they resolve to "logged out".
    pub async fn initialize(&self) -> InitReport {
        let mut report = InitReport::default();
        if !self.registry.lock().begin_initialization() {
            debug!("session initialization already ran, skipping");
            return report;
        }

        for kind in SessionType::ALL {
            self.hydrate(kind, &mut report).await;
        }

        self.registry.lock().settle();
        info!(
            hydrated = report.hydrated.len(),
            expired = report.expired.len(),
            failed = report.failed.len(),
            "session initialization settled"
        );
        report
    }

    async fn hydrate(&self, kind: SessionType, report: &mut InitReport) {
        let Some(record) = self.store.read(kind) else {
            report.absent.insert(kind);
            return;
        };

        if self.config.is_expired(record.issued_at, self.clock.now()) {
            self.store.clear(kind);
            info!(session = %kind, "stored credential exceeded its lifetime, cleared");
            report.expired.insert(kind);
            return;
        }

        match self.backend.who_am_i(kind, &record.token).await {
            Ok(user) => {
                if self.commit_hydration(kind, &record.token, user) {
                    report.hydrated.insert(kind);
                } else {
                    report.absent.insert(kind);
                }
            }
            Err(e) => {
                warn!(session = %kind, error = %e, "stored credential rejected, cleared");
                self.clear_if_current(kind, &record.token);
                report.failed.insert(kind);
            }
        }
    }

    /// Marks `kind` authenticated, unless the stored token changed while
    /// who-am-I was in flight.
    fn commit_hydration(&self, kind: SessionType, token: &str, user: UserRecord) -> bool {
        let mut registry = self.registry.lock();
        let current = self
            .store
            .read(kind)
            .is_some_and(|record| record.token == token);
        if !current {
            debug!(session = %kind, "credential changed during hydration, not restoring");
            return false;
        }

        if let Err(e) = self.store.cache_user(kind, &user) {
            debug!(session = %kind, error = %e, "could not refresh cached user");
        }
        registry.authenticate(kind, user);
        debug!(session = %kind, "session restored");
        true
    }

    fn clear_if_current(&self, kind: SessionType, token: &str) {
        let mut registry = self.registry.lock();
        if self.store.find_by_token(token) == Some(kind) {
            self.store.clear(kind);
            registry.invalidate(kind);
        }
    }
}
