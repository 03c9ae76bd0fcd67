//! The in-memory session registry.
//!
//! One [`SessionEntry`] per [`SessionType`], the active-session pointer, and
//! the initialization phase. Like the credential store it is a plain
//! struct; [`SessionManager`](crate::SessionManager) owns it behind a lock
//! and performs each state transition in a single critical section.

use orderpass_protocol::{Role, SessionSet, SessionType, UserRecord};
use tokio::sync::watch;

/// In-memory state of one session type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEntry {
    pub user: Option<UserRecord>,
    pub is_authenticated: bool,
}

impl SessionEntry {
    /// The `{null, false}` state every entry starts in.
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn role(&self) -> Option<&Role> {
        self.user.as_ref().map(|u| &u.role)
    }
}

/// Boot initialization progress.
///
/// ```text
/// Pending ──(initialize)──→ Running ──(all types processed)──→ Settled
/// ```
///
/// Guards render a loading state until `Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Pending,
    Running,
    Settled,
}

/// Session state for all three types.
///
/// Every change to the authenticated set is published on a
/// [`watch`] channel; the refresh scheduler subscribes to it and starts or
/// stops timers by diffing consecutive values.
#[derive(Debug)]
pub struct SessionRegistry {
    entries: [SessionEntry; 3],
    active: Option<SessionType>,
    phase: InitPhase,
    authenticated_tx: watch::Sender<SessionSet>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (authenticated_tx, _) = watch::channel(SessionSet::empty());
        Self {
            entries: Default::default(),
            active: None,
            phase: InitPhase::Pending,
            authenticated_tx,
        }
    }

    pub fn entry(&self, kind: SessionType) -> &SessionEntry {
        &self.entries[kind.index()]
    }

    pub fn is_authenticated(&self, kind: SessionType) -> bool {
        self.entry(kind).is_authenticated
    }

    /// Marks `kind` authenticated as `user`. Other entries are untouched.
    pub fn authenticate(&mut self, kind: SessionType, user: UserRecord) {
        self.entries[kind.index()] = SessionEntry {
            user: Some(user),
            is_authenticated: true,
        };
        self.publish();
    }

    /// Returns `kind` to logged-out, dropping the active pointer if it
    /// pointed here. Returns whether the entry was authenticated.
    pub fn invalidate(&mut self, kind: SessionType) -> bool {
        let was_authenticated = self.is_authenticated(kind);
        self.entries[kind.index()] = SessionEntry::logged_out();
        if self.active == Some(kind) {
            self.active = None;
        }
        self.publish();
        was_authenticated
    }

    /// Points the active session at `kind`. Fails if it isn't authenticated.
    pub fn set_active(&mut self, kind: SessionType) -> bool {
        if !self.is_authenticated(kind) {
            return false;
        }
        self.active = Some(kind);
        true
    }

    /// The explicitly selected active session, if any.
    pub fn active(&self) -> Option<SessionType> {
        self.active
    }

    /// The session whose credential ambiguous requests should carry.
    ///
    /// The explicit pointer wins while it is authenticated. Otherwise the
    /// first authenticated type in [`SessionType::PRIORITY`] order.
    pub fn resolve_active(&self) -> Option<SessionType> {
        self.active
            .filter(|kind| self.is_authenticated(*kind))
            .or_else(|| {
                SessionType::PRIORITY
                    .into_iter()
                    .find(|kind| self.is_authenticated(*kind))
            })
    }

    pub fn authenticated(&self) -> SessionSet {
        SessionType::ALL
            .into_iter()
            .filter(|kind| self.is_authenticated(*kind))
            .collect()
    }

    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    pub fn is_settled(&self) -> bool {
        self.phase == InitPhase::Settled
    }

    /// `Pending → Running`. Returns `false` if initialization already started.
    pub fn begin_initialization(&mut self) -> bool {
        if self.phase != InitPhase::Pending {
            return false;
        }
        self.phase = InitPhase::Running;
        true
    }

    pub fn settle(&mut self) {
        self.phase = InitPhase::Settled;
    }

    /// Receiver for the authenticated set. The current value is marked seen.
    pub fn subscribe(&self) -> watch::Receiver<SessionSet> {
        self.authenticated_tx.subscribe()
    }

    fn publish(&self) {
        let set = self.authenticated();
        self.authenticated_tx.send_if_modified(|current| {
            if *current == set {
                false
            } else {
                *current = set;
                true
            }
        });
    }
}
