//! What the guards need from session state.
//!
//! [`SessionGate`] is implemented for [`SessionManager`] so guards run
//! against the live registry, and tests can substitute a fixed gate.

use std::future::Future;
use std::sync::Arc;

use orderpass_protocol::SessionType;
use orderpass_session::{KeyValueStorage, SessionBackend, SessionEntry, SessionManager};

/// The slice of session state guards read, plus logout for the login page.
pub trait SessionGate: Send + Sync {
    /// Whether boot initialization has finished.
    fn is_settled(&self) -> bool;

    fn session(&self, kind: SessionType) -> SessionEntry;

    fn logout(&self, kind: SessionType) -> impl Future<Output = ()> + Send;
}

impl<B: SessionBackend, S: KeyValueStorage> SessionGate for SessionManager<B, S> {
    fn is_settled(&self) -> bool {
        SessionManager::is_settled(self)
    }

    fn session(&self, kind: SessionType) -> SessionEntry {
        SessionManager::session(self, kind)
    }

    fn logout(&self, kind: SessionType) -> impl Future<Output = ()> + Send {
        SessionManager::logout(self, kind)
    }
}

impl<G: SessionGate> SessionGate for Arc<G> {
    fn is_settled(&self) -> bool {
        (**self).is_settled()
    }

    fn session(&self, kind: SessionType) -> SessionEntry {
        (**self).session(kind)
    }

    fn logout(&self, kind: SessionType) -> impl Future<Output = ()> + Send {
        (**self).logout(kind)
    }
}
