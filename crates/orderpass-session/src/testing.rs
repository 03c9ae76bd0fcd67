//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use orderpass_protocol::{
    LoginCredentials, LoginGrant, Role, SessionType, UserId, UserRecord,
};
use orderpass_transport::TransportError;
use parking_lot::Mutex;

use crate::{BackendError, SessionBackend};

pub(crate) const PASSWORD: &str = "secret";

pub(crate) fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub(crate) fn user(kind: SessionType, role: &str) -> UserRecord {
    UserRecord {
        id: UserId::new(format!("{kind}-1")),
        email: format!("{kind}@orderpass.test"),
        role: Role::new(role),
        display_name: None,
        restaurant_name: None,
    }
}

fn unauthorized(code: &str) -> BackendError {
    BackendError::Rejected {
        status: 401,
        code: Some(code.to_string()),
        message: Some("Invalid email or password".to_string()),
    }
}

/// In-memory backend: knows which tokens are live and who they belong to.
#[derive(Default)]
pub(crate) struct MockBackend {
    tokens: Mutex<HashMap<String, UserRecord>>,
    issued: AtomicU64,
    pub(crate) who_am_i_calls: AtomicUsize,
    pub(crate) refresh_calls: AtomicUsize,
    pub(crate) logout_calls: Mutex<Vec<(SessionType, String)>>,
    pub(crate) fail_refresh: AtomicBool,
    pub(crate) fail_logout: AtomicBool,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes `token` resolve to `user` on who-am-I and refresh.
    pub(crate) fn accept(&self, token: &str, user: UserRecord) {
        self.tokens.lock().insert(token.to_string(), user);
    }

    pub(crate) fn revoke(&self, token: &str) {
        self.tokens.lock().remove(token);
    }

    fn issue(&self, prefix: &str, user: UserRecord) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("{prefix}-{n}");
        self.tokens.lock().insert(token.clone(), user);
        token
    }
}

impl SessionBackend for MockBackend {
    async fn login(
        &self,
        kind: SessionType,
        credentials: &LoginCredentials,
    ) -> Result<LoginGrant, BackendError> {
        if credentials.password != PASSWORD {
            return Err(unauthorized("INVALID_CREDENTIALS"));
        }
        let user = user(kind, kind.as_str());
        let token = self.issue(kind.as_str(), user.clone());
        Ok(LoginGrant { token, user })
    }

    async fn who_am_i(
        &self,
        _kind: SessionType,
        token: &str,
    ) -> Result<UserRecord, BackendError> {
        self.who_am_i_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .get(token)
            .cloned()
            .ok_or_else(|| unauthorized("INVALID_TOKEN"))
    }

    async fn refresh(
        &self,
        _kind: SessionType,
        token: &str,
    ) -> Result<String, BackendError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(BackendError::Transport(TransportError::Timeout));
        }
        let user = self
            .tokens
            .lock()
            .get(token)
            .cloned()
            .ok_or_else(|| unauthorized("INVALID_TOKEN"))?;
        Ok(self.issue(&format!("{token}-r"), user))
    }

    async fn logout(
        &self,
        kind: SessionType,
        token: &str,
    ) -> Result<(), BackendError> {
        self.logout_calls.lock().push((kind, token.to_string()));
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(BackendError::Transport(TransportError::ConnectionFailed(
                "offline".into(),
            )));
        }
        self.revoke(token);
        Ok(())
    }
}
