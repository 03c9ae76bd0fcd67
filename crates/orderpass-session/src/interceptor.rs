//! Transport hooks: credential selection and 401 invalidation.
//!
//! [`SessionClient`] wraps any [`HttpClient`]. On the way out it attaches the
//! bearer credential the request's [`CredentialPolicy`] asks for; on the way
//! back it turns a 401 carrying an invalidation code into a logout of the
//! one session whose token was rejected.

use std::sync::Arc;

use orderpass_protocol::{ApiErrorBody, Codec, JsonCodec, SessionType};
use orderpass_transport::{
    CredentialPolicy, HttpClient, HttpRequest, HttpResponse, TransportError,
};
use tracing::{debug, trace};

use crate::{KeyValueStorage, SessionBackend, SessionManager};

/// The credential chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedCredential {
    pub session: SessionType,
    pub token: String,
}

impl<B: SessionBackend, S: KeyValueStorage> SessionManager<B, S> {
    /// Picks the credential for a request with the given policy.
    ///
    /// - `Anonymous`: none.
    /// - `Session(kind)`: that session's, if it's authenticated.
    /// - `Active`: the resolved active session's (explicit pointer, else
    ///   Restaurant > Admin > Customer).
    ///
    /// The outcome depends only on the policy and current state, never on
    /// the order sessions were checked in. An expired credential is never
    /// returned; finding one logs its session out.
    pub fn select_credential(&self, policy: CredentialPolicy) -> Option<SelectedCredential> {
        let session = match policy {
            CredentialPolicy::Anonymous => return None,
            CredentialPolicy::Session(kind) => kind,
            CredentialPolicy::Active => self.active_session()?,
        };
        let record = self.live_credential(session).ok()?;
        Some(SelectedCredential {
            session,
            token: record.token,
        })
    }

    /// Inspects a response to a request that carried `sent_token`.
    ///
    /// A 401 whose body has code `TOKEN_EXPIRED` or `INVALID_TOKEN` logs
    /// out the session that stores exactly that token. Returns the session
    /// that was logged out, if any.
    pub fn on_response(
        &self,
        sent_token: Option<&str>,
        response: &HttpResponse,
    ) -> Option<SessionType> {
        if !response.is_unauthorized() {
            return None;
        }
        let body: ApiErrorBody = JsonCodec.decode(&response.body).unwrap_or_default();
        let Some(code) = body.invalidation() else {
            trace!(code = ?body.code, "401 without invalidation code, not a session signal");
            return None;
        };
        let token = sent_token?;
        self.handle_rejection(token, code)
    }
}

/// An [`HttpClient`] that manages credentials for the requests it sends.
pub struct SessionClient<C, B, S> {
    inner: C,
    sessions: Arc<SessionManager<B, S>>,
}

impl<C: Clone, B, S> Clone for SessionClient<C, B, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<C, B, S> SessionClient<C, B, S>
where
    C: HttpClient,
    B: SessionBackend,
    S: KeyValueStorage,
{
    pub fn new(inner: C, sessions: Arc<SessionManager<B, S>>) -> Self {
        Self { inner, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionManager<B, S>> {
        &self.sessions
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C, B, S> HttpClient for SessionClient<C, B, S>
where
    C: HttpClient,
    B: SessionBackend,
    S: KeyValueStorage,
{
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if request.header("authorization").is_none() {
            if let Some(selected) = self.sessions.select_credential(request.credential) {
                trace!(session = %selected.session, url = %request.url, "attaching credential");
                request = request.with_bearer(&selected.token);
            }
        }
        let sent_token = request.bearer_token().map(str::to_owned);

        let response = self.inner.send(request).await?;

        if let Some(kind) = self.sessions.on_response(sent_token.as_deref(), &response) {
            debug!(session = %kind, status = response.status, "request rejected, session logged out");
        }
        Ok(response)
    }
}
