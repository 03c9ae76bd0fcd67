//! The backend contract: login, who-am-I, refresh, logout.
//!
//! Orderpass doesn't validate sessions itself; the backend does. The
//! [`SessionBackend`] trait is the four calls the session layer needs, and
//! [`HttpBackend`] implements them over any [`HttpClient`]. Tests plug in
//! an in-memory backend instead.

use std::future::Future;

use orderpass_protocol::{
    ApiErrorBody, Codec, JsonCodec, LoginCredentials, LoginGrant,
    ProtocolError, RefreshGrant, SessionType, UserRecord,
};
use orderpass_transport::{HttpClient, HttpRequest, HttpResponse};
use serde_json::Value;

use crate::BackendError;

/// The authentication endpoints of the backend, per session type.
///
/// Futures are `Send` because refresh runs on spawned tasks.
///
/// # Example
///
/// ```rust
/// use orderpass_protocol::{LoginCredentials, LoginGrant, Role, SessionType, UserId, UserRecord};
/// use orderpass_session::{BackendError, SessionBackend};
///
/// /// Accepts one hard-coded customer. Only useful in a demo.
/// struct DemoBackend;
///
/// impl SessionBackend for DemoBackend {
///     async fn login(
///         &self,
///         _kind: SessionType,
///         _credentials: &LoginCredentials,
///     ) -> Result<LoginGrant, BackendError> {
///         Ok(LoginGrant {
///             token: "demo".into(),
///             user: self.who_am_i(SessionType::Customer, "demo").await?,
///         })
///     }
///
///     async fn who_am_i(&self, _kind: SessionType, _token: &str) -> Result<UserRecord, BackendError> {
///         Ok(UserRecord {
///             id: UserId::new("1"),
///             email: "demo@example.com".into(),
///             role: Role::new("customer"),
///             display_name: None,
///             restaurant_name: None,
///         })
///     }
///
///     async fn refresh(&self, _kind: SessionType, token: &str) -> Result<String, BackendError> {
///         Ok(token.to_string())
///     }
///
///     async fn logout(&self, _kind: SessionType, _token: &str) -> Result<(), BackendError> {
///         Ok(())
///     }
/// }
/// ```
pub trait SessionBackend: Send + Sync + 'static {
    /// Exchanges credentials for a token and the principal.
    fn login(
        &self,
        kind: SessionType,
        credentials: &LoginCredentials,
    ) -> impl Future<Output = Result<LoginGrant, BackendError>> + Send;

    /// Resolves a stored token back to its principal.
    fn who_am_i(
        &self,
        kind: SessionType,
        token: &str,
    ) -> impl Future<Output = Result<UserRecord, BackendError>> + Send;

    /// Exchanges a still-valid token for a renewed one.
    fn refresh(
        &self,
        kind: SessionType,
        token: &str,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Tells the backend the token is no longer used. Best-effort.
    fn logout(
        &self,
        kind: SessionType,
        token: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Paths of the four auth endpoints for one session type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    pub login: String,
    pub me: String,
    pub refresh: String,
    pub logout: String,
}

impl EndpointSet {
    /// The conventional layout under `prefix`.
    pub fn under(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            login: format!("{prefix}/login"),
            me: format!("{prefix}/me"),
            refresh: format!("{prefix}/refresh-token"),
            logout: format!("{prefix}/logout"),
        }
    }
}

/// Endpoint paths for all three session types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub customer: EndpointSet,
    pub restaurant: EndpointSet,
    pub admin: EndpointSet,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            customer: EndpointSet::under("/api/customers"),
            restaurant: EndpointSet::under("/api/restaurants"),
            admin: EndpointSet::under("/api/admin"),
        }
    }
}

impl Endpoints {
    pub fn for_session(&self, kind: SessionType) -> &EndpointSet {
        match kind {
            SessionType::Customer => &self.customer,
            SessionType::Restaurant => &self.restaurant,
            SessionType::Admin => &self.admin,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// [`SessionBackend`] over HTTP+JSON.
///
/// Auth calls set their own `Authorization` header (or are anonymous, for
/// login), so they behave the same whether `client` is a raw client or a
/// [`SessionClient`](crate::SessionClient).
#[derive(Debug, Clone)]
pub struct HttpBackend<C> {
    client: C,
    base_url: String,
    endpoints: Endpoints,
    codec: JsonCodec,
}

impl<C: HttpClient> HttpBackend<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoints: Endpoints::default(),
            codec: JsonCodec,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, BackendError> {
        let response = self.client.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(rejection(&response))
        }
    }
}

impl<C: HttpClient> SessionBackend for HttpBackend<C> {
    async fn login(
        &self,
        kind: SessionType,
        credentials: &LoginCredentials,
    ) -> Result<LoginGrant, BackendError> {
        let body = self.codec.encode(credentials)?;
        let request = HttpRequest::post(self.url(&self.endpoints.for_session(kind).login))
            .anonymous()
            .with_json(body);
        let response = self.call(request).await?;
        Ok(self.codec.decode(&response.body)?)
    }

    async fn who_am_i(
        &self,
        kind: SessionType,
        token: &str,
    ) -> Result<UserRecord, BackendError> {
        let request = HttpRequest::get(self.url(&self.endpoints.for_session(kind).me))
            .for_session(kind)
            .with_bearer(token);
        let response = self.call(request).await?;

        // Either the user itself or `{ "user": { ... } }`.
        let body: Value = self.codec.decode(&response.body)?;
        let user = match body {
            Value::Object(mut map) if map.contains_key("user") => {
                map.remove("user").unwrap_or(Value::Null)
            }
            other => other,
        };
        Ok(serde_json::from_value(user).map_err(ProtocolError::Decode)?)
    }

    async fn refresh(
        &self,
        kind: SessionType,
        token: &str,
    ) -> Result<String, BackendError> {
        let request = HttpRequest::post(self.url(&self.endpoints.for_session(kind).refresh))
            .for_session(kind)
            .with_bearer(token);
        let response = self.call(request).await?;
        let grant: RefreshGrant = self.codec.decode(&response.body)?;
        Ok(grant.token)
    }

    async fn logout(
        &self,
        kind: SessionType,
        token: &str,
    ) -> Result<(), BackendError> {
        let request = HttpRequest::post(self.url(&self.endpoints.for_session(kind).logout))
            .for_session(kind)
            .with_bearer(token);
        self.call(request).await?;
        Ok(())
    }
}

fn rejection(response: &HttpResponse) -> BackendError {
    let body: ApiErrorBody = JsonCodec.decode(&response.body).unwrap_or_default();
    BackendError::Rejected {
        status: response.status,
        code: body.code,
        message: body.message,
    }
}
