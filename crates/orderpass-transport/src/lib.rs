//! HTTP transport abstraction for Orderpass.
//!
//! Provides the [`HttpClient`] trait plus plain request/response values, so
//! the session layer can decorate any client (the credential selector and
//! the 401 interceptor are such a decorator) and tests can swap in a fake.
//!
//! # Feature Flags
//!
//! - `reqwest` (default), [`ReqwestClient`], an `HttpClient` backed by `reqwest`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "reqwest")]
mod reqwest_client;

pub use error::TransportError;
#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use orderpass_protocol::SessionType;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

/// Which session's bearer credential a request wants attached.
///
/// Read by the credential selector in the session layer. A request that
/// already carries an `Authorization` header is sent as-is whatever its
/// policy says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialPolicy {
    /// Use whatever session is currently active.
    #[default]
    Active,
    /// Use this session's credential, or none if it isn't authenticated.
    Session(SessionType),
    /// Never attach a credential (login, public endpoints).
    Anonymous,
}

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub credential: CredentialPolicy,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            credential: CredentialPolicy::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Sets a header, replacing any existing value (names compare
    /// case-insensitively).
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// The bearer token carried in the `Authorization` header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.header("Authorization")?;
        let (scheme, token) = value.split_once(' ')?;
        if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
            Some(token.trim())
        } else {
            None
        }
    }

    /// Sets a JSON body and the matching content type.
    pub fn with_json(mut self, body: Vec<u8>) -> Self {
        self.set_header("Content-Type", "application/json");
        self.body = Some(body);
        self
    }

    pub fn for_session(mut self, kind: SessionType) -> Self {
        self.credential = CredentialPolicy::Session(kind);
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.credential = CredentialPolicy::Anonymous;
        self
    }
}

/// A received HTTP response, body fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends HTTP requests.
///
/// The returned future must be `Send`: refresh calls run on spawned tokio
/// tasks.
pub trait HttpClient: Send + Sync + 'static {
    /// Sends `request` and buffers the full response.
    ///
    /// Non-2xx statuses are returned as `Ok`; only failure to obtain any
    /// response is an `Err`.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

impl<C: HttpClient> HttpClient for Arc<C> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_round_trip() {
        let req = HttpRequest::get("http://api/orders").with_bearer("tok-1");
        assert_eq!(req.header("authorization"), Some("Bearer tok-1"));
        assert_eq!(req.bearer_token(), Some("tok-1"));
    }

    #[test]
    fn test_bearer_token_ignores_other_schemes() {
        let req = HttpRequest::get("http://api").with_header("Authorization", "Basic abc");
        assert_eq!(req.bearer_token(), None);

        let req = HttpRequest::get("http://api").with_header("Authorization", "Bearer ");
        assert_eq!(req.bearer_token(), None);
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut req = HttpRequest::get("http://api").with_header("X-Trace", "1");
        req.set_header("x-trace", "2");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("X-TRACE"), Some("2"));
    }

    #[test]
    fn test_default_policy_is_active() {
        let req = HttpRequest::post("http://api/cart");
        assert_eq!(req.credential, CredentialPolicy::Active);
        assert_eq!(
            req.clone().for_session(SessionType::Admin).credential,
            CredentialPolicy::Session(SessionType::Admin)
        );
        assert_eq!(req.anonymous().credential, CredentialPolicy::Anonymous);
    }

    #[test]
    fn test_with_json_sets_content_type() {
        let req = HttpRequest::post("http://api").with_json(b"{}".to_vec());
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn test_response_status_helpers() {
        assert!(HttpResponse::new(204, Vec::new()).is_success());
        assert!(!HttpResponse::new(302, Vec::new()).is_success());
        assert!(HttpResponse::new(401, Vec::new()).is_unauthorized());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
