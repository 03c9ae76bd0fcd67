//! Core types shared by every Orderpass layer.
//!
//! These are the values that cross the wire to the backend, get persisted
//! into client storage, or are used to key in-memory session state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// SessionType
// ---------------------------------------------------------------------------

/// One of the three independent identities a client can hold.
///
/// Each variant is its own namespace: it owns a storage key group, a set
/// of backend endpoints, a login route, and one slot in the session
/// registry. Two session types never share a credential.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// A diner placing orders.
    Customer,
    /// A restaurant operator managing menus and incoming orders.
    Restaurant,
    /// A platform administrator.
    Admin,
}

impl SessionType {
    /// Every session type, in boot hydration order.
    pub const ALL: [SessionType; 3] =
        [SessionType::Customer, SessionType::Restaurant, SessionType::Admin];

    /// Fallback order used to pick a credential when no session has been
    /// made active explicitly. Most privileged first.
    pub const PRIORITY: [SessionType; 3] =
        [SessionType::Restaurant, SessionType::Admin, SessionType::Customer];

    /// Lowercase name, also used as the storage key prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Customer => "customer",
            SessionType::Restaurant => "restaurant",
            SessionType::Admin => "admin",
        }
    }

    /// Dense index (0..3), handy for fixed-size per-type tables.
    pub fn index(self) -> usize {
        match self {
            SessionType::Customer => 0,
            SessionType::Restaurant => 1,
            SessionType::Admin => 2,
        }
    }

    fn bit(self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(SessionType::Customer),
            "restaurant" => Ok(SessionType::Restaurant),
            "admin" => Ok(SessionType::Admin),
            other => Err(ProtocolError::UnknownSessionType(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSet
// ---------------------------------------------------------------------------

/// A small set of session types (a 3-bit mask).
///
/// Used to publish "which sessions are authenticated right now" so the
/// refresh scheduler can diff the old and new sets instead of restarting
/// every timer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionSet(u8);

impl SessionSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, kind: SessionType) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Adds `kind`. Returns `true` if it was not already present.
    pub fn insert(&mut self, kind: SessionType) -> bool {
        let added = !self.contains(kind);
        self.0 |= kind.bit();
        added
    }

    /// Removes `kind`. Returns `true` if it was present.
    pub fn remove(&mut self, kind: SessionType) -> bool {
        let removed = self.contains(kind);
        self.0 &= !kind.bit();
        removed
    }

    /// Types in `self` that are not in `other`.
    pub fn difference(self, other: SessionSet) -> SessionSet {
        SessionSet(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates members in [`SessionType::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = SessionType> {
        SessionType::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<SessionType> for SessionSet {
    fn from_iter<I: IntoIterator<Item = SessionType>>(iter: I) -> Self {
        let mut set = SessionSet::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl fmt::Debug for SessionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// User identity
// ---------------------------------------------------------------------------

/// Backend identifier of a principal.
///
/// The backends behind the three login endpoints are not consistent about
/// ids: some return numbers, some return strings. Both deserialize into
/// the same string form here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => UserId(s),
            Raw::Int(n) => UserId(n.to_string()),
        })
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A role string scoped to one session type (e.g. `"admin"`, `"support"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The principal returned by login and "who am I".
///
/// Owned by exactly one registry slot. Even if the same backend account
/// could log in as two session types, each slot keeps its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "name")]
    pub display_name: Option<String>,
    /// Display data only. Authorization never looks at this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire bodies
// ---------------------------------------------------------------------------

/// Body of a login request.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful login response: a fresh token plus the principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginGrant {
    pub token: String,
    pub user: UserRecord,
}

/// Successful refresh response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshGrant {
    pub token: String,
}

/// Error body returned by the backend on non-2xx responses.
///
/// Every field is optional: proxies and load balancers in front of the
/// backend return bodies that carry none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// The invalidation code carried by this body, if any.
    pub fn invalidation(&self) -> Option<InvalidationCode> {
        self.code.as_deref().and_then(InvalidationCode::from_code)
    }
}

/// Machine-readable 401 codes that mean "the token you sent is no good".
///
/// Any other 401 (wrong password, missing permission on a resource) must
/// not log a session out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationCode {
    /// The token was valid once but its server-side lifetime ran out.
    TokenExpired,
    /// The token was revoked, malformed, or never issued.
    TokenInvalid,
}

impl InvalidationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidationCode::TokenExpired => "TOKEN_EXPIRED",
            InvalidationCode::TokenInvalid => "INVALID_TOKEN",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "TOKEN_EXPIRED" => Some(InvalidationCode::TokenExpired),
            "INVALID_TOKEN" => Some(InvalidationCode::TokenInvalid),
            _ => None,
        }
    }
}

impl fmt::Display for InvalidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
