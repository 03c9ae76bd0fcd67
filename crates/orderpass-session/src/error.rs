//! Error types for the session layer.

use orderpass_protocol::{ProtocolError, SessionType};
use orderpass_transport::TransportError;

/// Errors raised by a [`KeyValueStorage`](crate::KeyValueStorage) backend.
///
/// Reads never surface these: a read that fails is treated as "no
/// credential stored". Writes report them so a login that could not be
/// persisted is rejected instead of half-succeeding.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The write would push the origin's storage over its byte quota.
    #[error("storage quota exceeded ({needed} bytes needed, {quota} allowed)")]
    QuotaExceeded { needed: usize, quota: usize },

    /// The backing file could not be read or written.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a JSON object of strings.
    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A value could not be encoded for storage.
    #[error("failed to encode stored value: {0}")]
    Encode(#[from] ProtocolError),
}

/// Errors returned by a [`SessionBackend`](crate::SessionBackend).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No response was obtained.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered with a non-2xx status.
    #[error("backend rejected request with status {status}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("malformed backend response: {0}")]
    Malformed(#[from] ProtocolError),
}

/// Errors surfaced by [`SessionManager`](crate::SessionManager) operations.
///
/// Only explicit user actions (login) and direct refresh calls return
/// these. Boot hydration and 401 invalidation absorb their failures and
/// resolve to "logged out".
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend refused the login. `message` is safe to show the user.
    #[error("{kind} login rejected: {message}")]
    LoginRejected { kind: SessionType, message: String },

    /// No authenticated session of this type.
    #[error("{0} session is not authenticated")]
    NotAuthenticated(SessionType),

    /// The stored credential is older than the lifetime ceiling. It has
    /// been cleared.
    #[error("{0} credential exceeded its lifetime")]
    CredentialExpired(SessionType),

    /// A backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The credential could not be persisted.
    #[error("failed to persist credential: {0}")]
    Storage(#[from] StorageError),
}
