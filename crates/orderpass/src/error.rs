//! Unified error type for Orderpass.

use orderpass_protocol::ProtocolError;
use orderpass_session::{SessionError, StorageError};
use orderpass_transport::TransportError;

/// Top-level error wrapping the errors of every Orderpass crate.
///
/// The `#[from]` conversions let `?` lift sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum OrderpassError {
    /// A transport-level error (connection, timeout, bad request).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-format error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (login rejected, refresh failed).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The credential storage could not be opened or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
