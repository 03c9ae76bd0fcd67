//! Error types for the protocol layer.
//!
//! Each crate in Orderpass defines its own error enum. A `ProtocolError`
//! always means a value could not be turned into bytes or back, or that a
//! string did not name a known protocol value. It never means the network
//! failed.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The string does not name one of the three session types.
    #[error("unknown session type: {0}")]
    UnknownSessionType(String),
}
