//! Codec trait and implementations for serializing/deserializing values.
//!
//! The same codec is used for backend response bodies and for the cached
//! user record kept in persistent storage, so both sides agree on one
//! representation. Swapping the format means implementing [`Codec`] once.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec lives inside long-lived shared
/// state (the credential store, the HTTP backend) that tokio tasks touch
/// from any worker thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// The backend speaks JSON and browser-style key-value storage only holds
/// strings, so JSON is the natural format for both.
///
/// ## Example
///
/// ```rust
/// use orderpass_protocol::{Codec, JsonCodec, RefreshGrant};
///
/// let codec = JsonCodec;
/// let grant: RefreshGrant = codec.decode(br#"{"token":"abc"}"#).unwrap();
/// assert_eq!(grant.token, "abc");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
