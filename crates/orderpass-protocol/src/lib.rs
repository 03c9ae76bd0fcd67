//! Shared vocabulary for Orderpass.
//!
//! This crate defines what every other layer talks about:
//!
//! - **Types** ([`SessionType`], [`SessionSet`], [`UserRecord`], [`Role`]):
//!   the identities the client can hold at the same time.
//! - **Wire bodies** ([`LoginCredentials`], [`LoginGrant`], [`RefreshGrant`],
//!   [`ApiErrorBody`], [`InvalidationCode`]), what the backend endpoints
//!   accept and return.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]), how those values become
//!   bytes, both on the wire and in persistent storage.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Protocol (types) → Transport (HTTP) → Session (registry, store) → Guard / Refresh
//! ```
//!
//! Nothing in here performs I/O.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ApiErrorBody, InvalidationCode, LoginCredentials, LoginGrant,
    RefreshGrant, Role, SessionSet, SessionType, UserId, UserRecord,
};
