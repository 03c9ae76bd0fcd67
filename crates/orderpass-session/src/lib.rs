//! Session management for Orderpass.
//!
//! A single client process can be logged in as a customer, a restaurant
//! operator and a platform admin at the same time. This crate keeps those
//! three identities apart:
//!
//! 1. **Persistence**: [`CredentialStore`] writes one {token, issued-at,
//!    cached user} group per [`SessionType`](orderpass_protocol::SessionType)
//!    into a [`KeyValueStorage`].
//! 2. **State**: [`SessionRegistry`] holds the in-memory entry per type and
//!    the active-session pointer.
//! 3. **Lifecycle**: [`SessionManager`] runs boot hydration, login, logout,
//!    refresh, and 401-driven invalidation against a [`SessionBackend`].
//! 4. **Transport hook**: [`SessionClient`] picks the bearer credential for
//!    each outgoing request and routes 401 rejections back to the session
//!    that caused them.
//!
//! # How it fits in the stack
//!
//! ```text
//! Guard / Refresh scheduler (above)  ← read state, drive refresh
//!     ↕
//! Session Layer (this crate)  ← owns credentials and session state
//!     ↕
//! Transport + Protocol (below)  ← HTTP and wire types
//! ```

#![allow(async_fn_in_trait)]

mod backend;
mod clock;
mod config;
mod error;
mod initializer;
mod interceptor;
mod manager;
mod registry;
mod storage;
mod store;
#[cfg(test)]
mod testing;

pub use backend::{EndpointSet, Endpoints, HttpBackend, SessionBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ABSOLUTE_LIFETIME, SessionConfig};
pub use error::{BackendError, SessionError, StorageError};
pub use initializer::InitReport;
pub use interceptor::{SelectedCredential, SessionClient};
pub use manager::{RefreshOutcome, SessionManager};
pub use registry::{InitPhase, SessionEntry, SessionRegistry};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{CredentialRecord, CredentialStore};
