//! # Orderpass
//!
//! Concurrent customer, restaurant-operator and admin sessions for the
//! Orderpass ordering app.
//!
//! One process can be signed in as all three at once. Orderpass keeps their
//! credentials apart, restores them at startup, refreshes them before they
//! age out, attaches the right one to each request, logs out exactly the
//! session the backend rejected, and gates navigation on all of it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orderpass::prelude::*;
//!
//! # async fn run() -> Result<(), OrderpassError> {
//! let engine = SessionEngine::connect(EngineConfig::from_env()?)?;
//! engine.start().await;
//!
//! engine
//!     .manager()
//!     .login(SessionType::Customer, &LoginCredentials::new("ana@example.com", "hunter2"))
//!     .await?;
//!
//! let response = engine
//!     .client()
//!     .send(HttpRequest::get(engine.url("/api/orders")))
//!     .await?;
//! # let _ = response;
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
pub mod logging;

pub use config::EngineConfig;
pub use engine::{SessionEngine, SessionEngineBuilder};
pub use error::OrderpassError;

pub use orderpass_guard as guard;
pub use orderpass_protocol as protocol;
pub use orderpass_refresh as refresh;
pub use orderpass_session as session;
pub use orderpass_transport as transport;

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{EngineConfig, OrderpassError, SessionEngine};
    pub use orderpass_guard::{GuardDecision, RouteMap, RouteTable};
    pub use orderpass_protocol::{LoginCredentials, Role, SessionType, UserRecord};
    pub use orderpass_session::{FileStorage, MemoryStorage, SessionConfig};
    pub use orderpass_transport::{HttpClient, HttpRequest, HttpResponse};
}
