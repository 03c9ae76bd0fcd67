//! Navigation guards for Orderpass.
//!
//! Gates every route on session state. Guards never talk to the backend;
//! they read the session registry (through [`SessionGate`]) and decide.
//!
//! # Key types
//!
//! - [`RouteRequirement`]: which session type, and optionally which role
//!   within it, a route needs
//! - [`GuardDecision`]: `Loading`, `Allow` or `Redirect`
//! - [`ProtectedRoute`], [`PublicRoute`], [`LoginPageGuard`]: the three guards
//! - [`RouteMap`]: login and landing routes per session type
//! - [`RouteTable`]: path → guard, with `navigate(path)`

#![allow(async_fn_in_trait)]

mod decision;
mod gate;
mod guards;
mod routes;
mod table;

pub use decision::{GuardDecision, Redirect};
pub use gate::SessionGate;
pub use guards::{LoginPageGuard, ProtectedRoute, PublicRoute, RouteRequirement};
pub use routes::RouteMap;
pub use table::{RouteGuard, RouteTable};
