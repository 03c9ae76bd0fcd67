//! Path → guard resolution.

use orderpass_protocol::SessionType;
use tracing::trace;

use crate::routes::strip_query;
use crate::{
    GuardDecision, LoginPageGuard, ProtectedRoute, PublicRoute, RouteMap, RouteRequirement,
    SessionGate,
};

/// The guard wrapped around one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteGuard {
    Protected(ProtectedRoute),
    Public(PublicRoute),
    LoginPage(LoginPageGuard),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    /// The prefix itself and everything below it.
    Prefix(String),
}

impl Pattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            Pattern::Exact(p) => path == p,
            Pattern::Prefix(p) => {
                path == p
                    || path
                        .strip_prefix(p.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Ordered route rules. The first matching rule wins; unmatched paths are
/// open to everyone.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: RouteMap,
    rules: Vec<(Pattern, RouteGuard)>,
}

impl RouteTable {
    /// An empty table: every path is allowed.
    pub fn new(routes: RouteMap) -> Self {
        Self {
            routes,
            rules: Vec::new(),
        }
    }

    /// The rules of the ordering app.
    ///
    /// | Path                          | Guard                         |
    /// |-------------------------------|-------------------------------|
    /// | the three login routes        | login page of that type       |
    /// | `/signup`                     | public (customer)             |
    /// | `/restaurant/register`        | public (restaurant)           |
    /// | `/restaurant/...`             | restaurant, any role          |
    /// | `/admin/...`                  | admin, role `admin`           |
    /// | `/orders`, `/checkout`, `/profile` | customer                 |
    pub fn ordering_app(routes: RouteMap) -> Self {
        let logins: Vec<_> = SessionType::ALL
            .into_iter()
            .map(|kind| (routes.login_route(kind).to_string(), kind))
            .collect();

        let mut table = Self::new(routes);
        for (path, kind) in logins {
            table = table.exact(path, RouteGuard::LoginPage(LoginPageGuard::new(kind)));
        }
        table
            .exact("/signup", RouteGuard::Public(PublicRoute::new(SessionType::Customer)))
            .exact(
                "/restaurant/register",
                RouteGuard::Public(PublicRoute::new(SessionType::Restaurant)),
            )
            .prefix("/restaurant", protected(RouteRequirement::session(SessionType::Restaurant)))
            .prefix("/admin", protected(RouteRequirement::with_role(SessionType::Admin, "admin")))
            .prefix("/orders", protected(RouteRequirement::session(SessionType::Customer)))
            .prefix("/checkout", protected(RouteRequirement::session(SessionType::Customer)))
            .prefix("/profile", protected(RouteRequirement::session(SessionType::Customer)))
    }

    pub fn exact(mut self, path: impl Into<String>, guard: RouteGuard) -> Self {
        self.rules.push((Pattern::Exact(path.into()), guard));
        self
    }

    pub fn prefix(mut self, path: impl Into<String>, guard: RouteGuard) -> Self {
        let path = path.into().trim_end_matches('/').to_string();
        self.rules.push((Pattern::Prefix(path), guard));
        self
    }

    pub fn routes(&self) -> &RouteMap {
        &self.routes
    }

    /// The guard for `path`, ignoring its query string.
    pub fn guard_for(&self, path: &str) -> Option<&RouteGuard> {
        let bare = strip_query(path);
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(bare))
            .map(|(_, guard)| guard)
    }

    /// Runs the guard for `path`.
    ///
    /// Login routes log out an existing session of their type first, so
    /// this is async.
    pub async fn navigate(&self, gate: &impl SessionGate, path: &str) -> GuardDecision {
        let decision = match self.guard_for(path) {
            Some(RouteGuard::Protected(guard)) => guard.check(gate, &self.routes, path),
            Some(RouteGuard::Public(guard)) => guard.check(gate, &self.routes),
            Some(RouteGuard::LoginPage(guard)) => guard.enter(gate).await,
            None => GuardDecision::Allow,
        };
        trace!(path, ?decision, "navigation checked");
        decision
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::ordering_app(RouteMap::default())
    }
}

fn protected(requirement: RouteRequirement) -> RouteGuard {
    RouteGuard::Protected(ProtectedRoute::new(requirement))
}
