//! The three guards.
//!
//! Each one is a small value describing what a route needs, checked against
//! a [`SessionGate`]. While boot initialization is running every guard
//! answers [`GuardDecision::Loading`] so nothing redirects on half-restored
//! state.

use orderpass_protocol::{Role, SessionType};
use tracing::{debug, info};

use crate::{GuardDecision, RouteMap, SessionGate};

/// What a protected route needs: membership of a session type, and
/// optionally a specific role within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequirement {
    pub session: SessionType,
    pub role: Option<Role>,
}

impl RouteRequirement {
    /// Any authenticated session of `kind` passes.
    pub fn session(kind: SessionType) -> Self {
        Self {
            session: kind,
            role: None,
        }
    }

    /// Only sessions of `kind` whose user has exactly `role` pass.
    pub fn with_role(kind: SessionType, role: impl Into<String>) -> Self {
        Self {
            session: kind,
            role: Some(Role::new(role)),
        }
    }
}

/// Guards routes that need an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRoute {
    pub requirement: RouteRequirement,
}

impl ProtectedRoute {
    pub fn new(requirement: RouteRequirement) -> Self {
        Self { requirement }
    }

    /// Decides whether `path` may be shown.
    ///
    /// Unauthenticated → that session type's login route, carrying `path`.
    /// Wrong role → the landing route. Other user fields play no part.
    pub fn check(&self, gate: &impl SessionGate, routes: &RouteMap, path: &str) -> GuardDecision {
        if !gate.is_settled() {
            return GuardDecision::Loading;
        }
        let kind = self.requirement.session;
        let entry = gate.session(kind);
        if !entry.is_authenticated {
            debug!(session = %kind, path, "not authenticated, redirecting to login");
            return GuardDecision::redirect_returning(routes.login_route(kind), path);
        }
        if let Some(required) = &self.requirement.role {
            if entry.role() != Some(required) {
                debug!(session = %kind, path, %required, "role mismatch, redirecting to landing");
                return GuardDecision::redirect(routes.landing.clone());
            }
        }
        GuardDecision::Allow
    }
}

/// Guards public-only routes such as signup: an authenticated session of
/// the relevant type is sent to its home route instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicRoute {
    pub session: SessionType,
}

impl PublicRoute {
    pub fn new(kind: SessionType) -> Self {
        Self { session: kind }
    }

    pub fn check(&self, gate: &impl SessionGate, routes: &RouteMap) -> GuardDecision {
        if !gate.is_settled() {
            return GuardDecision::Loading;
        }
        if gate.session(self.session).is_authenticated {
            return GuardDecision::redirect(routes.home_route(self.session));
        }
        GuardDecision::Allow
    }
}

/// Guards a login route.
///
/// Opening a login page counts as asking to sign in again: an existing
/// session of that type is logged out before the form is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPageGuard {
    pub session: SessionType,
}

impl LoginPageGuard {
    pub fn new(kind: SessionType) -> Self {
        Self { session: kind }
    }

    /// Resolves once any existing session is logged out.
    pub async fn enter(&self, gate: &impl SessionGate) -> GuardDecision {
        if !gate.is_settled() {
            return GuardDecision::Loading;
        }
        if gate.session(self.session).is_authenticated {
            info!(session = %self.session, "login page opened over a live session, logging it out");
            gate.logout(self.session).await;
        }
        GuardDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use orderpass_protocol::{UserId, UserRecord};
    use orderpass_session::SessionEntry;
    use parking_lot::Mutex;

    use super::*;

    /// Gate backed by a plain array of entries.
    struct FakeGate {
        settled: bool,
        entries: Mutex<[SessionEntry; 3]>,
        logouts: Mutex<Vec<SessionType>>,
    }

    impl FakeGate {
        fn settled() -> Self {
            Self {
                settled: true,
                entries: Mutex::new(Default::default()),
                logouts: Mutex::new(Vec::new()),
            }
        }

        fn pending() -> Self {
            Self {
                settled: false,
                ..Self::settled()
            }
        }

        fn with(self, kind: SessionType, role: &str, restaurant_name: Option<&str>) -> Self {
            self.entries.lock()[kind.index()] = SessionEntry {
                user: Some(UserRecord {
                    id: UserId::new("7"),
                    email: "u@orderpass.test".into(),
                    role: Role::new(role),
                    display_name: None,
                    restaurant_name: restaurant_name.map(str::to_owned),
                }),
                is_authenticated: true,
            };
            self
        }
    }

    impl SessionGate for FakeGate {
        fn is_settled(&self) -> bool {
            self.settled
        }

        fn session(&self, kind: SessionType) -> SessionEntry {
            self.entries.lock()[kind.index()].clone()
        }

        fn logout(&self, kind: SessionType) -> impl Future<Output = ()> + Send {
            self.logouts.lock().push(kind);
            self.entries.lock()[kind.index()] = SessionEntry::logged_out();
            std::future::ready(())
        }
    }

    fn routes() -> RouteMap {
        RouteMap::default()
    }

    // =====================================================================
    // ProtectedRoute
    // =====================================================================

    #[test]
    fn test_pending_initialization_is_loading() {
        let guard = ProtectedRoute::new(RouteRequirement::session(SessionType::Restaurant));
        let gate = FakeGate::pending();

        assert_eq!(guard.check(&gate, &routes(), "/restaurant/orders"), GuardDecision::Loading);
    }

    #[test]
    fn test_restaurant_without_role_requirement_allows_any_role() {
        let guard = ProtectedRoute::new(RouteRequirement::session(SessionType::Restaurant));
        for role in ["owner", "staff", "restaurant", "something-new"] {
            let gate = FakeGate::settled().with(SessionType::Restaurant, role, None);
            assert!(guard.check(&gate, &routes(), "/restaurant/orders").is_allowed(), "{role}");
        }
    }

    #[test]
    fn test_unauthenticated_restaurant_redirects_with_path() {
        let guard = ProtectedRoute::new(RouteRequirement::session(SessionType::Restaurant));
        let gate = FakeGate::settled().with(SessionType::Customer, "customer", None);

        let decision = guard.check(&gate, &routes(), "/restaurant/menu");

        assert_eq!(
            decision,
            GuardDecision::redirect_returning("/restaurant/login", "/restaurant/menu")
        );
    }

    #[test]
    fn test_role_mismatch_redirects_to_landing() {
        let guard = ProtectedRoute::new(RouteRequirement::with_role(SessionType::Admin, "superadmin"));
        let gate = FakeGate::settled().with(SessionType::Admin, "support", None);

        assert_eq!(guard.check(&gate, &routes(), "/admin/users"), GuardDecision::redirect("/"));
    }

    #[test]
    fn test_restaurant_name_does_not_bypass_role_check() {
        let guard = ProtectedRoute::new(RouteRequirement::with_role(SessionType::Restaurant, "owner"));
        let gate = FakeGate::settled().with(SessionType::Restaurant, "staff", Some("Luigi's"));

        assert_eq!(
            guard.check(&gate, &routes(), "/restaurant/settings"),
            GuardDecision::redirect("/")
        );
    }

    #[test]
    fn test_matching_role_allows() {
        let guard = ProtectedRoute::new(RouteRequirement::with_role(SessionType::Admin, "admin"));
        let gate = FakeGate::settled().with(SessionType::Admin, "admin", None);

        assert!(guard.check(&gate, &routes(), "/admin").is_allowed());
    }

    // =====================================================================
    // PublicRoute
    // =====================================================================

    #[test]
    fn test_public_route_redirects_authenticated_session_home() {
        let guard = PublicRoute::new(SessionType::Restaurant);
        let gate = FakeGate::settled().with(SessionType::Restaurant, "owner", None);

        assert_eq!(guard.check(&gate, &routes()), GuardDecision::redirect("/restaurant/dashboard"));
    }

    #[test]
    fn test_public_route_ignores_other_session_types() {
        let guard = PublicRoute::new(SessionType::Customer);
        let gate = FakeGate::settled().with(SessionType::Admin, "admin", None);

        assert!(guard.check(&gate, &routes()).is_allowed());
        assert_eq!(PublicRoute::new(SessionType::Customer).check(&FakeGate::pending(), &routes()), GuardDecision::Loading);
    }

    // =====================================================================
    // LoginPageGuard
    // =====================================================================

    #[tokio::test]
    async fn test_admin_login_page_logs_out_admin() {
        let gate = FakeGate::settled()
            .with(SessionType::Admin, "admin", None)
            .with(SessionType::Customer, "customer", None);

        let decision = LoginPageGuard::new(SessionType::Admin).enter(&gate).await;

        assert!(decision.is_allowed());
        assert_eq!(*gate.logouts.lock(), vec![SessionType::Admin]);
        assert!(!gate.session(SessionType::Admin).is_authenticated);
        assert!(gate.session(SessionType::Customer).is_authenticated);
    }

    #[tokio::test]
    async fn test_login_page_without_session_does_nothing() {
        let gate = FakeGate::settled();

        LoginPageGuard::new(SessionType::Restaurant).enter(&gate).await;

        assert!(gate.logouts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_login_page_waits_for_initialization() {
        let gate = FakeGate::pending().with(SessionType::Admin, "admin", None);

        let decision = LoginPageGuard::new(SessionType::Admin).enter(&gate).await;

        assert_eq!(decision, GuardDecision::Loading);
        assert!(gate.logouts.lock().is_empty());
    }
}
