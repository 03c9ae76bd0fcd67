//! Where each session type logs in and lands.
//!
//! [`RouteMap`] holds the login and home route per session type plus the
//! landing route used when a role check fails.

use orderpass_protocol::SessionType;

/// Where each session type logs in and where it lands afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMap {
    pub customer_login: String,
    pub restaurant_login: String,
    pub admin_login: String,
    /// Default landing route, used when a role check fails.
    pub landing: String,
    pub customer_home: String,
    pub restaurant_home: String,
    pub admin_home: String,
}

impl Default for RouteMap {
    fn default() -> Self {
        Self {
            customer_login: "/login".into(),
            restaurant_login: "/restaurant/login".into(),
            admin_login: "/admin/login".into(),
            landing: "/".into(),
            customer_home: "/".into(),
            restaurant_home: "/restaurant/dashboard".into(),
            admin_home: "/admin/dashboard".into(),
        }
    }
}

impl RouteMap {
    pub fn login_route(&self, kind: SessionType) -> &str {
        match kind {
            SessionType::Customer => &self.customer_login,
            SessionType::Restaurant => &self.restaurant_login,
            SessionType::Admin => &self.admin_login,
        }
    }

    /// Default destination for an authenticated session of `kind`.
    pub fn home_route(&self, kind: SessionType) -> &str {
        match kind {
            SessionType::Customer => &self.customer_home,
            SessionType::Restaurant => &self.restaurant_home,
            SessionType::Admin => &self.admin_home,
        }
    }

    /// The session type whose login route `path` is.
    pub fn session_for_login_route(&self, path: &str) -> Option<SessionType> {
        let path = strip_query(path);
        SessionType::ALL
            .into_iter()
            .find(|kind| self.login_route(*kind) == path)
    }
}

/// `path` without its query string or fragment.
pub(crate) fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}
