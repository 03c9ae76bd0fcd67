//! Guard outcomes and redirect locations.

use std::fmt;

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Sessions are still being restored. Render a neutral loading state
    /// and don't navigate.
    Loading,
    /// Render the route.
    Allow,
    /// Navigate elsewhere.
    Redirect(Redirect),
}

impl GuardDecision {
    pub fn redirect(to: impl Into<String>) -> Self {
        Self::Redirect(Redirect {
            to: to.into(),
            return_to: None,
        })
    }

    /// Redirect to `to`, remembering `attempted` so the login flow can send
    /// the user back afterwards.
    pub fn redirect_returning(to: impl Into<String>, attempted: impl Into<String>) -> Self {
        Self::Redirect(Redirect {
            to: to.into(),
            return_to: Some(attempted.into()),
        })
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The full redirect location, if this is a redirect.
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Redirect(redirect) => Some(redirect.location()),
            _ => None,
        }
    }
}

/// A redirect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    /// The path the user tried to open.
    pub return_to: Option<String>,
}

impl Redirect {
    /// `to`, plus `?redirect=<percent-encoded return path>` when there is one.
    pub fn location(&self) -> String {
        match &self.return_to {
            Some(path) => format!("{}?redirect={}", self.to, urlencoding::encode(path)),
            None => self.to.clone(),
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location())
    }
}
