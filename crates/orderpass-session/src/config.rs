//! Session configuration.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Maximum age of a stored credential before it is treated as expired,
/// whatever the backend would say about it: 7 days.
pub const ABSOLUTE_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for session behavior.
///
/// One lifetime ceiling is shared by boot hydration, `check_auth`, the
/// credential selector, and refresh, so every path agrees on when a
/// credential is dead.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a credential may live after it was issued. Default: 7 days.
    pub lifetime_ceiling: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_ceiling: ABSOLUTE_LIFETIME,
        }
    }
}

impl SessionConfig {
    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// A zero ceiling would expire every credential the moment it is
    /// written, so it falls back to [`ABSOLUTE_LIFETIME`].
    pub fn validated(mut self) -> Self {
        if self.lifetime_ceiling.is_zero() {
            warn!("lifetime_ceiling is zero, using the 7 day default");
            self.lifetime_ceiling = ABSOLUTE_LIFETIME;
        }
        self
    }

    /// Whether a credential issued at `issued_at` is past the ceiling at `now`.
    ///
    /// A timestamp in the future (clock moved backwards) counts as age zero.
    pub fn is_expired(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(issued_at).to_std() {
            Ok(age) => age > self.lifetime_ceiling,
            Err(_) => false,
        }
    }
}
