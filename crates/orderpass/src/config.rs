//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use orderpass_guard::RouteMap;
use orderpass_refresh::RefreshConfig;
use orderpass_session::{Endpoints, SessionConfig};

use crate::OrderpassError;

pub const BASE_URL_ENV: &str = "ORDERPASS_BASE_URL";
pub const STORAGE_PATH_ENV: &str = "ORDERPASS_STORAGE_PATH";
pub const REFRESH_INTERVAL_ENV: &str = "ORDERPASS_REFRESH_INTERVAL_SECS";
pub const LIFETIME_ENV: &str = "ORDERPASS_LIFETIME_SECS";

/// Everything needed to build a [`SessionEngine`](crate::SessionEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend origin, e.g. `https://api.orderpass.test`.
    pub base_url: String,
    /// Where [`FileStorage`](orderpass_session::FileStorage) keeps credentials.
    pub storage_path: PathBuf,
    pub request_timeout: Duration,
    pub session: SessionConfig,
    pub refresh: RefreshConfig,
    pub endpoints: Endpoints,
    pub routes: RouteMap,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            storage_path: PathBuf::from("orderpass-sessions.json"),
            request_timeout: Duration::from_secs(30),
            session: SessionConfig::default(),
            refresh: RefreshConfig::default(),
            endpoints: Endpoints::default(),
            routes: RouteMap::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `ORDERPASS_*` environment variables.
    ///
    /// # Errors
    /// [`OrderpassError::Config`] if a numeric variable doesn't parse.
    pub fn from_env() -> Result<Self, OrderpassError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OrderpassError> {
        let mut config = Self::default();
        if let Some(url) = lookup(BASE_URL_ENV) {
            config.base_url = url;
        }
        if let Some(path) = lookup(STORAGE_PATH_ENV) {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup(REFRESH_INTERVAL_ENV) {
            config.refresh.interval = parse_secs(REFRESH_INTERVAL_ENV, &secs)?;
        }
        if let Some(secs) = lookup(LIFETIME_ENV) {
            config.session.lifetime_ceiling = parse_secs(LIFETIME_ENV, &secs)?;
        }
        Ok(config.validated())
    }

    /// Fix inconsistent values so the config is safe to use.
    ///
    /// The refresh interval is validated against the configured credential
    /// lifetime, so it always stays below it.
    pub fn validated(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self.session = self.session.validated();
        self.refresh.lifetime = self.session.lifetime_ceiling;
        self.refresh = self.refresh.validated();
        self
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, OrderpassError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| OrderpassError::Config(format!("{key}={raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.session.lifetime_ceiling, Duration::from_secs(604_800));
        assert_eq!(config.refresh.interval, Duration::from_secs(432_000));
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (BASE_URL_ENV, "https://api.orderpass.test/"),
            (STORAGE_PATH_ENV, "/tmp/op.json"),
            (REFRESH_INTERVAL_ENV, "3600"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://api.orderpass.test");
        assert_eq!(config.storage_path, PathBuf::from("/tmp/op.json"));
        assert_eq!(config.refresh.interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_unparsable_number_is_config_error() {
        let err = EngineConfig::from_lookup(lookup(&[(LIFETIME_ENV, "a week")])).unwrap_err();
        assert!(matches!(err, OrderpassError::Config(ref msg) if msg.contains(LIFETIME_ENV)));
    }

    #[test]
    fn test_long_lifetime_keeps_long_refresh_interval() {
        let config = EngineConfig::from_lookup(lookup(&[
            (LIFETIME_ENV, "2592000"),
            (REFRESH_INTERVAL_ENV, "1728000"),
        ]))
        .unwrap();
        assert_eq!(config.refresh.lifetime, Duration::from_secs(2_592_000));
        assert_eq!(config.refresh.interval, Duration::from_secs(1_728_000));
    }

    #[test]
    fn test_refresh_kept_below_short_lifetime() {
        let config = EngineConfig::from_lookup(lookup(&[(LIFETIME_ENV, "7000")])).unwrap();
        assert_eq!(config.session.lifetime_ceiling, Duration::from_secs(7000));
        assert_eq!(config.refresh.interval, Duration::from_secs(5000));
    }
}
