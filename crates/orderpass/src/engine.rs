//! `SessionEngine` builder and lifecycle.
//!
//! Ties the layers together: transport → session manager → transport hook,
//! refresh supervisor and route guards.

use std::sync::Arc;

use orderpass_guard::{GuardDecision, RouteTable};
use orderpass_refresh::{RefreshConfig, RefreshCounts, RefreshScheduler, SupervisorHandle};
use orderpass_session::{
    FileStorage, HttpBackend, InitReport, KeyValueStorage, SessionClient, SessionManager,
};
use orderpass_transport::{HttpClient, ReqwestClient};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{EngineConfig, OrderpassError};

/// Builder for a [`SessionEngine`].
///
/// # Example
///
/// ```rust,ignore
/// let engine = SessionEngine::builder()
///     .config(config)
///     .build(my_http_client, MemoryStorage::new());
/// engine.start().await;
/// ```
pub struct SessionEngineBuilder {
    config: EngineConfig,
    routes: Option<RouteTable>,
}

impl SessionEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            routes: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the ordering-app route table built from `config.routes`.
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Wires the engine over `client` and `storage`.
    ///
    /// Nothing runs until [`SessionEngine::start`].
    pub fn build<C, S>(self, client: C, storage: S) -> SessionEngine<C, S>
    where
        C: HttpClient + Clone,
        S: KeyValueStorage,
    {
        let config = self.config.validated();
        let backend = HttpBackend::new(client.clone(), config.base_url.clone())
            .with_endpoints(config.endpoints.clone());
        let manager = Arc::new(SessionManager::new(backend, storage, config.session.clone()));
        let routes = self
            .routes
            .unwrap_or_else(|| RouteTable::ordering_app(config.routes.clone()));

        debug!(base_url = %config.base_url, "session engine built");
        SessionEngine {
            base_url: config.base_url,
            client: SessionClient::new(client, Arc::clone(&manager)),
            manager,
            routes,
            refresh: config.refresh,
            supervisor: Mutex::new(None),
        }
    }
}

impl Default for SessionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

type Manager<C, S> = SessionManager<HttpBackend<C>, S>;

/// All session machinery for one application instance.
pub struct SessionEngine<C, S> {
    base_url: String,
    manager: Arc<Manager<C, S>>,
    client: SessionClient<C, HttpBackend<C>, S>,
    routes: RouteTable,
    refresh: RefreshConfig,
    supervisor: Mutex<Option<SupervisorHandle>>,
}

impl SessionEngine<ReqwestClient, FileStorage> {
    pub fn builder() -> SessionEngineBuilder {
        SessionEngineBuilder::new()
    }

    /// A `reqwest` client talking to `config.base_url`, with credentials
    /// kept in a file at `config.storage_path`.
    ///
    /// # Errors
    /// - [`OrderpassError::Transport`]: the HTTP client could not be built.
    /// - [`OrderpassError::Storage`]: the storage file exists but can't be read.
    pub fn connect(config: EngineConfig) -> Result<Self, OrderpassError> {
        let client = ReqwestClient::new(config.request_timeout)?;
        let storage = FileStorage::open(&config.storage_path)?;
        Ok(SessionEngineBuilder::new().config(config).build(client, storage))
    }
}

impl<C, S> SessionEngine<C, S>
where
    C: HttpClient + Clone,
    S: KeyValueStorage,
{
    /// Restores stored sessions, then starts refresh supervision.
    ///
    /// Idempotent: a second call returns an empty report and leaves the
    /// running supervisor alone.
    pub async fn start(&self) -> InitReport {
        let report = self.manager.initialize().await;

        let mut supervisor = self.supervisor.lock();
        if supervisor.is_none() {
            let scheduler = RefreshScheduler::new(Arc::clone(&self.manager), self.refresh.clone());
            *supervisor = Some(scheduler.supervise(self.manager.subscribe()));
            info!(
                authenticated = ?self.manager.authenticated(),
                "session engine started"
            );
        }
        report
    }

    /// Stops refresh timers. Sessions and stored credentials are kept.
    pub async fn shutdown(&self) {
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
            info!("session engine stopped");
        }
    }

    pub fn manager(&self) -> &Arc<Manager<C, S>> {
        &self.manager
    }

    /// The HTTP client application code should send requests through.
    pub fn client(&self) -> &SessionClient<C, HttpBackend<C>, S> {
        &self.client
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// `path` resolved against the backend origin.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Runs the guard for `path`.
    pub async fn navigate(&self, path: &str) -> GuardDecision {
        self.routes.navigate(&*self.manager, path).await
    }

    /// Refresh counters, once started.
    pub fn refresh_stats(&self) -> Option<RefreshCounts> {
        self.supervisor.lock().as_ref().map(SupervisorHandle::stats)
    }
}
