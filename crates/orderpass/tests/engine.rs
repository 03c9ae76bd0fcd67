//! End-to-end tests: engine over an in-process fake of the backend API.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use orderpass::prelude::*;
use orderpass::refresh::RefreshConfig;
use orderpass::session::{CredentialRecord, CredentialStore, KeyValueStorage};
use orderpass::transport::{CredentialPolicy, Method, TransportError};
use serde_json::json;

// =========================================================================
// Fake backend
// =========================================================================

const BASE: &str = "http://api.orderpass.test";

#[derive(Default)]
struct ApiState {
    /// Live tokens and the session type and role they belong to.
    tokens: HashMap<String, (SessionType, String)>,
    /// Tokens the API answers with 401 TOKEN_EXPIRED on data routes.
    expired: HashSet<String>,
    issued: u64,
    refreshes: Vec<String>,
    logouts: Vec<String>,
    seen_bearers: Vec<Option<String>>,
}

/// Speaks the auth endpoints of all three session types plus
/// `GET /api/orders`.
#[derive(Clone, Default)]
struct FakeApi {
    state: Arc<Mutex<ApiState>>,
}

impl FakeApi {
    fn accept(&self, token: &str, kind: SessionType, role: &str) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(token.to_string(), (kind, role.to_string()));
    }

    fn expire(&self, token: &str) {
        self.state.lock().unwrap().expired.insert(token.to_string());
    }

    fn last_bearer(&self) -> Option<String> {
        self.state.lock().unwrap().seen_bearers.last().cloned().flatten()
    }

    fn refreshes(&self) -> usize {
        self.state.lock().unwrap().refreshes.len()
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let mut state = self.state.lock().unwrap();
        let bearer = request.bearer_token().map(str::to_owned);
        state.seen_bearers.push(bearer.clone());

        let path = request.url.strip_prefix(BASE).unwrap_or(&request.url).to_string();
        if path == "/api/orders" {
            return match bearer {
                Some(t) if state.expired.contains(&t) => {
                    json_response(401, json!({"code": "TOKEN_EXPIRED", "message": "expired"}))
                }
                Some(t) if state.tokens.contains_key(&t) => json_response(200, json!({"orders": []})),
                _ => json_response(401, json!({"code": "NO_TOKEN"})),
            };
        }

        let (prefix, action) = path.rsplit_once('/').unwrap();
        let kind = match prefix {
            "/api/customers" => SessionType::Customer,
            "/api/restaurants" => SessionType::Restaurant,
            "/api/admin" => SessionType::Admin,
            _ => return json_response(404, json!({"message": "not found"})),
        };

        match (request.method, action) {
            (Method::Post, "login") => {
                let body: serde_json::Value =
                    serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap();
                if body["password"] != "secret" {
                    return json_response(
                        401,
                        json!({"code": "INVALID_CREDENTIALS", "message": "Wrong email or password"}),
                    );
                }
                state.issued += 1;
                let token = format!("{kind}-{}", state.issued);
                state.tokens.insert(token.clone(), (kind, kind.as_str().to_string()));
                json_response(200, json!({"token": token, "user": user_json(kind, kind.as_str())}))
            }
            (Method::Get, "me") => match bearer.and_then(|t| state.tokens.get(&t).cloned()) {
                Some((owner, role)) if owner == kind => {
                    json_response(200, json!({"user": user_json(kind, &role)}))
                }
                _ => json_response(401, json!({"code": "INVALID_TOKEN"})),
            },
            (Method::Post, "refresh-token") => match bearer {
                Some(t) if state.tokens.contains_key(&t) => {
                    let entry = state.tokens[&t].clone();
                    state.issued += 1;
                    let renewed = format!("{t}-r{}", state.issued);
                    state.tokens.insert(renewed.clone(), entry);
                    state.refreshes.push(t);
                    json_response(200, json!({"token": renewed}))
                }
                _ => json_response(401, json!({"code": "INVALID_TOKEN"})),
            },
            (Method::Post, "logout") => {
                if let Some(t) = bearer {
                    state.tokens.remove(&t);
                    state.logouts.push(t);
                }
                HttpResponse::new(204, Vec::new())
            }
            _ => json_response(404, json!({"message": "not found"})),
        }
    }
}

impl HttpClient for FakeApi {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Ok(self.route(&request))
    }
}

fn user_json(kind: SessionType, role: &str) -> serde_json::Value {
    json!({"id": 1, "email": format!("{kind}@orderpass.test"), "role": role})
}

fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, serde_json::to_vec(&body).unwrap())
}

// =========================================================================
// Helpers
// =========================================================================

type Engine = SessionEngine<FakeApi, Arc<MemoryStorage>>;

fn engine_with(api: &FakeApi, storage: &Arc<MemoryStorage>) -> Engine {
    let config = EngineConfig {
        base_url: BASE.to_string(),
        refresh: RefreshConfig {
            initial_jitter: Duration::ZERO,
            ..RefreshConfig::default()
        },
        ..EngineConfig::default()
    };
    SessionEngine::builder()
        .config(config)
        .build(api.clone(), Arc::clone(storage))
}

/// Puts a credential of the given age into storage, as a previous run would
/// have left it, and makes the API accept it.
fn seed(api: &FakeApi, storage: &Arc<MemoryStorage>, kind: SessionType, age: TimeDelta) -> String {
    let token = format!("{kind}-from-last-run");
    CredentialStore::new(Arc::clone(storage))
        .save(
            kind,
            &CredentialRecord {
                token: token.clone(),
                issued_at: Utc::now() - age,
                cached_user: None,
            },
        )
        .unwrap();
    api.accept(&token, kind, kind.as_str());
    token
}

fn creds(password: &str) -> LoginCredentials {
    LoginCredentials::new("someone@orderpass.test", password)
}

// =========================================================================
// Boot
// =========================================================================

#[tokio::test]
async fn test_only_customer_stored_one_day_old() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    seed(&api, &storage, SessionType::Customer, TimeDelta::days(1));
    let engine = engine_with(&api, &storage);

    let report = engine.start().await;

    assert!(report.hydrated.contains(SessionType::Customer));
    let manager = engine.manager();
    assert!(manager.is_authenticated(SessionType::Customer));
    assert!(!manager.is_authenticated(SessionType::Restaurant));
    assert!(!manager.is_authenticated(SessionType::Admin));
    engine.shutdown().await;
}

#[tokio::test]
async fn test_admin_stored_eight_days_old_is_cleared() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    seed(&api, &storage, SessionType::Admin, TimeDelta::days(8));
    let engine = engine_with(&api, &storage);

    engine.start().await;

    assert!(!engine.manager().is_authenticated(SessionType::Admin));
    assert_eq!(storage.get("admin.token").unwrap(), None);
    assert!(api.last_bearer().is_none(), "the stale token was never sent");
    engine.shutdown().await;
}

#[tokio::test]
async fn test_hydrated_sessions_resolve_to_restaurant() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    seed(&api, &storage, SessionType::Customer, TimeDelta::hours(2));
    let restaurant = seed(&api, &storage, SessionType::Restaurant, TimeDelta::hours(2));
    let engine = engine_with(&api, &storage);
    engine.start().await;

    engine
        .client()
        .send(HttpRequest::get(engine.url("/api/orders")))
        .await
        .unwrap();

    assert_eq!(engine.manager().active_session(), Some(SessionType::Restaurant));
    assert_eq!(api.last_bearer(), Some(restaurant));
    engine.shutdown().await;
}

// =========================================================================
// Login / logout
// =========================================================================

#[tokio::test]
async fn test_logins_are_isolated() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);
    engine.start().await;
    let manager = engine.manager();

    manager.login(SessionType::Admin, &creds("secret")).await.unwrap();
    let admin_before = manager.session(SessionType::Admin);
    let admin_token = storage.get("admin.token").unwrap();

    manager.login(SessionType::Customer, &creds("secret")).await.unwrap();

    assert_eq!(manager.session(SessionType::Admin), admin_before);
    assert_eq!(storage.get("admin.token").unwrap(), admin_token);
    assert!(!manager.is_authenticated(SessionType::Restaurant));
    engine.shutdown().await;
}

#[tokio::test]
async fn test_rejected_login_surfaces_backend_message() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);
    engine.start().await;

    let err = engine
        .manager()
        .login(SessionType::Restaurant, &creds("guess"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "restaurant login rejected: Wrong email or password");
    engine.shutdown().await;
}

#[tokio::test]
async fn test_logout_tells_backend_and_clears_storage() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);
    engine.start().await;
    engine.manager().login(SessionType::Customer, &creds("secret")).await.unwrap();
    let token = storage.get("customer.token").unwrap().unwrap();

    engine.manager().logout(SessionType::Customer).await;

    assert_eq!(api.state.lock().unwrap().logouts, vec![token]);
    assert!(storage.is_empty());
    engine.shutdown().await;
}

// =========================================================================
// Requests and invalidation
// =========================================================================

#[tokio::test]
async fn test_401_with_admin_token_logs_out_only_admin() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);
    engine.start().await;
    let manager = engine.manager();
    manager.login(SessionType::Customer, &creds("secret")).await.unwrap();
    manager.login(SessionType::Admin, &creds("secret")).await.unwrap();
    api.expire(&storage.get("admin.token").unwrap().unwrap());

    let response = engine
        .client()
        .send(HttpRequest::get(engine.url("/api/orders")).for_session(SessionType::Admin))
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert!(!manager.is_authenticated(SessionType::Admin));
    assert!(manager.is_authenticated(SessionType::Customer));
    assert_eq!(manager.active_session(), Some(SessionType::Customer));

    assert_eq!(
        engine.navigate("/admin/users").await.location().as_deref(),
        Some("/admin/login?redirect=%2Fadmin%2Fusers")
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn test_401_for_stale_token_changes_nothing() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);
    engine.start().await;
    engine.manager().login(SessionType::Customer, &creds("secret")).await.unwrap();
    api.accept("old-tab-token", SessionType::Customer, "customer");
    api.expire("old-tab-token");
    let before = storage.snapshot();

    engine
        .client()
        .send(HttpRequest::get(engine.url("/api/orders")).with_bearer("old-tab-token"))
        .await
        .unwrap();

    assert!(engine.manager().is_authenticated(SessionType::Customer));
    assert_eq!(storage.snapshot(), before);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_declared_session_beats_active_pointer() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);
    engine.start().await;
    let manager = engine.manager();
    manager.login(SessionType::Customer, &creds("secret")).await.unwrap();
    manager.login(SessionType::Restaurant, &creds("secret")).await.unwrap();

    let mut request = HttpRequest::get(engine.url("/api/orders"));
    request.credential = CredentialPolicy::Session(SessionType::Customer);
    engine.client().send(request).await.unwrap();

    assert_eq!(api.last_bearer(), storage.get("customer.token").unwrap());
    engine.shutdown().await;
}

// =========================================================================
// Guards
// =========================================================================

#[tokio::test]
async fn test_navigation_through_engine() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);

    assert_eq!(engine.navigate("/orders").await, GuardDecision::Loading);

    engine.start().await;
    assert_eq!(
        engine.navigate("/restaurant/orders").await.location().as_deref(),
        Some("/restaurant/login?redirect=%2Frestaurant%2Forders")
    );

    engine.manager().login(SessionType::Admin, &creds("secret")).await.unwrap();
    assert!(engine.navigate("/admin/dashboard").await.is_allowed());

    engine.navigate("/admin/login").await;
    assert!(!engine.manager().is_authenticated(SessionType::Admin));
    engine.shutdown().await;
}

// =========================================================================
// Refresh
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_rotates_token_and_keeps_identity() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);
    engine.start().await;
    let manager = engine.manager();
    manager.login(SessionType::Restaurant, &creds("secret")).await.unwrap();
    let before = manager.session(SessionType::Restaurant);
    let old_token = storage.get("restaurant.token").unwrap();

    tokio::time::sleep(Duration::from_secs(5 * 24 * 60 * 60 + 1)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    assert_eq!(api.refreshes(), 1);
    assert_ne!(storage.get("restaurant.token").unwrap(), old_token);
    assert_eq!(manager.session(SessionType::Restaurant), before);
    assert_eq!(engine.refresh_stats().map(|s| s.succeeded), Some(1));
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_logout_stops_refresh() {
    let (api, storage) = (FakeApi::default(), Arc::new(MemoryStorage::new()));
    let engine = engine_with(&api, &storage);
    engine.start().await;
    engine.manager().login(SessionType::Customer, &creds("secret")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    engine.manager().logout(SessionType::Customer).await;
    tokio::time::sleep(Duration::from_secs(6 * 24 * 60 * 60)).await;

    assert_eq!(api.refreshes(), 0);
    engine.shutdown().await;
}
