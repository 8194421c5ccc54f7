//! Shared harness: an in-memory-sqlite-backed router plus small JSON
//! request helpers used by every scenario module.

use std::sync::Arc;

use api_gateway::{build_router, AppState, RateLimitConfig};
use auth::TokenIssuer;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use endpoint_manager::EndpointManager;
use persistence::{SqliteStore, Store};
use pool_manager::PoolManager;
use repository_analyzer::RepositoryAnalyzer;
use shared_bus::{EndpointEventBus, EventPublisher};
use sqlx::sqlite::SqlitePoolOptions;
use state_manager::{StateManager, StateManagerConfig};
use sync_coordinator::WatchdogConfig;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-test-token";

pub async fn fresh_router() -> Router {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.expect("in-memory pool");
    let store = SqliteStore::new(pool);
    store.run_migrations().await.expect("migrations apply");
    let store: Arc<dyn Store> = Arc::new(store);

    let tokens = Arc::new(
        TokenIssuer::new(b"scenario-test-secret-at-least-32b".to_vec(), 3600).with_admin_tokens([ADMIN_TOKEN.to_string()]),
    );
    let events = Arc::new(EndpointEventBus::new());
    let publisher: Arc<dyn EventPublisher> = events.clone();
    let sync = sync_coordinator::spawn(store.clone(), publisher, WatchdogConfig::default());

    let state = AppState {
        store: store.clone(),
        tokens: tokens.clone(),
        endpoints: Arc::new(EndpointManager::new(store.clone(), tokens.clone())),
        pools: Arc::new(PoolManager::new(store.clone())),
        states: Arc::new(StateManager::new(store.clone(), StateManagerConfig::default())),
        analyzer: Arc::new(RepositoryAnalyzer::new(store.clone())),
        sync,
        events,
    };

    build_router(state, &[], RateLimitConfig::default(), true)
}

pub async fn send_json(router: &Router, method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

pub async fn get(router: &Router, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
    send_json(router, "GET", uri, token, serde_json::Value::Null).await
}

pub async fn register(router: &Router, name: &str, hostname: &str) -> (String, String) {
    let (status, body) = send_json(router, "POST", "/api/endpoints/register", None, serde_json::json!({"name": name, "hostname": hostname})).await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");
    (body["endpoint"]["id"].as_str().unwrap().to_string(), body["auth_token"].as_str().unwrap().to_string())
}
