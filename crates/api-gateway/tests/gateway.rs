//! Router-level integration tests driven through the full middleware
//! chain and tower's `Service` trait, rather than calling handlers
//! directly, so a regression in routing or layering shows up here.

use std::sync::Arc;

use api_gateway::{build_router, AppState, RateLimitConfig};
use auth::TokenIssuer;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use endpoint_manager::EndpointManager;
use persistence::{SqliteStore, Store};
use pool_manager::PoolManager;
use repository_analyzer::RepositoryAnalyzer;
use shared_bus::{EndpointEventBus, EventPublisher};
use state_manager::{StateManager, StateManagerConfig};
use sqlx::sqlite::SqlitePoolOptions;
use sync_coordinator::WatchdogConfig;
use tower::ServiceExt;

async fn test_state() -> AppState {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    let store = SqliteStore::new(pool);
    store.run_migrations().await.unwrap();
    let store: Arc<dyn Store> = Arc::new(store);

    let tokens = Arc::new(TokenIssuer::new(b"gateway-test-secret-at-least-32b".to_vec(), 3600).with_admin_tokens(["admin-secret".to_string()]));
    let events = Arc::new(EndpointEventBus::new());
    let publisher: Arc<dyn EventPublisher> = events.clone();
    let sync = sync_coordinator::spawn(store.clone(), publisher, WatchdogConfig::default());

    AppState {
        store: store.clone(),
        tokens: tokens.clone(),
        endpoints: Arc::new(EndpointManager::new(store.clone(), tokens.clone())),
        pools: Arc::new(PoolManager::new(store.clone())),
        states: Arc::new(StateManager::new(store.clone(), StateManagerConfig::default())),
        analyzer: Arc::new(RepositoryAnalyzer::new(store.clone())),
        sync,
        events,
    }
}

#[tokio::test]
async fn register_round_trip_returns_fresh_token_on_repeat() {
    let app = build_router(test_state().await, &[], RateLimitConfig::default(), true);

    let body = r#"{"name":"alpha","hostname":"h1"}"#;
    let request = Request::post("/api/endpoints/register")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let first: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let id1 = first["endpoint"]["id"].clone();

    let request = Request::post("/api/endpoints/register")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let second: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(id1, second["endpoint"]["id"]);
    assert_ne!(first["auth_token"], second["auth_token"]);
}

#[tokio::test]
async fn status_update_without_bearer_token_is_rejected() {
    let app = build_router(test_state().await, &[], RateLimitConfig::default(), true);

    let request = Request::put(format!("/api/endpoints/{}/status", shared_types::EndpointId::new()))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"status":"in_sync"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_ready_reports_200_when_persistence_is_reachable() {
    let app = build_router(test_state().await, &[], RateLimitConfig::default(), true);

    let request = Request::get("/health/ready").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
