//! Package-sync helper routes (§6 "Package sync helpers").
//!
//! These compose the endpoint, pool, and repository components directly;
//! unlike the other route groups there is no dedicated backend crate for
//! this surface.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shared_types::{CoordinatorError, EndpointId, PoolId, StateId, SyncStatus};

use crate::auth_extract::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
struct PackageCount {
    pool_id: PoolId,
    package_count: usize,
}

async fn package_count(State(app): State<AppState>, Path(pool_id): Path<PoolId>) -> Result<Json<PackageCount>, ApiError> {
    let matrix = app.analyzer.availability_matrix(pool_id).await?;
    Ok(Json(PackageCount { pool_id, package_count: matrix.len() }))
}

#[derive(Serialize)]
struct EndpointSyncStatus {
    endpoint_id: EndpointId,
    pool_id: Option<PoolId>,
    sync_status: SyncStatus,
    target_state_id: Option<StateId>,
}

async fn sync_status(
    State(app): State<AppState>,
    Path(endpoint_id): Path<EndpointId>,
    Caller(identity): Caller,
) -> Result<Json<EndpointSyncStatus>, ApiError> {
    if !identity.is_endpoint(endpoint_id) {
        return Err(CoordinatorError::authorization(format!("identity is not endpoint {endpoint_id}")).into());
    }
    let endpoint = app.endpoints.get(endpoint_id).await?;
    let target_state_id = match endpoint.pool_id {
        Some(pool_id) => app.pools.get(pool_id).await?.target_state_id,
        None => None,
    };
    Ok(Json(EndpointSyncStatus {
        endpoint_id,
        pool_id: endpoint.pool_id,
        sync_status: endpoint.sync_status,
        target_state_id,
    }))
}

#[derive(Deserialize)]
struct SyncBody {
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum SyncResponse {
    Preview { endpoint_id: EndpointId, would_submit: bool },
    Submitted(shared_types::SyncOperation),
}

async fn sync(
    State(app): State<AppState>,
    Path(endpoint_id): Path<EndpointId>,
    Caller(identity): Caller,
    Json(body): Json<SyncBody>,
) -> Result<Json<SyncResponse>, ApiError> {
    if !identity.is_endpoint(endpoint_id) {
        return Err(CoordinatorError::authorization(format!("identity is not endpoint {endpoint_id}")).into());
    }
    let _ = body.force; // no in-flight block to bypass: submissions already FIFO-queue regardless.
    if body.dry_run {
        let endpoint = app.endpoints.get(endpoint_id).await?;
        let would_submit = match endpoint.pool_id {
            Some(pool_id) => app.pools.get(pool_id).await?.target_state_id.is_some(),
            None => false,
        };
        return Ok(Json(SyncResponse::Preview { endpoint_id, would_submit }));
    }
    Ok(Json(SyncResponse::Submitted(app.sync.sync_to_latest(endpoint_id).await?)))
}

#[derive(Serialize)]
struct EndpointSummary {
    endpoint_id: EndpointId,
    name: String,
    sync_status: SyncStatus,
}

#[derive(Serialize)]
struct SyncSummary {
    pool_id: PoolId,
    rollup: shared_types::PoolRollupStatus,
    endpoints: Vec<EndpointSummary>,
}

async fn sync_summary(State(app): State<AppState>, Path(pool_id): Path<PoolId>) -> Result<Json<SyncSummary>, ApiError> {
    let rollup = app.pools.rollup_status(pool_id).await?;
    let members = app.endpoints.list(Some(pool_id)).await?;
    let endpoints = members
        .into_iter()
        .map(|e| EndpointSummary { endpoint_id: e.id, name: e.name, sync_status: e.sync_status })
        .collect();
    Ok(Json(SyncSummary { pool_id, rollup, endpoints }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/package-sync/pools/:pool_id/package-count", get(package_count))
        .route("/api/package-sync/endpoints/:endpoint_id/sync-status", get(sync_status))
        .route("/api/package-sync/endpoints/:endpoint_id/sync", post(sync))
        .route("/api/package-sync/pools/:pool_id/endpoints/sync-summary", get(sync_summary))
}
