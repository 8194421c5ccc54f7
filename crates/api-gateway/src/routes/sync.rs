//! Sync operation routes (§4.6, §6 "Sync operations").
//!
//! `progress`/`complete` are not in the literal route table but are the
//! HTTP surface for the "endpoint posts progress updates" and
//! synchronous-failure paths §4.6/§7 describe — without them nothing
//! ever drives an operation out of `in_progress`.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use shared_types::{CoordinatorError, EndpointId, OperationId, PoolId, SyncOperation};

use crate::auth_extract::Caller;
use crate::error::ApiError;
use crate::state::AppState;

fn require_self(identity: auth::Identity, endpoint_id: EndpointId) -> Result<(), ApiError> {
    if identity.is_endpoint(endpoint_id) {
        Ok(())
    } else {
        Err(CoordinatorError::authorization(format!("identity is not endpoint {endpoint_id}")).into())
    }
}

async fn sync_to_latest(
    State(app): State<AppState>,
    Path(endpoint_id): Path<EndpointId>,
    Caller(identity): Caller,
) -> Result<Json<SyncOperation>, ApiError> {
    require_self(identity, endpoint_id)?;
    Ok(Json(app.sync.sync_to_latest(endpoint_id).await?))
}

async fn set_as_latest(
    State(app): State<AppState>,
    Path(endpoint_id): Path<EndpointId>,
    Caller(identity): Caller,
) -> Result<Json<SyncOperation>, ApiError> {
    require_self(identity, endpoint_id)?;
    Ok(Json(app.sync.set_as_latest(endpoint_id).await?))
}

async fn revert(
    State(app): State<AppState>,
    Path(endpoint_id): Path<EndpointId>,
    Caller(identity): Caller,
) -> Result<Json<SyncOperation>, ApiError> {
    require_self(identity, endpoint_id)?;
    Ok(Json(app.sync.revert_to_previous(endpoint_id).await?))
}

async fn get_operation(State(app): State<AppState>, Path(op_id): Path<OperationId>) -> Result<Json<SyncOperation>, ApiError> {
    Ok(Json(app.sync.get_operation(op_id).await?))
}

async fn cancel(
    State(app): State<AppState>,
    Path(op_id): Path<OperationId>,
    Caller(identity): Caller,
) -> Result<Json<serde_json::Value>, ApiError> {
    let op = app.sync.get_operation(op_id).await?;
    if !identity.is_endpoint(op.endpoint_id) && !identity.is_admin() {
        return Err(CoordinatorError::authorization(format!("identity is not endpoint {} or admin", op.endpoint_id)).into());
    }
    app.sync.cancel(op_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
struct ProgressBody {
    stage: String,
    percentage: u8,
    current_action: String,
}

async fn report_progress(
    State(app): State<AppState>,
    Path(op_id): Path<OperationId>,
    Caller(identity): Caller,
    Json(body): Json<ProgressBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let op = app.sync.get_operation(op_id).await?;
    require_self(identity, op.endpoint_id)?;
    app.sync.report_progress(op_id, body.stage, body.percentage, body.current_action).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
struct OutcomeBody {
    success: bool,
    #[serde(default)]
    error_message: Option<String>,
}

async fn report_outcome(
    State(app): State<AppState>,
    Path(op_id): Path<OperationId>,
    Caller(identity): Caller,
    Json(body): Json<OutcomeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let op = app.sync.get_operation(op_id).await?;
    require_self(identity, op.endpoint_id)?;
    if body.success {
        app.sync.report_success(op_id).await?;
    } else {
        app.sync.report_failure(op_id, body.error_message.unwrap_or_else(|| "reported failure".to_string())).await?;
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

async fn list_for_endpoint(
    State(app): State<AppState>,
    Path(endpoint_id): Path<EndpointId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SyncOperation>>, ApiError> {
    Ok(Json(app.sync.list_for_endpoint(endpoint_id, query.limit).await?))
}

async fn list_for_pool(
    State(app): State<AppState>,
    Path(pool_id): Path<PoolId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SyncOperation>>, ApiError> {
    Ok(Json(app.sync.list_for_pool(pool_id, query.limit).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sync/:endpoint_id/sync-to-latest", post(sync_to_latest))
        .route("/api/sync/:endpoint_id/set-as-latest", post(set_as_latest))
        .route("/api/sync/:endpoint_id/revert", post(revert))
        .route("/api/sync/operations/:op_id", get(get_operation))
        .route("/api/sync/operations/:op_id/cancel", post(cancel))
        .route("/api/sync/operations/:op_id/progress", post(report_progress))
        .route("/api/sync/operations/:op_id/complete", post(report_outcome))
        .route("/api/sync/:endpoint_id/operations", get(list_for_endpoint))
        .route("/api/sync/pools/:pool_id/operations", get(list_for_pool))
}
