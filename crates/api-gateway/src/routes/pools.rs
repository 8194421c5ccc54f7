//! Pool CRUD and membership routes (§4.4, §6 "Pool management").

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use pool_manager::NewPool;
use serde::Deserialize;
use shared_types::{EndpointId, Pool, PoolId, PoolRollupStatus, SyncPolicy};

use crate::auth_extract::Caller;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
struct CreateBody {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    sync_policy: SyncPolicy,
}

async fn create(State(app): State<AppState>, Caller(identity): Caller, Json(body): Json<CreateBody>) -> Result<Json<Pool>, ApiError> {
    validation::identifier("name", &body.name)?;
    let pool = app
        .pools
        .create(NewPool { name: body.name, description: body.description, sync_policy: body.sync_policy }, identity)
        .await?;
    Ok(Json(pool))
}

async fn list(State(app): State<AppState>) -> Result<Json<Vec<Pool>>, ApiError> {
    Ok(Json(app.pools.list().await?))
}

async fn get_one(State(app): State<AppState>, Path(id): Path<PoolId>) -> Result<Json<Pool>, ApiError> {
    Ok(Json(app.pools.get(id).await?))
}

#[derive(Deserialize)]
struct UpdateBody {
    description: Option<String>,
    sync_policy: Option<SyncPolicy>,
}

async fn update(
    State(app): State<AppState>,
    Path(id): Path<PoolId>,
    Caller(identity): Caller,
    Json(body): Json<UpdateBody>,
) -> Result<Json<Pool>, ApiError> {
    Ok(Json(app.pools.update(id, body.description, body.sync_policy, identity).await?))
}

#[derive(Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    cascade: bool,
}

async fn delete_one(
    State(app): State<AppState>,
    Path(id): Path<PoolId>,
    Query(query): Query<DeleteQuery>,
    Caller(identity): Caller,
) -> Result<Json<serde_json::Value>, ApiError> {
    app.pools.delete(id, query.cascade, identity).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
struct AssignBody {
    endpoint_id: EndpointId,
}

async fn assign_endpoint(
    State(app): State<AppState>,
    Path(id): Path<PoolId>,
    Caller(identity): Caller,
    Json(body): Json<AssignBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    app.pools.assign_endpoint(id, body.endpoint_id, identity).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn unassign_endpoint(
    State(app): State<AppState>,
    Path((_id, endpoint_id)): Path<(PoolId, EndpointId)>,
    Caller(identity): Caller,
) -> Result<Json<serde_json::Value>, ApiError> {
    app.pools.unassign_endpoint(endpoint_id, identity).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn rollup(State(app): State<AppState>, Path(id): Path<PoolId>) -> Result<Json<PoolRollupStatus>, ApiError> {
    Ok(Json(app.pools.rollup_status(id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pools", post(create).get(list))
        .route("/api/pools/:id", get(get_one).put(update).delete(delete_one))
        .route("/api/pools/:id/endpoints", post(assign_endpoint))
        .route("/api/pools/:id/endpoints/:endpoint_id", axum::routing::delete(unassign_endpoint))
        .route("/api/pools/:id/status", get(rollup))
}
