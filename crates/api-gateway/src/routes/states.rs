//! State snapshot routes (§4.5, §6 "States").

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared_types::{CoordinatorError, EndpointId, PackageState, StateId, SystemState};
use state_manager::NewState;

use crate::auth_extract::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
struct SubmitBody {
    timestamp: DateTime<Utc>,
    pacman_version: String,
    architecture: String,
    packages: Vec<PackageState>,
}

async fn submit(
    State(app): State<AppState>,
    Path(endpoint_id): Path<EndpointId>,
    Caller(identity): Caller,
    Json(body): Json<SubmitBody>,
) -> Result<Json<SystemState>, ApiError> {
    if !identity.is_endpoint(endpoint_id) {
        return Err(CoordinatorError::authorization(format!("identity is not endpoint {endpoint_id}")).into());
    }
    let id = app
        .states
        .save_state(
            endpoint_id,
            NewState {
                timestamp: body.timestamp,
                pacman_version: body.pacman_version,
                architecture: body.architecture,
                packages: body.packages,
            },
        )
        .await?;
    Ok(Json(app.states.get_state(id).await?))
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
) -> Result<Json<Vec<SystemState>>, ApiError> {
    Ok(Json(app.states.get_endpoint_states(endpoint_id, query.limit).await?))
}

async fn get_one(State(app): State<AppState>, Path(id): Path<StateId>) -> Result<Json<SystemState>, ApiError> {
    Ok(Json(app.states.get_state(id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/states/:endpoint_id", post(submit))
        .route("/api/states/endpoint/:endpoint_id", get(list_for_endpoint))
        .route("/api/states/:id/detail", get(get_one))
}
