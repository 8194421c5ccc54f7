//! Repository compatibility analysis routes (§4.7, §6 "Repository analysis").

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use repository_analyzer::AvailabilityMatrix;
use shared_types::{CompatibilityAnalysis, EndpointId, PackageConflict, PoolId, Repository};

use crate::error::ApiError;
use crate::state::AppState;

async fn analysis(State(app): State<AppState>, Path(pool_id): Path<PoolId>) -> Result<Json<CompatibilityAnalysis>, ApiError> {
    Ok(Json(app.analyzer.analyze(pool_id).await?))
}

async fn refresh(State(app): State<AppState>, Path(pool_id): Path<PoolId>) -> Result<Json<CompatibilityAnalysis>, ApiError> {
    Ok(Json(app.analyzer.analyze(pool_id).await?))
}

async fn matrix(State(app): State<AppState>, Path(pool_id): Path<PoolId>) -> Result<Json<AvailabilityMatrix>, ApiError> {
    Ok(Json(app.analyzer.availability_matrix(pool_id).await?))
}

async fn excluded(State(app): State<AppState>, Path(pool_id): Path<PoolId>) -> Result<Json<BTreeSet<String>>, ApiError> {
    Ok(Json(app.analyzer.excluded_packages(pool_id).await?))
}

async fn conflicts(State(app): State<AppState>, Path(pool_id): Path<PoolId>) -> Result<Json<Vec<PackageConflict>>, ApiError> {
    Ok(Json(app.analyzer.conflicts(pool_id).await?))
}

async fn by_endpoint(State(app): State<AppState>, Path(endpoint_id): Path<EndpointId>) -> Result<Json<Vec<Repository>>, ApiError> {
    Ok(Json(app.endpoints.list_repositories(endpoint_id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/repositories/analysis/:pool_id", get(analysis))
        .route("/api/repositories/analysis/:pool_id/refresh", post(refresh))
        .route("/api/repositories/matrix/:pool_id", get(matrix))
        .route("/api/repositories/excluded/:pool_id", get(excluded))
        .route("/api/repositories/conflicts/:pool_id", get(conflicts))
        .route("/api/repositories/endpoint/:endpoint_id", get(by_endpoint))
}
