//! Endpoint lifecycle routes (§4.3, §6 "Endpoint management").

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use endpoint_manager::RepositorySubmission;
use serde::{Deserialize, Serialize};
use shared_types::{Endpoint, EndpointId, PoolId, Repository, RepositoryPackage, SyncStatus};

use crate::auth_extract::Caller;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    hostname: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    endpoint: Endpoint,
    auth_token: String,
}

async fn register(State(app): State<AppState>, Json(body): Json<RegisterRequest>) -> Result<Json<RegisterResponse>, ApiError> {
    validation::identifier("name", &body.name)?;
    validation::hostname(&body.hostname)?;
    let (endpoint, auth_token) = app.endpoints.register(&body.name, &body.hostname).await?;
    Ok(Json(RegisterResponse { endpoint, auth_token }))
}

#[derive(Deserialize)]
struct ListQuery {
    pool_id: Option<PoolId>,
}

async fn list(State(app): State<AppState>, Query(query): Query<ListQuery>) -> Result<Json<Vec<Endpoint>>, ApiError> {
    Ok(Json(app.endpoints.list(query.pool_id).await?))
}

async fn get_one(State(app): State<AppState>, Path(id): Path<EndpointId>) -> Result<Json<Endpoint>, ApiError> {
    Ok(Json(app.endpoints.get(id).await?))
}

#[derive(Deserialize)]
struct StatusBody {
    status: SyncStatus,
}

async fn update_status(
    State(app): State<AppState>,
    Path(id): Path<EndpointId>,
    Caller(identity): Caller,
    Json(body): Json<StatusBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    app.endpoints.update_status(id, body.status, identity).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn remove(
    State(app): State<AppState>,
    Path(id): Path<EndpointId>,
    Caller(identity): Caller,
) -> Result<Json<serde_json::Value>, ApiError> {
    app.endpoints.remove(id, identity).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
struct RepositorySubmissionDto {
    repo_name: String,
    primary_url: String,
    #[serde(default)]
    mirrors: Vec<String>,
    #[serde(default)]
    packages: Vec<RepositoryPackage>,
}

#[derive(Deserialize)]
struct IngestBody {
    repositories: Vec<RepositorySubmissionDto>,
}

async fn ingest_repositories(
    State(app): State<AppState>,
    Path(id): Path<EndpointId>,
    Caller(identity): Caller,
    Json(body): Json<IngestBody>,
) -> Result<Json<Vec<Repository>>, ApiError> {
    let mut submissions = Vec::with_capacity(body.repositories.len());
    for repo in body.repositories {
        validation::identifier("repo_name", &repo.repo_name)?;
        validation::url("primary_url", &repo.primary_url)?;
        for mirror in &repo.mirrors {
            validation::url("mirrors", mirror)?;
        }
        for package in &repo.packages {
            validation::package_name(&package.name)?;
            validation::version(&package.version)?;
        }
        submissions.push(RepositorySubmission {
            repo_name: repo.repo_name,
            primary_url: repo.primary_url,
            mirrors: repo.mirrors,
            packages: repo.packages,
        });
    }
    Ok(Json(app.endpoints.ingest_repositories(id, submissions, identity).await?))
}

async fn list_repositories(State(app): State<AppState>, Path(id): Path<EndpointId>) -> Result<Json<Vec<Repository>>, ApiError> {
    Ok(Json(app.endpoints.list_repositories(id).await?))
}

#[derive(Deserialize)]
struct PoolAssignQuery {
    pool_id: PoolId,
}

async fn assign_pool(
    State(app): State<AppState>,
    Path(id): Path<EndpointId>,
    Query(query): Query<PoolAssignQuery>,
    Caller(identity): Caller,
) -> Result<Json<serde_json::Value>, ApiError> {
    app.endpoints.assign_to_pool(id, query.pool_id, identity).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn unassign_pool(
    State(app): State<AppState>,
    Path(id): Path<EndpointId>,
    Caller(identity): Caller,
) -> Result<Json<serde_json::Value>, ApiError> {
    app.endpoints.remove_from_pool(id, identity).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/endpoints/register", post(register))
        .route("/api/endpoints", get(list))
        .route("/api/endpoints/:id", get(get_one).delete(remove))
        .route("/api/endpoints/:id/status", put(update_status))
        .route("/api/endpoints/:id/repositories", post(ingest_repositories).get(list_repositories))
        .route("/api/endpoints/:id/pool", put(assign_pool).delete(unassign_pool))
}
