//! Bearer token extraction for handlers (§4.8 middleware step 3).
//!
//! `Caller` is an axum extractor: missing or invalid tokens short-circuit
//! the handler with 401 before any business logic runs. Admin-token
//! membership is checked before a per-endpoint claim, since an admin
//! token is never itself a signed claim.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use auth::Identity;
use chrono::Utc;
use shared_types::CoordinatorError;

use crate::error::ApiError;
use crate::state::AppState;

pub struct Caller(pub Identity);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let State(app): State<AppState> = State::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError(CoordinatorError::internal("state extraction failed")))?;

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError(CoordinatorError::authentication("missing bearer token")))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError(CoordinatorError::authentication("malformed authorization header")))?;

        if app.tokens.is_admin_token(token) {
            return Ok(Caller(Identity::Admin));
        }

        let claims = app.tokens.verify(token).map_err(CoordinatorError::from)?;
        let _ = app.endpoints.update_last_seen(claims.endpoint_id, Utc::now()).await;
        Ok(Caller(Identity::Endpoint(claims.endpoint_id)))
    }
}
