//! Maps the coordinator's error taxonomy onto HTTP responses.
//!
//! Every handler returns `Result<T, CoordinatorError>`; this is the one
//! place that decides status codes and response shape, per §7's
//! "taxonomy here is authoritative end to end."

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use shared_types::{CoordinatorError, ErrorKind};

pub struct ApiError(pub CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Persistence/internal failures redact specifics server-side;
        // only validation and auth errors carry caller-visible detail.
        let (message, details) = match err.kind {
            ErrorKind::Persistence | ErrorKind::Internal => {
                tracing::error!(kind = ?err.kind, message = %err.message, "internal error");
                ("an internal error occurred".to_string(), None)
            }
            _ => (err.message.clone(), err.details.clone()),
        };

        let body = json!({
            "error": {
                "code": format!("{:?}", err.kind),
                "message": message,
                "details": details,
                "timestamp": Utc::now(),
            }
        });

        (status, Json(body)).into_response()
    }
}
