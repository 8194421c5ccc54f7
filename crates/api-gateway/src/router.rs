//! Assembles the full route table and the middleware chain (§4.8).
//!
//! Layer order, outermost to innermost: request tracing, security
//! headers, CORS, rate limiting, then routing to a handler. Field
//! validation and authentication happen inside the handler/extractor
//! layer itself, since both need route-specific schema knowledge that a
//! generic tower `Layer` does not have.
//!
//! `repository_analysis_enabled` gates the dedicated analysis-report
//! routes only (§6 `features.repository_analysis`); package-sync's own
//! package-count handler keeps using the analyzer regardless, since it
//! has no reporting surface of its own to disable.

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::rate_limit::{RateLimitConfig, RateLimitLayer};
use crate::state::AppState;
use crate::{cors, routes, security_headers};

pub fn build(state: AppState, cors_origins: &[String], rate_limit: RateLimitConfig, repository_analysis_enabled: bool) -> Router {
    let mut router = Router::new()
        .merge(routes::endpoints::router())
        .merge(routes::pools::router())
        .merge(routes::states::router())
        .merge(routes::sync::router())
        .merge(routes::package_sync::router())
        .merge(routes::health::router())
        .merge(routes::ws::router());

    if repository_analysis_enabled {
        router = router.merge(routes::repositories::router());
    }

    router
        .with_state(state)
        .layer(RateLimitLayer::new(rate_limit))
        .layer(cors::build(cors_origins))
        .layer(axum::middleware::from_fn(security_headers::apply))
        .layer(TraceLayer::new_for_http())
}
