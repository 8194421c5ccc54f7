//! CORS layer built from `server.cors_origins` (§6 configuration).

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

#[must_use]
pub fn build(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(parsed)
}
