//! REST and WebSocket surface: middleware chain, route table, and the
//! per-endpoint event stream (§4.8, §6).

pub mod auth_extract;
pub mod cors;
pub mod error;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod security_headers;
pub mod state;
pub mod validation;

pub use error::ApiError;
pub use rate_limit::RateLimitConfig;
pub use router::build as build_router;
pub use state::AppState;
