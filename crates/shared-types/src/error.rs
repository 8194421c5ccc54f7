//! Cross-component error taxonomy.
//!
//! Every subsystem returns a [`CoordinatorError`] at its public boundary.
//! The HTTP surface maps [`ErrorKind`] to a status code; it never invents
//! its own mapping, so the taxonomy here is authoritative end to end.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven error kinds from the error handling design, plus `Internal`
/// for anything unhandled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimit,
    Persistence,
    Internal,
}

impl ErrorKind {
    /// HTTP status this kind maps to. `Conflict` defaults to 409; callers
    /// that need the 400 variant (e.g. a malformed transition request)
    /// should use `Validation` instead.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Authentication => 401,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::RateLimit => 429,
            ErrorKind::Persistence | ErrorKind::Internal => 500,
        }
    }
}

/// A typed error carrying its taxonomy kind, a caller-facing message, and
/// optional machine-readable detail.
///
/// Only `Validation` and `Authentication`/`Authorization` errors are
/// expected to carry detail safe to show a caller; persistence and
/// internal errors should keep `details` empty and rely on the
/// correlation id logged alongside them.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub struct CoordinatorError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CoordinatorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, format!("not found: {}", resource.into()))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Persistence, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::Authentication.http_status(), 401);
        assert_eq!(ErrorKind::Authorization.http_status(), 403);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::RateLimit.http_status(), 429);
        assert_eq!(ErrorKind::Persistence.http_status(), 500);
        assert_eq!(ErrorKind::Internal.http_status(), 500);
    }

    #[test]
    fn not_found_formats_resource() {
        let err = CoordinatorError::not_found("endpoint abc");
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.message.contains("endpoint abc"));
    }
}
