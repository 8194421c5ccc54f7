//! Token verification failures.

use shared_types::CoordinatorError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("malformed token")]
    Malformed,

    #[error("signature verification failed")]
    BadSignature,

    #[error("token expired at {0}")]
    Expired(i64),

    #[error("no bearer token supplied")]
    Missing,
}

impl From<AuthError> for CoordinatorError {
    fn from(err: AuthError) -> Self {
        CoordinatorError::authentication(err.to_string())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
