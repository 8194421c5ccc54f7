//! Persistence-layer error type.
//!
//! Every failure mode from §4.1 ("any transaction failure raises a
//! persistence error carrying operation context") funnels through this
//! enum; callers upstream convert it to `shared_types::CoordinatorError`
//! at the component boundary.

use shared_types::{CoordinatorError, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("database error during {operation}: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("corrupt stored payload in {column}: {source}")]
    Corrupt {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub fn backend(operation: &'static str, source: sqlx::Error) -> Self {
        match &source {
            sqlx::Error::RowNotFound => PersistenceError::NotFound(operation.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                PersistenceError::Conflict(operation.to_string())
            }
            _ => PersistenceError::Backend { operation, source },
        }
    }
}

impl From<PersistenceError> for CoordinatorError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(what) => CoordinatorError::not_found(what),
            PersistenceError::Conflict(what) => CoordinatorError::conflict(what),
            other => CoordinatorError::new(ErrorKind::Persistence, other.to_string()),
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
