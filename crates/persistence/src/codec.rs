//! Shared (de)serialization helpers used by both backend adapters.
//!
//! All JSON-shaped columns are stored as `TEXT`/RFC3339 strings in both
//! SQLite and PostgreSQL (see `migrations.rs`), so the conversion code
//! here is backend-independent and lives in one place instead of being
//! duplicated per adapter.

use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("domain types always serialize")
}

pub fn from_json<T: DeserializeOwned>(
    raw: &str,
    column: &'static str,
) -> Result<T, PersistenceError> {
    serde_json::from_str(raw).map_err(|source| PersistenceError::Corrupt { column, source })
}

pub fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub fn from_rfc3339(raw: &str, column: &'static str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PersistenceError::Backend {
            operation: column,
            source: sqlx::Error::Decode(format!("invalid RFC3339 timestamp in {column}").into()),
        })
}
