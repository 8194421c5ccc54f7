//! Storage port and backend adapters.
//!
//! Everything upstream depends on `Store`; which concrete adapter is
//! wired in is a runtime choice driven by the configured connection
//! string (`sqlite:` vs `postgres:`), made in `coordinator-runtime`.

pub mod codec;
pub mod error;
pub mod migrations;
pub mod postgres;
pub mod sqlite;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use store::{NewPool, PoolRecord, Store};

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{SyncPolicy, SyncStatus};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool");
        let store = SqliteStore::new(pool);
        store.run_migrations().await.expect("migrations apply");
        store
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = memory_store().await;
        store.run_migrations().await.expect("second run is a no-op");
    }

    #[tokio::test]
    async fn endpoint_roundtrips() {
        let store = memory_store().await;
        let endpoint = store.create_endpoint("web-01", "web-01.lan").await.expect("create");
        assert_eq!(endpoint.sync_status, SyncStatus::Offline);

        let fetched = store.get_endpoint(endpoint.id).await.expect("get").expect("present");
        assert_eq!(fetched.name, "web-01");

        let by_identity = store
            .find_endpoint_by_identity("web-01", "web-01.lan")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(by_identity.id, endpoint.id);
    }

    #[tokio::test]
    async fn duplicate_identity_is_conflict() {
        let store = memory_store().await;
        store.create_endpoint("db-01", "db-01.lan").await.expect("first insert");
        let err = store.create_endpoint("db-01", "db-01.lan").await.unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));
    }

    #[tokio::test]
    async fn operation_transition_rejects_wrong_expected_status() {
        use shared_types::{OperationStatus, OperationType};

        let store = memory_store().await;
        let endpoint = store.create_endpoint("node-1", "node-1.lan").await.expect("create");
        let op = store
            .create_operation(None, endpoint.id, OperationType::Sync)
            .await
            .expect("create operation");

        let err = store
            .transition_operation(op.id, OperationStatus::InProgress, OperationStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));

        store
            .transition_operation(op.id, OperationStatus::Pending, OperationStatus::InProgress, None)
            .await
            .expect("valid transition");
        let reloaded = store.get_operation(op.id).await.expect("get").expect("present");
        assert_eq!(reloaded.status, OperationStatus::InProgress);
    }

    #[tokio::test]
    async fn pool_crud() {
        let store = memory_store().await;
        let pool = store
            .create_pool(NewPool {
                name: "edge".to_string(),
                description: "edge fleet".to_string(),
                sync_policy: SyncPolicy::default(),
            })
            .await
            .expect("create pool");

        let listed = store.list_pools().await.expect("list");
        assert_eq!(listed.len(), 1);

        store.delete_pool(pool.id).await.expect("delete");
        assert!(store.get_pool(pool.id).await.expect("get").is_none());
    }
}
