pub mod actor;
pub mod command;
pub mod handle;
pub mod watchdog;

use std::sync::Arc;

use persistence::Store;
use shared_bus::EventPublisher;

pub use command::Outcome;
pub use handle::SyncCoordinatorHandle;
pub use watchdog::WatchdogConfig;

/// Builds the actor, spawns its run loop, and returns a handle to it.
pub fn spawn(store: Arc<dyn Store>, events: Arc<dyn EventPublisher>, watchdog: WatchdogConfig) -> SyncCoordinatorHandle {
    let (sender, receiver) = tokio::sync::mpsc::channel(256);
    let actor = actor::Actor::new(store.clone(), events, watchdog, receiver);
    tokio::spawn(actor.run());
    SyncCoordinatorHandle::new(store, sender)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use persistence::{NewPool, SqliteStore};
    use shared_bus::EndpointEventBus;
    use shared_types::{EndpointId, SyncPolicy, SystemState};
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn fresh_store() -> Arc<SqliteStore> {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = SqliteStore::new(pool);
        store.run_migrations().await.unwrap();
        Arc::new(store)
    }

    fn blank_state(endpoint_id: EndpointId) -> SystemState {
        SystemState {
            id: Default::default(),
            endpoint_id,
            timestamp: chrono::Utc::now(),
            pacman_version: "6.0.2".into(),
            architecture: "x86_64".into(),
            packages: Vec::new(),
        }
    }

    #[tokio::test]
    async fn sync_to_latest_rejects_endpoint_without_pool() {
        let store = fresh_store().await;
        let events: Arc<dyn EventPublisher> = Arc::new(EndpointEventBus::new());
        let handle = spawn(store.clone(), events, WatchdogConfig::default());

        let endpoint = store.create_endpoint("node-a", "node-a.local").await.unwrap();
        let result = handle.sync_to_latest(endpoint.id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn submit_then_complete_roundtrips() {
        let store = fresh_store().await;
        let events: Arc<dyn EventPublisher> = Arc::new(EndpointEventBus::new());
        let handle = spawn(store.clone(), events, WatchdogConfig::default());

        let endpoint = store.create_endpoint("node-b", "node-b.local").await.unwrap();
        let pool = store
            .create_pool(NewPool { name: "ring".into(), description: String::new(), sync_policy: SyncPolicy::default() })
            .await
            .unwrap();
        store.set_endpoint_pool(endpoint.id, Some(pool.id)).await.unwrap();

        let state_id = store.save_state(blank_state(endpoint.id)).await.unwrap();
        store.set_pool_target_state(pool.id, state_id).await.unwrap();

        let op = handle.sync_to_latest(endpoint.id).await.unwrap();
        assert_eq!(op.status, shared_types::OperationStatus::InProgress);

        handle.report_success(op.id).await.unwrap();
        let completed = handle.get_operation(op.id).await.unwrap();
        assert_eq!(completed.status, shared_types::OperationStatus::Completed);
    }
}
