//! Append-only state snapshots and target-state selection (§4.5).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use persistence::Store;
use shared_types::{CoordinatorError, CoordinatorResult, EndpointId, PackageState, PoolId, StateId, SystemState};

/// Validation knobs. `require_non_empty_packages` defaults on; a fleet
/// bootstrapping from bare-metal images may need to submit an empty
/// first snapshot, so it is a config flag, not a hardcoded rule.
#[derive(Debug, Clone)]
pub struct StateManagerConfig {
    pub require_non_empty_packages: bool,
    pub timestamp_skew_tolerance: Duration,
}

impl Default for StateManagerConfig {
    fn default() -> Self {
        Self {
            require_non_empty_packages: true,
            timestamp_skew_tolerance: Duration::seconds(30),
        }
    }
}

pub struct NewState {
    pub timestamp: DateTime<Utc>,
    pub pacman_version: String,
    pub architecture: String,
    pub packages: Vec<PackageState>,
}

pub struct StateManager {
    store: Arc<dyn Store>,
    config: StateManagerConfig,
}

impl StateManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: StateManagerConfig) -> Self {
        Self { store, config }
    }

    pub async fn save_state(&self, endpoint_id: EndpointId, submission: NewState) -> CoordinatorResult<StateId> {
        let endpoint = self
            .store
            .get_endpoint(endpoint_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("endpoint {endpoint_id}")))?;
        if endpoint.pool_id.is_none() {
            return Err(CoordinatorError::validation("endpoint is not a member of any pool"));
        }
        if self.config.require_non_empty_packages && submission.packages.is_empty() {
            return Err(CoordinatorError::validation("packages list must not be empty"));
        }
        if submission.architecture.trim().is_empty() {
            return Err(CoordinatorError::validation("architecture must not be empty"));
        }
        if submission.pacman_version.trim().is_empty() {
            return Err(CoordinatorError::validation("pacman_version must not be empty"));
        }
        if submission.timestamp > Utc::now() + self.config.timestamp_skew_tolerance {
            return Err(CoordinatorError::validation("timestamp is too far in the future"));
        }

        let state = SystemState {
            id: StateId::new(),
            endpoint_id,
            timestamp: submission.timestamp,
            pacman_version: submission.pacman_version,
            architecture: submission.architecture,
            packages: submission.packages,
        };
        Ok(self.store.save_state(state).await?)
    }

    pub async fn get_state(&self, id: StateId) -> CoordinatorResult<SystemState> {
        self.store
            .get_state(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("state {id}")))
    }

    pub async fn get_endpoint_states(&self, endpoint_id: EndpointId, limit: i64) -> CoordinatorResult<Vec<SystemState>> {
        Ok(self.store.get_endpoint_states(endpoint_id, limit).await?)
    }

    /// The immediately-prior snapshot for an endpoint: the second most
    /// recent, used by `revert_to_previous` (§4.6).
    pub async fn get_previous_state(&self, endpoint_id: EndpointId) -> CoordinatorResult<Option<SystemState>> {
        let recent = self.store.get_endpoint_states(endpoint_id, 2).await?;
        Ok(recent.into_iter().nth(1))
    }

    /// Atomically sets a pool's target state. Requires the state's
    /// endpoint to currently be a member of the pool, which establishes
    /// invariant 3 ("has at some point been a member") for all future
    /// time even if membership later changes.
    pub async fn set_target(&self, pool_id: PoolId, state_id: StateId) -> CoordinatorResult<()> {
        let state = self.get_state(state_id).await?;
        let owner = self
            .store
            .get_endpoint(state.endpoint_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("endpoint {}", state.endpoint_id)))?;
        if owner.pool_id != Some(pool_id) {
            return Err(CoordinatorError::conflict("state's endpoint is not a member of this pool"));
        }
        self.store.set_pool_target_state(pool_id, state_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn manager_with_endpoint_in_pool() -> (StateManager, Arc<dyn Store>, EndpointId, PoolId) {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let store = persistence::SqliteStore::new(pool);
        store.run_migrations().await.unwrap();
        let store: Arc<dyn Store> = Arc::new(store);

        let endpoint = store.create_endpoint("a", "h1").await.unwrap();
        let pool_record = store
            .create_pool(persistence::NewPool {
                name: "fleet".to_string(),
                description: String::new(),
                sync_policy: shared_types::SyncPolicy::default(),
            })
            .await
            .unwrap();
        store.set_endpoint_pool(endpoint.id, Some(pool_record.id)).await.unwrap();

        let manager = StateManager::new(store.clone(), StateManagerConfig::default());
        (manager, store, endpoint.id, pool_record.id)
    }

    fn sample_packages() -> Vec<PackageState> {
        vec![PackageState {
            package_name: "pkgX".to_string(),
            version: "1.0".to_string(),
            repository: "core".to_string(),
            installed_size: 1024,
            dependencies: vec![],
        }]
    }

    #[tokio::test]
    async fn rejects_empty_package_list_by_default() {
        let (manager, _store, endpoint_id, _pool_id) = manager_with_endpoint_in_pool().await;
        let err = manager
            .save_state(
                endpoint_id,
                NewState { timestamp: Utc::now(), pacman_version: "6.0".to_string(), architecture: "x86_64".to_string(), packages: vec![] },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_types::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn roundtrips_saved_state() {
        let (manager, _store, endpoint_id, _pool_id) = manager_with_endpoint_in_pool().await;
        let id = manager
            .save_state(
                endpoint_id,
                NewState {
                    timestamp: Utc::now(),
                    pacman_version: "6.0".to_string(),
                    architecture: "x86_64".to_string(),
                    packages: sample_packages(),
                },
            )
            .await
            .unwrap();
        let loaded = manager.get_state(id).await.unwrap();
        assert_eq!(loaded.packages, sample_packages());
    }

    #[tokio::test]
    async fn set_target_requires_current_pool_membership() {
        let (manager, store, endpoint_id, pool_id) = manager_with_endpoint_in_pool().await;
        let state_id = manager
            .save_state(
                endpoint_id,
                NewState { timestamp: Utc::now(), pacman_version: "6.0".to_string(), architecture: "x86_64".to_string(), packages: sample_packages() },
            )
            .await
            .unwrap();

        manager.set_target(pool_id, state_id).await.unwrap();

        store.set_endpoint_pool(endpoint_id, None).await.unwrap();
        let other_pool = store
            .create_pool(persistence::NewPool { name: "other".to_string(), description: String::new(), sync_policy: shared_types::SyncPolicy::default() })
            .await
            .unwrap();
        let err = manager.set_target(other_pool.id, state_id).await.unwrap_err();
        assert_eq!(err.kind, shared_types::ErrorKind::Conflict);
    }
}
