//! Pool CRUD, endpoint assignment, and rollup status (§4.4).

use std::sync::Arc;

use auth::Identity;
use persistence::{NewPool as StoreNewPool, Store};
use shared_types::{
    CoordinatorError, CoordinatorResult, EndpointId, Pool, PoolId, PoolOverallStatus,
    PoolRollupStatus, SyncPolicy, SyncStatus,
};

pub struct NewPool {
    pub name: String,
    pub description: String,
    pub sync_policy: SyncPolicy,
}

pub struct PoolManager {
    store: Arc<dyn Store>,
}

impl PoolManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_pool: NewPool, requester: Identity) -> CoordinatorResult<Pool> {
        require_admin(requester)?;
        if self.store.get_pool_by_name(&new_pool.name).await?.is_some() {
            return Err(CoordinatorError::conflict(format!("pool name {} already exists", new_pool.name)));
        }
        let record = self
            .store
            .create_pool(StoreNewPool {
                name: new_pool.name,
                description: new_pool.description,
                sync_policy: new_pool.sync_policy,
            })
            .await?;
        self.to_pool(record).await
    }

    pub async fn get(&self, id: PoolId) -> CoordinatorResult<Pool> {
        let record = self.store.get_pool(id).await?.ok_or_else(|| CoordinatorError::not_found(format!("pool {id}")))?;
        self.to_pool(record).await
    }

    pub async fn list(&self) -> CoordinatorResult<Vec<Pool>> {
        let records = self.store.list_pools().await?;
        let mut pools = Vec::with_capacity(records.len());
        for record in records {
            pools.push(self.to_pool(record).await?);
        }
        Ok(pools)
    }

    pub async fn update(
        &self,
        id: PoolId,
        description: Option<String>,
        sync_policy: Option<SyncPolicy>,
        requester: Identity,
    ) -> CoordinatorResult<Pool> {
        require_admin(requester)?;
        self.store.update_pool(id, description, sync_policy).await?;
        self.get(id).await
    }

    /// Rejects with a conflict unless `cascade` is set, in which case
    /// member endpoints are unassigned first (§4.4 deletion policy).
    pub async fn delete(&self, id: PoolId, cascade: bool, requester: Identity) -> CoordinatorResult<()> {
        require_admin(requester)?;
        let members = self.store.list_endpoints(Some(id)).await?;
        if !members.is_empty() {
            if !cascade {
                return Err(CoordinatorError::conflict("pool not empty"));
            }
            for endpoint in members {
                self.store.set_endpoint_pool(endpoint.id, None).await?;
            }
        }
        self.store.delete_pool(id).await?;
        Ok(())
    }

    pub async fn assign_endpoint(
        &self,
        pool_id: PoolId,
        endpoint_id: EndpointId,
        requester: Identity,
    ) -> CoordinatorResult<()> {
        require_admin(requester)?;
        self.get(pool_id).await?;
        self.store.set_endpoint_pool(endpoint_id, Some(pool_id)).await?;
        Ok(())
    }

    pub async fn unassign_endpoint(&self, endpoint_id: EndpointId, requester: Identity) -> CoordinatorResult<()> {
        require_admin(requester)?;
        self.store.set_endpoint_pool(endpoint_id, None).await?;
        Ok(())
    }

    /// Read-only and cheap; recomputed on every call, never cached
    /// (§4.4 "no caching required").
    pub async fn rollup_status(&self, pool_id: PoolId) -> CoordinatorResult<PoolRollupStatus> {
        self.get(pool_id).await?;
        let members = self.store.list_endpoints(Some(pool_id)).await?;
        Ok(compute_rollup(pool_id, &members.iter().map(|e| e.sync_status).collect::<Vec<_>>()))
    }

    async fn to_pool(&self, record: persistence::PoolRecord) -> CoordinatorResult<Pool> {
        let endpoint_ids = self
            .store
            .list_endpoints(Some(record.id))
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        Ok(Pool {
            id: record.id,
            name: record.name,
            description: record.description,
            endpoint_ids,
            target_state_id: record.target_state_id,
            sync_policy: record.sync_policy,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Pure so it can be unit-tested without a database: given the member
/// sync statuses of a pool, derive `overall` and `sync_percentage`
/// exactly as §4.4 describes.
#[must_use]
pub fn compute_rollup(pool_id: PoolId, statuses: &[SyncStatus]) -> PoolRollupStatus {
    let total = statuses.len();
    if total == 0 {
        return PoolRollupStatus {
            pool_id,
            overall: PoolOverallStatus::FullySynced,
            sync_percentage: 100.0,
            total_endpoints: 0,
            in_sync: 0,
            ahead: 0,
            behind: 0,
            offline: 0,
        };
    }

    let in_sync = statuses.iter().filter(|s| **s == SyncStatus::InSync).count();
    let ahead = statuses.iter().filter(|s| **s == SyncStatus::Ahead).count();
    let behind = statuses.iter().filter(|s| **s == SyncStatus::Behind).count();
    let offline = statuses.iter().filter(|s| **s == SyncStatus::Offline).count();

    let overall = if offline == total {
        PoolOverallStatus::AllOffline
    } else if in_sync == total {
        PoolOverallStatus::FullySynced
    } else if in_sync > 0 {
        PoolOverallStatus::PartiallySynced
    } else {
        PoolOverallStatus::OutOfSync
    };

    PoolRollupStatus {
        pool_id,
        overall,
        sync_percentage: (in_sync as f64 / total as f64) * 100.0,
        total_endpoints: total,
        in_sync,
        ahead,
        behind,
        offline,
    }
}

fn require_admin(requester: Identity) -> CoordinatorResult<()> {
    if requester.is_admin() {
        Ok(())
    } else {
        Err(CoordinatorError::authorization("admin identity required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_is_fully_synced() {
        let status = compute_rollup(PoolId::new(), &[]);
        assert_eq!(status.overall, PoolOverallStatus::FullySynced);
        assert_eq!(status.sync_percentage, 100.0);
    }

    #[test]
    fn all_offline_pool() {
        let status = compute_rollup(PoolId::new(), &[SyncStatus::Offline, SyncStatus::Offline]);
        assert_eq!(status.overall, PoolOverallStatus::AllOffline);
    }

    #[test]
    fn mixed_statuses_are_partially_synced() {
        let status = compute_rollup(PoolId::new(), &[SyncStatus::InSync, SyncStatus::Behind]);
        assert_eq!(status.overall, PoolOverallStatus::PartiallySynced);
        assert_eq!(status.sync_percentage, 50.0);
    }

    #[test]
    fn no_in_sync_members_online_is_out_of_sync() {
        let status = compute_rollup(PoolId::new(), &[SyncStatus::Ahead, SyncStatus::Behind]);
        assert_eq!(status.overall, PoolOverallStatus::OutOfSync);
    }

    #[tokio::test]
    async fn delete_nonempty_pool_without_cascade_is_conflict() {
        use sqlx::sqlite::SqlitePoolOptions;

        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let store = persistence::SqliteStore::new(pool);
        store.run_migrations().await.unwrap();
        let store: Arc<dyn Store> = Arc::new(store);
        let manager = PoolManager::new(store.clone());

        let created = manager
            .create(
                NewPool { name: "edge".to_string(), description: "d".to_string(), sync_policy: SyncPolicy::default() },
                Identity::Admin,
            )
            .await
            .unwrap();
        let endpoint = store.create_endpoint("node-1", "node-1.lan").await.unwrap();
        store.set_endpoint_pool(endpoint.id, Some(created.id)).await.unwrap();

        let err = manager.delete(created.id, false, Identity::Admin).await.unwrap_err();
        assert_eq!(err.kind, shared_types::ErrorKind::Conflict);

        manager.delete(created.id, true, Identity::Admin).await.unwrap();
        assert!(manager.get(created.id).await.is_err());
    }
}
