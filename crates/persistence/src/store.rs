//! The storage port every subsystem depends on.
//!
//! Mirrors the ports/adapters split the rest of the workspace uses:
//! subsystem crates depend on `dyn Store`, never on `SqliteStore` or
//! `PostgresStore` directly, so a test double can stand in without a
//! database.

use async_trait::async_trait;
use shared_types::{
    CompatibilityAnalysis, Endpoint, EndpointId, OperationId, OperationStatus, OperationType,
    PoolId, Repository, StateId, SyncOperation, SyncPolicy, SyncStatus, SystemState,
};

use crate::error::PersistenceResult;

/// A freshly-created pool before the database assigns `created_at`/`updated_at`.
pub struct NewPool {
    pub name: String,
    pub description: String,
    pub sync_policy: SyncPolicy,
}

pub struct PoolRecord {
    pub id: PoolId,
    pub name: String,
    pub description: String,
    pub target_state_id: Option<StateId>,
    pub sync_policy: SyncPolicy,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// The transactional interface of §4.1: every method here either fully
/// applies or leaves no trace. Multi-statement operations (e.g.
/// `remove_endpoint`, `replace_repositories`) run inside a database
/// transaction internally; callers never see a partially-applied write.
#[async_trait]
pub trait Store: Send + Sync {
    // -- endpoints -------------------------------------------------------

    async fn create_endpoint(&self, name: &str, hostname: &str) -> PersistenceResult<Endpoint>;
    async fn find_endpoint_by_identity(
        &self,
        name: &str,
        hostname: &str,
    ) -> PersistenceResult<Option<Endpoint>>;
    async fn get_endpoint(&self, id: EndpointId) -> PersistenceResult<Option<Endpoint>>;
    async fn list_endpoints(&self, pool_id: Option<PoolId>) -> PersistenceResult<Vec<Endpoint>>;
    async fn update_endpoint_status(
        &self,
        id: EndpointId,
        status: SyncStatus,
    ) -> PersistenceResult<()>;
    async fn touch_last_seen(
        &self,
        id: EndpointId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> PersistenceResult<()>;
    async fn set_endpoint_pool(
        &self,
        id: EndpointId,
        pool_id: Option<PoolId>,
    ) -> PersistenceResult<()>;
    /// Deletes the endpoint's repositories and the endpoint itself
    /// atomically, per §4.3 `remove(id)`.
    async fn remove_endpoint(&self, id: EndpointId) -> PersistenceResult<()>;

    // -- pools -------------------------------------------------------------

    async fn create_pool(&self, new_pool: NewPool) -> PersistenceResult<PoolRecord>;
    async fn get_pool(&self, id: PoolId) -> PersistenceResult<Option<PoolRecord>>;
    async fn get_pool_by_name(&self, name: &str) -> PersistenceResult<Option<PoolRecord>>;
    async fn list_pools(&self) -> PersistenceResult<Vec<PoolRecord>>;
    async fn update_pool(
        &self,
        id: PoolId,
        description: Option<String>,
        sync_policy: Option<SyncPolicy>,
    ) -> PersistenceResult<()>;
    async fn delete_pool(&self, id: PoolId) -> PersistenceResult<()>;
    async fn set_pool_target_state(
        &self,
        pool_id: PoolId,
        state_id: StateId,
    ) -> PersistenceResult<()>;

    // -- states --------------------------------------------------------------

    async fn save_state(&self, state: SystemState) -> PersistenceResult<StateId>;
    async fn get_state(&self, id: StateId) -> PersistenceResult<Option<SystemState>>;
    async fn get_endpoint_states(
        &self,
        endpoint_id: EndpointId,
        limit: i64,
    ) -> PersistenceResult<Vec<SystemState>>;

    // -- repositories ----------------------------------------------------

    async fn upsert_repository(&self, repo: Repository) -> PersistenceResult<Repository>;
    /// Full replacement of an endpoint's repository records in one
    /// transaction, per §4.3 `ingest_repositories`.
    async fn replace_repositories(
        &self,
        endpoint_id: EndpointId,
        repos: Vec<Repository>,
    ) -> PersistenceResult<Vec<Repository>>;
    async fn list_repositories_for_endpoint(
        &self,
        endpoint_id: EndpointId,
    ) -> PersistenceResult<Vec<Repository>>;
    async fn list_repositories_for_pool(
        &self,
        pool_id: PoolId,
    ) -> PersistenceResult<Vec<(EndpointId, Repository)>>;

    // -- sync operations -----------------------------------------------

    async fn create_operation(
        &self,
        pool_id: Option<PoolId>,
        endpoint_id: EndpointId,
        operation_type: OperationType,
    ) -> PersistenceResult<SyncOperation>;
    async fn get_operation(&self, id: OperationId) -> PersistenceResult<Option<SyncOperation>>;
    async fn list_operations_for_endpoint(
        &self,
        endpoint_id: EndpointId,
        limit: i64,
    ) -> PersistenceResult<Vec<SyncOperation>>;
    async fn list_operations_for_pool(
        &self,
        pool_id: PoolId,
        limit: i64,
    ) -> PersistenceResult<Vec<SyncOperation>>;
    async fn find_in_progress_operation(
        &self,
        endpoint_id: EndpointId,
    ) -> PersistenceResult<Option<SyncOperation>>;
    async fn find_next_pending_operation(
        &self,
        endpoint_id: EndpointId,
    ) -> PersistenceResult<Option<SyncOperation>>;
    async fn list_stale_in_progress_operations(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
    ) -> PersistenceResult<Vec<SyncOperation>>;
    async fn update_operation_progress(
        &self,
        id: OperationId,
        details: serde_json::Value,
    ) -> PersistenceResult<()>;
    /// Atomic compare-and-set on `status`: fails with `Conflict` if the
    /// operation is not currently in `expected_status`, enforcing the
    /// monotonic transition invariant at the storage boundary.
    async fn transition_operation(
        &self,
        id: OperationId,
        expected_status: OperationStatus,
        new_status: OperationStatus,
        error_message: Option<String>,
    ) -> PersistenceResult<()>;

    // -- schema -----------------------------------------------------------

    async fn run_migrations(&self) -> PersistenceResult<()>;
    async fn is_reachable(&self) -> bool;
}

/// Placeholder return type kept next to the trait it serves; the
/// repository analyzer owns the actual computation (§4.7), this crate
/// only stores the derived result if a caller chooses to cache it.
pub type CachedAnalysis = CompatibilityAnalysis;
