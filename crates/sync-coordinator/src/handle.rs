//! Public API the HTTP surface drives; internally forwards to the actor.

use std::sync::Arc;

use persistence::Store;
use shared_types::{
    CoordinatorError, CoordinatorResult, EndpointId, OperationId, OperationType, PoolId, SyncOperation,
};
use tokio::sync::{mpsc, oneshot};

use crate::command::{Command, Outcome};

#[derive(Clone)]
pub struct SyncCoordinatorHandle {
    store: Arc<dyn Store>,
    commands: mpsc::Sender<Command>,
}

impl SyncCoordinatorHandle {
    pub(crate) fn new(store: Arc<dyn Store>, commands: mpsc::Sender<Command>) -> Self {
        Self { store, commands }
    }

    pub async fn sync_to_latest(&self, endpoint_id: EndpointId) -> CoordinatorResult<SyncOperation> {
        let endpoint = self.require_endpoint(endpoint_id).await?;
        let pool_id = endpoint.pool_id.ok_or_else(|| CoordinatorError::conflict("endpoint is not in a pool"))?;
        let pool = self.store.get_pool(pool_id).await?.ok_or_else(|| CoordinatorError::not_found(format!("pool {pool_id}")))?;
        if pool.target_state_id.is_none() {
            return Err(CoordinatorError::conflict("pool has no target state"));
        }
        self.submit(Some(pool_id), endpoint_id, OperationType::Sync).await
    }

    pub async fn set_as_latest(&self, endpoint_id: EndpointId) -> CoordinatorResult<SyncOperation> {
        let endpoint = self.require_endpoint(endpoint_id).await?;
        let pool_id = endpoint.pool_id.ok_or_else(|| CoordinatorError::conflict("endpoint is not in a pool"))?;
        if self.store.get_endpoint_states(endpoint_id, 1).await?.is_empty() {
            return Err(CoordinatorError::conflict("endpoint has not submitted a state yet"));
        }
        self.submit(Some(pool_id), endpoint_id, OperationType::SetLatest).await
    }

    pub async fn revert_to_previous(&self, endpoint_id: EndpointId) -> CoordinatorResult<SyncOperation> {
        let endpoint = self.require_endpoint(endpoint_id).await?;
        let pool_id = endpoint.pool_id;
        if self.store.get_endpoint_states(endpoint_id, 2).await?.len() < 2 {
            return Err(CoordinatorError::conflict("no previous state to revert to"));
        }
        self.submit(pool_id, endpoint_id, OperationType::Revert).await
    }

    pub async fn cancel(&self, operation_id: OperationId) -> CoordinatorResult<()> {
        let (respond, receiver) = oneshot::channel();
        self.commands
            .send(Command::Cancel { operation_id, respond })
            .await
            .map_err(|_| CoordinatorError::internal("sync coordinator actor is gone"))?;
        receiver.await.map_err(|_| CoordinatorError::internal("sync coordinator actor dropped the response"))?
    }

    pub async fn report_progress(
        &self,
        operation_id: OperationId,
        stage: String,
        percentage: u8,
        current_action: String,
    ) -> CoordinatorResult<()> {
        let (respond, receiver) = oneshot::channel();
        self.commands
            .send(Command::Progress { operation_id, stage, percentage, current_action, respond })
            .await
            .map_err(|_| CoordinatorError::internal("sync coordinator actor is gone"))?;
        receiver.await.map_err(|_| CoordinatorError::internal("sync coordinator actor dropped the response"))?
    }

    pub async fn report_success(&self, operation_id: OperationId) -> CoordinatorResult<()> {
        self.report_outcome(operation_id, Outcome::Success).await
    }

    pub async fn report_failure(&self, operation_id: OperationId, error_message: String) -> CoordinatorResult<()> {
        self.report_outcome(operation_id, Outcome::Failure(error_message)).await
    }

    async fn report_outcome(&self, operation_id: OperationId, outcome: Outcome) -> CoordinatorResult<()> {
        let (respond, receiver) = oneshot::channel();
        self.commands
            .send(Command::Complete { operation_id, outcome, respond })
            .await
            .map_err(|_| CoordinatorError::internal("sync coordinator actor is gone"))?;
        receiver.await.map_err(|_| CoordinatorError::internal("sync coordinator actor dropped the response"))?
    }

    pub async fn get_operation(&self, operation_id: OperationId) -> CoordinatorResult<SyncOperation> {
        self.store
            .get_operation(operation_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("operation {operation_id}")))
    }

    pub async fn list_for_endpoint(&self, endpoint_id: EndpointId, limit: i64) -> CoordinatorResult<Vec<SyncOperation>> {
        Ok(self.store.list_operations_for_endpoint(endpoint_id, limit).await?)
    }

    pub async fn list_for_pool(&self, pool_id: PoolId, limit: i64) -> CoordinatorResult<Vec<SyncOperation>> {
        Ok(self.store.list_operations_for_pool(pool_id, limit).await?)
    }

    async fn submit(
        &self,
        pool_id: Option<PoolId>,
        endpoint_id: EndpointId,
        operation_type: OperationType,
    ) -> CoordinatorResult<SyncOperation> {
        let (respond, receiver) = oneshot::channel();
        self.commands
            .send(Command::Submit { pool_id, endpoint_id, operation_type, respond })
            .await
            .map_err(|_| CoordinatorError::internal("sync coordinator actor is gone"))?;
        receiver.await.map_err(|_| CoordinatorError::internal("sync coordinator actor dropped the response"))?
    }

    async fn require_endpoint(&self, endpoint_id: EndpointId) -> CoordinatorResult<shared_types::Endpoint> {
        self.store
            .get_endpoint(endpoint_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("endpoint {endpoint_id}")))
    }
}
