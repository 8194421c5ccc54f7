//! The long-lived task owning the operation queue and event broadcast,
//! per the design notes' redesign guidance for the Sync Coordinator.

use std::sync::Arc;

use chrono::Utc;
use persistence::Store;
use shared_bus::{EventPublisher, OperationEvent};
use shared_types::{CoordinatorError, CoordinatorResult, EndpointId, OperationStatus, OperationType};
use tokio::sync::mpsc;

use crate::command::{Command, Outcome};
use crate::watchdog::WatchdogConfig;

pub struct Actor {
    store: Arc<dyn Store>,
    events: Arc<dyn EventPublisher>,
    watchdog: WatchdogConfig,
    commands: mpsc::Receiver<Command>,
}

impl Actor {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventPublisher>,
        watchdog: WatchdogConfig,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self { store, events, watchdog, commands }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.watchdog.poll_interval);
        loop {
            tokio::select! {
                maybe_cmd = self.commands.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle(cmd).await,
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.sweep_timeouts().await;
                }
            }
        }
    }

    async fn handle(&self, cmd: Command) {
        match cmd {
            Command::Submit { pool_id, endpoint_id, operation_type, respond } => {
                let result = self.submit(pool_id, endpoint_id, operation_type).await;
                let _ = respond.send(result);
            }
            Command::Cancel { operation_id, respond } => {
                let result = self.cancel(operation_id).await;
                let _ = respond.send(result);
            }
            Command::Progress { operation_id, stage, percentage, current_action, respond } => {
                let result = self.progress(operation_id, stage, percentage, current_action).await;
                let _ = respond.send(result);
            }
            Command::Complete { operation_id, outcome, respond } => {
                let result = self.complete(operation_id, outcome).await;
                let _ = respond.send(result);
            }
        }
    }

    async fn submit(
        &self,
        pool_id: Option<shared_types::PoolId>,
        endpoint_id: EndpointId,
        operation_type: OperationType,
    ) -> CoordinatorResult<shared_types::SyncOperation> {
        let created = self.store.create_operation(pool_id, endpoint_id, operation_type).await?;
        self.try_pick_up(endpoint_id).await?;
        Ok(self.store.get_operation(created.id).await?.unwrap_or(created))
    }

    async fn cancel(&self, operation_id: shared_types::OperationId) -> CoordinatorResult<()> {
        match self
            .store
            .transition_operation(operation_id, OperationStatus::Pending, OperationStatus::Failed, Some("cancelled".to_string()))
            .await
        {
            Ok(()) => {
                self.events
                    .publish(self.endpoint_of(operation_id).await?, OperationEvent::OperationCancelled { operation_id })
                    .await;
                Ok(())
            }
            Err(persistence::PersistenceError::Conflict(_)) => {
                Err(CoordinatorError::validation("operation cannot be cancelled"))
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn progress(
        &self,
        operation_id: shared_types::OperationId,
        stage: String,
        percentage: u8,
        current_action: String,
    ) -> CoordinatorResult<()> {
        let op = self
            .store
            .get_operation(operation_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("operation {operation_id}")))?;
        if op.status != OperationStatus::InProgress {
            return Err(CoordinatorError::conflict("operation is not in progress"));
        }
        self.store
            .update_operation_progress(
                operation_id,
                serde_json::json!({ "stage": stage, "percentage": percentage, "current_action": current_action }),
            )
            .await?;
        self.events
            .publish(op.endpoint_id, OperationEvent::OperationProgress { operation_id, stage, percentage, current_action })
            .await;
        Ok(())
    }

    async fn complete(&self, operation_id: shared_types::OperationId, outcome: Outcome) -> CoordinatorResult<()> {
        let op = self
            .store
            .get_operation(operation_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("operation {operation_id}")))?;

        let (new_status, error_message, event) = match outcome {
            Outcome::Success => (OperationStatus::Completed, None, OperationEvent::OperationCompleted { operation_id }),
            Outcome::Failure(message) => (
                OperationStatus::Failed,
                Some(message.clone()),
                OperationEvent::OperationFailed { operation_id, error_message: message },
            ),
        };

        self.store
            .transition_operation(operation_id, OperationStatus::InProgress, new_status, error_message)
            .await?;

        if new_status == OperationStatus::Completed && op.operation_type == OperationType::SetLatest {
            if let Some(pool_id) = op.pool_id {
                if let Some(latest) = self.store.get_endpoint_states(op.endpoint_id, 1).await?.into_iter().next() {
                    self.store.set_pool_target_state(pool_id, latest.id).await?;
                }
            }
        }

        self.events.publish(op.endpoint_id, event).await;
        self.try_pick_up(op.endpoint_id).await?;
        Ok(())
    }

    /// Picks up the next pending operation for an endpoint if none is
    /// currently in progress, enforcing at-most-one-in-progress and FIFO
    /// submission order (§4.6, §8 invariant 1).
    async fn try_pick_up(&self, endpoint_id: EndpointId) -> CoordinatorResult<()> {
        if self.store.find_in_progress_operation(endpoint_id).await?.is_some() {
            return Ok(());
        }
        let Some(next) = self.store.find_next_pending_operation(endpoint_id).await? else {
            return Ok(());
        };
        match self
            .store
            .transition_operation(next.id, OperationStatus::Pending, OperationStatus::InProgress, None)
            .await
        {
            Ok(()) => {
                self.events
                    .publish(endpoint_id, OperationEvent::OperationStarted { operation_id: next.id, operation_type: next.operation_type })
                    .await;
                Ok(())
            }
            // Another pickup already won the race; not an error.
            Err(persistence::PersistenceError::Conflict(_)) => Ok(()),
            Err(other) => Err(other.into()),
        }
    }

    /// Fails operations that have sat `in_progress` past their
    /// operation-type timeout, measured from `started_at` (when the op
    /// left the per-endpoint queue), not `created_at` — a queued op can
    /// otherwise inherit an already-elapsed clock from time spent
    /// waiting behind another in-flight operation.
    async fn sweep_timeouts(&self) {
        let threshold = Utc::now() - self.watchdog.widest_timeout();
        let stale = match self.store.list_stale_in_progress_operations(threshold).await {
            Ok(ops) => ops,
            Err(err) => {
                tracing::warn!(%err, "watchdog failed to list stale operations");
                return;
            }
        };

        for op in stale {
            let started_at = op.started_at.unwrap_or(op.created_at);
            let deadline = started_at + self.watchdog.timeout_for(op.operation_type);
            if Utc::now() < deadline {
                continue;
            }
            let result = self
                .store
                .transition_operation(op.id, OperationStatus::InProgress, OperationStatus::Failed, Some("timeout".to_string()))
                .await;
            if result.is_ok() {
                self.events
                    .publish(op.endpoint_id, OperationEvent::OperationFailed { operation_id: op.id, error_message: "timeout".to_string() })
                    .await;
                if let Err(err) = self.try_pick_up(op.endpoint_id).await {
                    tracing::warn!(%err, endpoint_id = %op.endpoint_id, "watchdog pickup after timeout failed");
                }
            }
        }
    }

    async fn endpoint_of(&self, operation_id: shared_types::OperationId) -> CoordinatorResult<EndpointId> {
        Ok(self
            .store
            .get_operation(operation_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("operation {operation_id}")))?
            .endpoint_id)
    }
}
