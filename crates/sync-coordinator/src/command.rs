//! Messages the actor accepts, per the design notes' redesign guidance:
//! message passing over a channel of {Submit, Cancel, Progress, Complete}
//! rather than shared mutable maps guarded by locks.

use shared_types::{CoordinatorResult, EndpointId, OperationId, OperationType, PoolId, SyncOperation};
use tokio::sync::oneshot;

pub enum Outcome {
    Success,
    Failure(String),
}

pub enum Command {
    Submit {
        pool_id: Option<PoolId>,
        endpoint_id: EndpointId,
        operation_type: OperationType,
        respond: oneshot::Sender<CoordinatorResult<SyncOperation>>,
    },
    Cancel {
        operation_id: OperationId,
        respond: oneshot::Sender<CoordinatorResult<()>>,
    },
    Progress {
        operation_id: OperationId,
        stage: String,
        percentage: u8,
        current_action: String,
        respond: oneshot::Sender<CoordinatorResult<()>>,
    },
    Complete {
        operation_id: OperationId,
        outcome: Outcome,
        respond: oneshot::Sender<CoordinatorResult<()>>,
    },
}
