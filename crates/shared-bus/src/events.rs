//! Event payloads broadcast over a per-endpoint channel.

use serde::{Deserialize, Serialize};
use shared_types::{OperationId, OperationType};

/// The five event kinds an endpoint's WebSocket session receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OperationEvent {
    OperationStarted {
        operation_id: OperationId,
        operation_type: OperationType,
    },
    OperationProgress {
        operation_id: OperationId,
        stage: String,
        percentage: u8,
        current_action: String,
    },
    OperationCompleted {
        operation_id: OperationId,
    },
    OperationFailed {
        operation_id: OperationId,
        error_message: String,
    },
    OperationCancelled {
        operation_id: OperationId,
    },
}

impl OperationEvent {
    #[must_use]
    pub fn operation_id(&self) -> OperationId {
        match self {
            OperationEvent::OperationStarted { operation_id, .. }
            | OperationEvent::OperationProgress { operation_id, .. }
            | OperationEvent::OperationCompleted { operation_id }
            | OperationEvent::OperationFailed { operation_id, .. }
            | OperationEvent::OperationCancelled { operation_id } => *operation_id,
        }
    }
}
