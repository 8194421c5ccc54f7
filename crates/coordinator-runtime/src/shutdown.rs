//! Graceful shutdown: stop accepting new work, wait a bounded grace
//! period for `in_progress` operations to finish on their own, then
//! mark survivors `failed(error_message="shutdown")` (§5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use persistence::Store;
use shared_types::OperationStatus;
use tracing::{info, warn};

static SIGINT_RECEIVED: AtomicBool = AtomicBool::new(false);

pub fn received_sigint() -> bool {
    SIGINT_RECEIVED.load(Ordering::Relaxed)
}

/// Resolves once either signal fires; `axum::serve`'s graceful shutdown
/// future drops the accept loop as soon as this returns.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            SIGINT_RECEIVED.store(true, Ordering::Relaxed);
            info!("received SIGINT, starting graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Polls for operations still `in_progress` after the accept loop has
/// drained, giving endpoints up to `grace_period` to self-report
/// completion before the coordinator force-fails the rest.
pub async fn fail_surviving_operations(store: &dyn Store, grace_period: Duration) {
    let deadline = tokio::time::Instant::now() + grace_period;
    let poll_interval = Duration::from_secs(1);

    loop {
        let survivors = match store.list_stale_in_progress_operations(Utc::now()).await {
            Ok(survivors) => survivors,
            Err(err) => {
                warn!(error = %err, "failed to list in-progress operations during shutdown");
                return;
            }
        };

        if survivors.is_empty() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            info!(count = survivors.len(), "grace period elapsed, failing surviving operations");
            for operation in survivors {
                let result = store
                    .transition_operation(operation.id, OperationStatus::InProgress, OperationStatus::Failed, Some("shutdown".to_string()))
                    .await;
                if let Err(err) = result {
                    warn!(operation_id = %operation.id, error = %err, "failed to mark operation failed during shutdown");
                }
            }
            return;
        }

        tokio::time::sleep(poll_interval).await;
    }
}
