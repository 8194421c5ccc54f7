//! Per-operation-type timeouts for stuck `in_progress` operations.

use chrono::Duration;
use shared_types::OperationType;

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub sync_timeout: Duration,
    pub set_latest_timeout: Duration,
    pub revert_timeout: Duration,
    pub poll_interval: std::time::Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::minutes(30),
            set_latest_timeout: Duration::minutes(2),
            revert_timeout: Duration::minutes(30),
            poll_interval: std::time::Duration::from_secs(30),
        }
    }
}

impl WatchdogConfig {
    #[must_use]
    pub fn timeout_for(&self, operation_type: OperationType) -> Duration {
        match operation_type {
            OperationType::Sync => self.sync_timeout,
            OperationType::SetLatest => self.set_latest_timeout,
            OperationType::Revert => self.revert_timeout,
        }
    }

    /// The widest of the three timeouts, used to bound the single
    /// persistence query the watchdog issues each tick; candidates
    /// narrower than their own type's timeout are filtered out in code.
    #[must_use]
    pub fn widest_timeout(&self) -> Duration {
        self.sync_timeout.max(self.set_latest_timeout).max(self.revert_timeout)
    }
}
