//! Core domain entities.
//!
//! Mirrors the data model: `Endpoint`, `Pool`, `SyncPolicy`, `PackageState`,
//! `SystemState`, `Repository`, `RepositoryPackage`, `SyncOperation`,
//! `CompatibilityAnalysis`, `PackageConflict`, and their enums.

use crate::ids::{EndpointId, OperationId, PoolId, RepositoryId, StateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An endpoint's self-reported convergence status relative to its pool's
/// target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InSync,
    Ahead,
    Behind,
    Offline,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Offline
    }
}

/// The three sync directives the coordinator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Sync,
    SetLatest,
    Revert,
}

/// Operation lifecycle states. Transitions are monotonic: `Pending` ->
/// `InProgress` -> {`Completed` | `Failed`}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Whether `self -> next` is a legal forward transition.
    #[must_use]
    pub fn can_transition_to(self, next: OperationStatus) -> bool {
        matches!(
            (self, next),
            (OperationStatus::Pending, OperationStatus::InProgress)
                | (OperationStatus::Pending, OperationStatus::Failed)
                | (OperationStatus::InProgress, OperationStatus::Completed)
                | (OperationStatus::InProgress, OperationStatus::Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }
}

/// Conflict resolution policy for a pool's repository analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Manual,
    Newest,
    Oldest,
}

/// Pool-wide sync policy, embedded in `Pool`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    pub auto_sync: bool,
    pub exclude_packages: BTreeSet<String>,
    pub include_aur: bool,
    pub conflict_resolution: ConflictResolution,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            auto_sync: false,
            exclude_packages: BTreeSet::new(),
            include_aur: false,
            conflict_resolution: ConflictResolution::Manual,
        }
    }
}

/// A managed machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub name: String,
    pub hostname: String,
    pub pool_id: Option<PoolId>,
    pub last_seen: DateTime<Utc>,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    /// The canonical human-readable identity for this endpoint: its
    /// `name` alone. See DESIGN.md, Open Question #2.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.name
    }
}

/// A named group of endpoints sharing a sync policy and target state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    pub description: String,
    pub endpoint_ids: Vec<EndpointId>,
    pub target_state_id: Option<StateId>,
    pub sync_policy: SyncPolicy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable package entry captured within a `SystemState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageState {
    pub package_name: String,
    pub version: String,
    pub repository: String,
    pub installed_size: u64,
    pub dependencies: Vec<String>,
}

/// An immutable, append-only snapshot of an endpoint's installed packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub id: StateId,
    pub endpoint_id: EndpointId,
    pub timestamp: DateTime<Utc>,
    pub pacman_version: String,
    pub architecture: String,
    pub packages: Vec<PackageState>,
}

/// An immutable package entry within a `Repository` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPackage {
    pub name: String,
    pub version: String,
    pub repository: String,
    pub architecture: String,
    pub description: Option<String>,
}

/// An endpoint's view of a named package repository. Upserted keyed on
/// `(endpoint_id, repo_name)`; a new submission replaces prior contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub endpoint_id: EndpointId,
    pub repo_name: String,
    pub primary_url: String,
    pub mirrors: Vec<String>,
    pub packages: Vec<RepositoryPackage>,
    pub last_updated: DateTime<Utc>,
    /// True when `packages` was submitted as a full listing (the
    /// "heavyweight" submission). False means this record only updated
    /// `mirrors`/`primary_url` (the "lightweight" submission) and its
    /// `packages` field retains whatever was last submitted
    /// authoritatively. See DESIGN.md, Open Question #1.
    pub authoritative: bool,
}

/// A directive tracked through the sync operation state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: OperationId,
    pub pool_id: Option<PoolId>,
    pub endpoint_id: EndpointId,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// When this operation last entered `in_progress`. Watchdog timeouts
    /// (§4.6) are measured from here, not from `created_at`, since an
    /// operation can sit `pending` in an endpoint's FIFO queue for an
    /// unbounded time before pickup.
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// A package name in conflict across ≥2 endpoints of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConflict {
    pub package_name: String,
    pub endpoint_versions: BTreeMap<EndpointId, String>,
    pub suggested_resolution: Option<String>,
}

/// Derived cross-endpoint compatibility view for a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityAnalysis {
    pub pool_id: PoolId,
    pub common_packages: Vec<String>,
    pub excluded_packages: BTreeSet<String>,
    pub conflicts: Vec<PackageConflict>,
    pub last_analyzed: DateTime<Utc>,
}

/// Rollup status for a pool, computed on demand by the pool manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolOverallStatus {
    Empty,
    FullySynced,
    PartiallySynced,
    OutOfSync,
    AllOffline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRollupStatus {
    pub pool_id: PoolId,
    pub overall: PoolOverallStatus,
    pub sync_percentage: f64,
    pub total_endpoints: usize,
    pub in_sync: usize,
    pub ahead: usize,
    pub behind: usize,
    pub offline: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_status_forward_transitions_only() {
        assert!(OperationStatus::Pending.can_transition_to(OperationStatus::InProgress));
        assert!(OperationStatus::InProgress.can_transition_to(OperationStatus::Completed));
        assert!(!OperationStatus::Completed.can_transition_to(OperationStatus::Pending));
        assert!(!OperationStatus::Failed.can_transition_to(OperationStatus::InProgress));
    }

    #[test]
    fn terminal_states() {
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::InProgress.is_terminal());
    }
}
