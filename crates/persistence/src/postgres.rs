//! PostgreSQL adapter: the multi-instance backend from §2.
//!
//! Mirrors `sqlite.rs` row for row; the two adapters diverge only in
//! parameter placeholder syntax (`$n` vs `?`) and a couple of native
//! integer widths, because every column is deliberately typed `TEXT`
//! or `INTEGER` identically in both migration sets.

use async_trait::async_trait;
use chrono::Utc;
use shared_types::{
    ConflictResolution, Endpoint, EndpointId, OperationId, OperationStatus, OperationType, PoolId,
    Repository, RepositoryId, RepositoryPackage, StateId, SyncOperation, SyncPolicy, SyncStatus,
    SystemState, PackageState,
};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::codec::{from_json, from_rfc3339, to_json, to_rfc3339};
use crate::error::{PersistenceError, PersistenceResult};
use crate::migrations::MIGRATIONS;
use crate::store::{NewPool, PoolRecord, Store};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn sync_status_str(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::InSync => "in_sync",
        SyncStatus::Ahead => "ahead",
        SyncStatus::Behind => "behind",
        SyncStatus::Offline => "offline",
    }
}

fn parse_sync_status(raw: &str) -> PersistenceResult<SyncStatus> {
    match raw {
        "in_sync" => Ok(SyncStatus::InSync),
        "ahead" => Ok(SyncStatus::Ahead),
        "behind" => Ok(SyncStatus::Behind),
        "offline" => Ok(SyncStatus::Offline),
        other => Err(PersistenceError::Corrupt {
            column: "sync_status",
            source: serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown sync_status {other}"),
            )),
        }),
    }
}

fn operation_type_str(t: OperationType) -> &'static str {
    match t {
        OperationType::Sync => "sync",
        OperationType::SetLatest => "set_latest",
        OperationType::Revert => "revert",
    }
}

fn parse_operation_type(raw: &str) -> PersistenceResult<OperationType> {
    match raw {
        "sync" => Ok(OperationType::Sync),
        "set_latest" => Ok(OperationType::SetLatest),
        "revert" => Ok(OperationType::Revert),
        other => Err(PersistenceError::Corrupt {
            column: "operation_type",
            source: serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown operation_type {other}"),
            )),
        }),
    }
}

fn operation_status_str(s: OperationStatus) -> &'static str {
    match s {
        OperationStatus::Pending => "pending",
        OperationStatus::InProgress => "in_progress",
        OperationStatus::Completed => "completed",
        OperationStatus::Failed => "failed",
    }
}

fn parse_operation_status(raw: &str) -> PersistenceResult<OperationStatus> {
    match raw {
        "pending" => Ok(OperationStatus::Pending),
        "in_progress" => Ok(OperationStatus::InProgress),
        "completed" => Ok(OperationStatus::Completed),
        "failed" => Ok(OperationStatus::Failed),
        other => Err(PersistenceError::Corrupt {
            column: "status",
            source: serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown status {other}"),
            )),
        }),
    }
}

fn endpoint_from_row(row: &PgRow) -> PersistenceResult<Endpoint> {
    let id: String = row.try_get("id").map_err(|e| PersistenceError::backend("decode endpoint", e))?;
    let pool_id: Option<String> = row
        .try_get("pool_id")
        .map_err(|e| PersistenceError::backend("decode endpoint", e))?;
    Ok(Endpoint {
        id: id.parse().map_err(|_| corrupt_uuid("id"))?,
        name: row.try_get("name").map_err(|e| PersistenceError::backend("decode endpoint", e))?,
        hostname: row.try_get("hostname").map_err(|e| PersistenceError::backend("decode endpoint", e))?,
        pool_id: pool_id.map(|p| p.parse::<PoolId>()).transpose().map_err(|_| corrupt_uuid("pool_id"))?,
        last_seen: from_rfc3339(
            &row.try_get::<String, _>("last_seen").map_err(|e| PersistenceError::backend("decode endpoint", e))?,
            "last_seen",
        )?,
        sync_status: parse_sync_status(
            &row.try_get::<String, _>("sync_status").map_err(|e| PersistenceError::backend("decode endpoint", e))?,
        )?,
        created_at: from_rfc3339(
            &row.try_get::<String, _>("created_at").map_err(|e| PersistenceError::backend("decode endpoint", e))?,
            "created_at",
        )?,
        updated_at: from_rfc3339(
            &row.try_get::<String, _>("updated_at").map_err(|e| PersistenceError::backend("decode endpoint", e))?,
            "updated_at",
        )?,
    })
}

fn corrupt_uuid(column: &'static str) -> PersistenceError {
    PersistenceError::Corrupt {
        column,
        source: serde_json::Error::io(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad uuid")),
    }
}

fn pool_from_row(row: &PgRow) -> PersistenceResult<PoolRecord> {
    let id: String = row.try_get("id").map_err(|e| PersistenceError::backend("decode pool", e))?;
    let target_state_id: Option<String> = row
        .try_get("target_state_id")
        .map_err(|e| PersistenceError::backend("decode pool", e))?;
    let sync_policy_raw: String =
        row.try_get("sync_policy").map_err(|e| PersistenceError::backend("decode pool", e))?;
    Ok(PoolRecord {
        id: id.parse().map_err(|_| corrupt_uuid("id"))?,
        name: row.try_get("name").map_err(|e| PersistenceError::backend("decode pool", e))?,
        description: row.try_get("description").map_err(|e| PersistenceError::backend("decode pool", e))?,
        target_state_id: target_state_id
            .map(|s| s.parse::<StateId>())
            .transpose()
            .map_err(|_| corrupt_uuid("target_state_id"))?,
        sync_policy: from_json::<SyncPolicy>(&sync_policy_raw, "sync_policy")?,
        created_at: from_rfc3339(
            &row.try_get::<String, _>("created_at").map_err(|e| PersistenceError::backend("decode pool", e))?,
            "created_at",
        )?,
        updated_at: from_rfc3339(
            &row.try_get::<String, _>("updated_at").map_err(|e| PersistenceError::backend("decode pool", e))?,
            "updated_at",
        )?,
    })
}

fn state_from_row(row: &PgRow) -> PersistenceResult<SystemState> {
    let id: String = row.try_get("id").map_err(|e| PersistenceError::backend("decode state", e))?;
    let endpoint_id: String =
        row.try_get("endpoint_id").map_err(|e| PersistenceError::backend("decode state", e))?;
    let state_data: String =
        row.try_get("state_data").map_err(|e| PersistenceError::backend("decode state", e))?;
    Ok(SystemState {
        id: id.parse().map_err(|_| corrupt_uuid("id"))?,
        endpoint_id: endpoint_id.parse().map_err(|_| corrupt_uuid("endpoint_id"))?,
        timestamp: from_rfc3339(
            &row.try_get::<String, _>("timestamp").map_err(|e| PersistenceError::backend("decode state", e))?,
            "timestamp",
        )?,
        pacman_version: row.try_get("pacman_version").map_err(|e| PersistenceError::backend("decode state", e))?,
        architecture: row.try_get("architecture").map_err(|e| PersistenceError::backend("decode state", e))?,
        packages: from_json::<Vec<PackageState>>(&state_data, "state_data")?,
    })
}

fn repository_from_row(row: &PgRow) -> PersistenceResult<Repository> {
    let id: String = row.try_get("id").map_err(|e| PersistenceError::backend("decode repository", e))?;
    let endpoint_id: String = row
        .try_get("endpoint_id")
        .map_err(|e| PersistenceError::backend("decode repository", e))?;
    let mirrors_raw: String = row.try_get("mirrors").map_err(|e| PersistenceError::backend("decode repository", e))?;
    let packages_raw: String =
        row.try_get("packages").map_err(|e| PersistenceError::backend("decode repository", e))?;
    let authoritative: i32 = row
        .try_get("authoritative")
        .map_err(|e| PersistenceError::backend("decode repository", e))?;
    Ok(Repository {
        id: id.parse().map_err(|_| corrupt_uuid("id"))?,
        endpoint_id: endpoint_id.parse().map_err(|_| corrupt_uuid("endpoint_id"))?,
        repo_name: row.try_get("repo_name").map_err(|e| PersistenceError::backend("decode repository", e))?,
        primary_url: row.try_get("primary_url").map_err(|e| PersistenceError::backend("decode repository", e))?,
        mirrors: from_json::<Vec<String>>(&mirrors_raw, "mirrors")?,
        packages: from_json::<Vec<RepositoryPackage>>(&packages_raw, "packages")?,
        last_updated: from_rfc3339(
            &row.try_get::<String, _>("last_updated").map_err(|e| PersistenceError::backend("decode repository", e))?,
            "last_updated",
        )?,
        authoritative: authoritative != 0,
    })
}

fn operation_from_row(row: &PgRow) -> PersistenceResult<SyncOperation> {
    let id: String = row.try_get("id").map_err(|e| PersistenceError::backend("decode operation", e))?;
    let pool_id: Option<String> =
        row.try_get("pool_id").map_err(|e| PersistenceError::backend("decode operation", e))?;
    let endpoint_id: String = row
        .try_get("endpoint_id")
        .map_err(|e| PersistenceError::backend("decode operation", e))?;
    let details_raw: String =
        row.try_get("details").map_err(|e| PersistenceError::backend("decode operation", e))?;
    let started_at: Option<String> = row
        .try_get("started_at")
        .map_err(|e| PersistenceError::backend("decode operation", e))?;
    let completed_at: Option<String> = row
        .try_get("completed_at")
        .map_err(|e| PersistenceError::backend("decode operation", e))?;
    Ok(SyncOperation {
        id: id.parse().map_err(|_| corrupt_uuid("id"))?,
        pool_id: pool_id.map(|p| p.parse::<PoolId>()).transpose().map_err(|_| corrupt_uuid("pool_id"))?,
        endpoint_id: endpoint_id.parse().map_err(|_| corrupt_uuid("endpoint_id"))?,
        operation_type: parse_operation_type(
            &row.try_get::<String, _>("operation_type").map_err(|e| PersistenceError::backend("decode operation", e))?,
        )?,
        status: parse_operation_status(
            &row.try_get::<String, _>("status").map_err(|e| PersistenceError::backend("decode operation", e))?,
        )?,
        details: from_json(&details_raw, "details")?,
        created_at: from_rfc3339(
            &row.try_get::<String, _>("created_at").map_err(|e| PersistenceError::backend("decode operation", e))?,
            "created_at",
        )?,
        started_at: started_at.map(|s| from_rfc3339(&s, "started_at")).transpose()?,
        completed_at: completed_at.map(|s| from_rfc3339(&s, "completed_at")).transpose()?,
        error_message: row
            .try_get("error_message")
            .map_err(|e| PersistenceError::backend("decode operation", e))?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_endpoint(&self, name: &str, hostname: &str) -> PersistenceResult<Endpoint> {
        let now = Utc::now();
        let endpoint = Endpoint {
            id: EndpointId::new(),
            name: name.to_string(),
            hostname: hostname.to_string(),
            pool_id: None,
            last_seen: now,
            sync_status: SyncStatus::Offline,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO endpoints (id, name, hostname, pool_id, last_seen, sync_status, created_at, updated_at)
             VALUES ($1, $2, $3, NULL, $4, $5, $6, $7)",
        )
        .bind(endpoint.id.to_string())
        .bind(&endpoint.name)
        .bind(&endpoint.hostname)
        .bind(to_rfc3339(endpoint.last_seen))
        .bind(sync_status_str(endpoint.sync_status))
        .bind(to_rfc3339(endpoint.created_at))
        .bind(to_rfc3339(endpoint.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("create_endpoint", e))?;
        Ok(endpoint)
    }

    async fn find_endpoint_by_identity(
        &self,
        name: &str,
        hostname: &str,
    ) -> PersistenceResult<Option<Endpoint>> {
        let row = sqlx::query("SELECT * FROM endpoints WHERE name = $1 AND hostname = $2")
            .bind(name)
            .bind(hostname)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("find_endpoint_by_identity", e))?;
        row.as_ref().map(endpoint_from_row).transpose()
    }

    async fn get_endpoint(&self, id: EndpointId) -> PersistenceResult<Option<Endpoint>> {
        let row = sqlx::query("SELECT * FROM endpoints WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("get_endpoint", e))?;
        row.as_ref().map(endpoint_from_row).transpose()
    }

    async fn list_endpoints(&self, pool_id: Option<PoolId>) -> PersistenceResult<Vec<Endpoint>> {
        let rows = match pool_id {
            Some(pid) => sqlx::query("SELECT * FROM endpoints WHERE pool_id = $1 ORDER BY created_at")
                .bind(pid.to_string())
                .fetch_all(&self.pool)
                .await,
            None => sqlx::query("SELECT * FROM endpoints ORDER BY created_at").fetch_all(&self.pool).await,
        }
        .map_err(|e| PersistenceError::backend("list_endpoints", e))?;
        rows.iter().map(endpoint_from_row).collect()
    }

    async fn update_endpoint_status(&self, id: EndpointId, status: SyncStatus) -> PersistenceResult<()> {
        let now = to_rfc3339(Utc::now());
        sqlx::query("UPDATE endpoints SET sync_status = $1, last_seen = $2, updated_at = $3 WHERE id = $4")
            .bind(sync_status_str(status))
            .bind(&now)
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("update_endpoint_status", e))?;
        Ok(())
    }

    async fn touch_last_seen(&self, id: EndpointId, at: chrono::DateTime<Utc>) -> PersistenceResult<()> {
        sqlx::query("UPDATE endpoints SET last_seen = $1 WHERE id = $2 AND last_seen < $1")
            .bind(to_rfc3339(at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("touch_last_seen", e))?;
        Ok(())
    }

    async fn set_endpoint_pool(&self, id: EndpointId, pool_id: Option<PoolId>) -> PersistenceResult<()> {
        sqlx::query("UPDATE endpoints SET pool_id = $1, updated_at = $2 WHERE id = $3")
            .bind(pool_id.map(|p| p.to_string()))
            .bind(to_rfc3339(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("set_endpoint_pool", e))?;
        Ok(())
    }

    async fn remove_endpoint(&self, id: EndpointId) -> PersistenceResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| PersistenceError::backend("remove_endpoint.begin", e))?;
        sqlx::query("DELETE FROM repositories WHERE endpoint_id = $1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::backend("remove_endpoint.repositories", e))?;
        sqlx::query("DELETE FROM endpoints WHERE id = $1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::backend("remove_endpoint.endpoint", e))?;
        tx.commit().await.map_err(|e| PersistenceError::backend("remove_endpoint.commit", e))?;
        Ok(())
    }

    async fn create_pool(&self, new_pool: NewPool) -> PersistenceResult<PoolRecord> {
        let now = Utc::now();
        let record = PoolRecord {
            id: PoolId::new(),
            name: new_pool.name,
            description: new_pool.description,
            target_state_id: None,
            sync_policy: new_pool.sync_policy,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO pools (id, name, description, target_state_id, sync_policy, created_at, updated_at)
             VALUES ($1, $2, $3, NULL, $4, $5, $6)",
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.description)
        .bind(to_json(&record.sync_policy))
        .bind(to_rfc3339(record.created_at))
        .bind(to_rfc3339(record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("create_pool", e))?;
        Ok(record)
    }

    async fn get_pool(&self, id: PoolId) -> PersistenceResult<Option<PoolRecord>> {
        let row = sqlx::query("SELECT * FROM pools WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("get_pool", e))?;
        row.as_ref().map(pool_from_row).transpose()
    }

    async fn get_pool_by_name(&self, name: &str) -> PersistenceResult<Option<PoolRecord>> {
        let row = sqlx::query("SELECT * FROM pools WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("get_pool_by_name", e))?;
        row.as_ref().map(pool_from_row).transpose()
    }

    async fn list_pools(&self) -> PersistenceResult<Vec<PoolRecord>> {
        let rows = sqlx::query("SELECT * FROM pools ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("list_pools", e))?;
        rows.iter().map(pool_from_row).collect()
    }

    async fn update_pool(
        &self,
        id: PoolId,
        description: Option<String>,
        sync_policy: Option<SyncPolicy>,
    ) -> PersistenceResult<()> {
        let current = self.get_pool(id).await?.ok_or_else(|| PersistenceError::NotFound(format!("pool {id}")))?;
        let description = description.unwrap_or(current.description);
        let sync_policy = sync_policy.unwrap_or(current.sync_policy);
        sqlx::query("UPDATE pools SET description = $1, sync_policy = $2, updated_at = $3 WHERE id = $4")
            .bind(description)
            .bind(to_json(&sync_policy))
            .bind(to_rfc3339(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("update_pool", e))?;
        Ok(())
    }

    async fn delete_pool(&self, id: PoolId) -> PersistenceResult<()> {
        sqlx::query("DELETE FROM pools WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("delete_pool", e))?;
        Ok(())
    }

    async fn set_pool_target_state(&self, pool_id: PoolId, state_id: StateId) -> PersistenceResult<()> {
        sqlx::query("UPDATE pools SET target_state_id = $1, updated_at = $2 WHERE id = $3")
            .bind(state_id.to_string())
            .bind(to_rfc3339(Utc::now()))
            .bind(pool_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("set_pool_target_state", e))?;
        Ok(())
    }

    async fn save_state(&self, state: SystemState) -> PersistenceResult<StateId> {
        sqlx::query(
            "INSERT INTO package_states (id, endpoint_id, timestamp, pacman_version, architecture, state_data, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(state.id.to_string())
        .bind(state.endpoint_id.to_string())
        .bind(to_rfc3339(state.timestamp))
        .bind(&state.pacman_version)
        .bind(&state.architecture)
        .bind(to_json(&state.packages))
        .bind(to_rfc3339(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("save_state", e))?;
        Ok(state.id)
    }

    async fn get_state(&self, id: StateId) -> PersistenceResult<Option<SystemState>> {
        let row = sqlx::query("SELECT * FROM package_states WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("get_state", e))?;
        row.as_ref().map(state_from_row).transpose()
    }

    async fn get_endpoint_states(&self, endpoint_id: EndpointId, limit: i64) -> PersistenceResult<Vec<SystemState>> {
        let rows = sqlx::query(
            "SELECT * FROM package_states WHERE endpoint_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(endpoint_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("get_endpoint_states", e))?;
        rows.iter().map(state_from_row).collect()
    }

    async fn upsert_repository(&self, repo: Repository) -> PersistenceResult<Repository> {
        let now = Utc::now();
        let existing = sqlx::query("SELECT id FROM repositories WHERE endpoint_id = $1 AND repo_name = $2")
            .bind(repo.endpoint_id.to_string())
            .bind(&repo.repo_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("upsert_repository.lookup", e))?;

        let id: String = match existing {
            Some(row) => row.try_get("id").map_err(|e| PersistenceError::backend("upsert_repository.id", e))?,
            None => repo.id.to_string(),
        };

        sqlx::query(
            "INSERT INTO repositories (id, endpoint_id, repo_name, primary_url, mirrors, packages, authoritative, last_updated)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (endpoint_id, repo_name) DO UPDATE SET
                primary_url = excluded.primary_url,
                mirrors = excluded.mirrors,
                packages = CASE WHEN excluded.authoritative = 1 THEN excluded.packages ELSE repositories.packages END,
                authoritative = CASE WHEN excluded.authoritative = 1 OR repositories.authoritative = 1 THEN 1 ELSE 0 END,
                last_updated = excluded.last_updated",
        )
        .bind(&id)
        .bind(repo.endpoint_id.to_string())
        .bind(&repo.repo_name)
        .bind(&repo.primary_url)
        .bind(to_json(&repo.mirrors))
        .bind(to_json(&repo.packages))
        .bind(repo.authoritative as i32)
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("upsert_repository", e))?;

        let row = sqlx::query("SELECT * FROM repositories WHERE id = $1")
            .bind(&id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("upsert_repository.reload", e))?;
        repository_from_row(&row)
    }

    async fn replace_repositories(
        &self,
        endpoint_id: EndpointId,
        repos: Vec<Repository>,
    ) -> PersistenceResult<Vec<Repository>> {
        let mut tx =
            self.pool.begin().await.map_err(|e| PersistenceError::backend("replace_repositories.begin", e))?;
        sqlx::query("DELETE FROM repositories WHERE endpoint_id = $1")
            .bind(endpoint_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::backend("replace_repositories.delete", e))?;

        let now = to_rfc3339(Utc::now());
        let mut stored = Vec::with_capacity(repos.len());
        for repo in repos {
            let id = RepositoryId::new();
            sqlx::query(
                "INSERT INTO repositories (id, endpoint_id, repo_name, primary_url, mirrors, packages, authoritative, last_updated)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(id.to_string())
            .bind(endpoint_id.to_string())
            .bind(&repo.repo_name)
            .bind(&repo.primary_url)
            .bind(to_json(&repo.mirrors))
            .bind(to_json(&repo.packages))
            .bind(repo.authoritative as i32)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::backend("replace_repositories.insert", e))?;
            stored.push(Repository { id, endpoint_id, ..repo });
        }
        tx.commit().await.map_err(|e| PersistenceError::backend("replace_repositories.commit", e))?;
        Ok(stored)
    }

    async fn list_repositories_for_endpoint(&self, endpoint_id: EndpointId) -> PersistenceResult<Vec<Repository>> {
        let rows = sqlx::query("SELECT * FROM repositories WHERE endpoint_id = $1 ORDER BY repo_name")
            .bind(endpoint_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("list_repositories_for_endpoint", e))?;
        rows.iter().map(repository_from_row).collect()
    }

    async fn list_repositories_for_pool(&self, pool_id: PoolId) -> PersistenceResult<Vec<(EndpointId, Repository)>> {
        let rows = sqlx::query(
            "SELECT r.* FROM repositories r
             JOIN endpoints e ON e.id = r.endpoint_id
             WHERE e.pool_id = $1
             ORDER BY r.endpoint_id, r.repo_name",
        )
        .bind(pool_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("list_repositories_for_pool", e))?;
        rows.iter().map(|row| repository_from_row(row).map(|repo| (repo.endpoint_id, repo))).collect()
    }

    async fn create_operation(
        &self,
        pool_id: Option<PoolId>,
        endpoint_id: EndpointId,
        operation_type: OperationType,
    ) -> PersistenceResult<SyncOperation> {
        let now = Utc::now();
        let op = SyncOperation {
            id: OperationId::new(),
            pool_id,
            endpoint_id,
            operation_type,
            status: OperationStatus::Pending,
            details: serde_json::json!({}),
            created_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        };
        sqlx::query(
            "INSERT INTO sync_operations (id, pool_id, endpoint_id, operation_type, status, details, created_at, started_at, completed_at, error_message)
             VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, NULL, NULL)",
        )
        .bind(op.id.to_string())
        .bind(op.pool_id.map(|p| p.to_string()))
        .bind(op.endpoint_id.to_string())
        .bind(operation_type_str(op.operation_type))
        .bind(operation_status_str(op.status))
        .bind(to_json(&op.details))
        .bind(to_rfc3339(op.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("create_operation", e))?;
        Ok(op)
    }

    async fn get_operation(&self, id: OperationId) -> PersistenceResult<Option<SyncOperation>> {
        let row = sqlx::query("SELECT * FROM sync_operations WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("get_operation", e))?;
        row.as_ref().map(operation_from_row).transpose()
    }

    async fn list_operations_for_endpoint(
        &self,
        endpoint_id: EndpointId,
        limit: i64,
    ) -> PersistenceResult<Vec<SyncOperation>> {
        let rows = sqlx::query("SELECT * FROM sync_operations WHERE endpoint_id = $1 ORDER BY created_at DESC LIMIT $2")
            .bind(endpoint_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("list_operations_for_endpoint", e))?;
        rows.iter().map(operation_from_row).collect()
    }

    async fn list_operations_for_pool(&self, pool_id: PoolId, limit: i64) -> PersistenceResult<Vec<SyncOperation>> {
        let rows = sqlx::query("SELECT * FROM sync_operations WHERE pool_id = $1 ORDER BY created_at DESC LIMIT $2")
            .bind(pool_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("list_operations_for_pool", e))?;
        rows.iter().map(operation_from_row).collect()
    }

    async fn find_in_progress_operation(&self, endpoint_id: EndpointId) -> PersistenceResult<Option<SyncOperation>> {
        let row = sqlx::query("SELECT * FROM sync_operations WHERE endpoint_id = $1 AND status = 'in_progress' LIMIT 1")
            .bind(endpoint_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("find_in_progress_operation", e))?;
        row.as_ref().map(operation_from_row).transpose()
    }

    async fn find_next_pending_operation(&self, endpoint_id: EndpointId) -> PersistenceResult<Option<SyncOperation>> {
        let row = sqlx::query(
            "SELECT * FROM sync_operations WHERE endpoint_id = $1 AND status = 'pending' ORDER BY created_at ASC LIMIT 1",
        )
        .bind(endpoint_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("find_next_pending_operation", e))?;
        row.as_ref().map(operation_from_row).transpose()
    }

    async fn list_stale_in_progress_operations(
        &self,
        older_than: chrono::DateTime<Utc>,
    ) -> PersistenceResult<Vec<SyncOperation>> {
        let rows = sqlx::query("SELECT * FROM sync_operations WHERE status = 'in_progress' AND started_at < $1")
            .bind(to_rfc3339(older_than))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("list_stale_in_progress_operations", e))?;
        rows.iter().map(operation_from_row).collect()
    }

    async fn update_operation_progress(&self, id: OperationId, details: serde_json::Value) -> PersistenceResult<()> {
        sqlx::query("UPDATE sync_operations SET details = $1 WHERE id = $2")
            .bind(to_json(&details))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::backend("update_operation_progress", e))?;
        Ok(())
    }

    async fn transition_operation(
        &self,
        id: OperationId,
        expected_status: OperationStatus,
        new_status: OperationStatus,
        error_message: Option<String>,
    ) -> PersistenceResult<()> {
        let completed_at = new_status.is_terminal().then(|| to_rfc3339(Utc::now()));
        let started_at = (new_status == OperationStatus::InProgress).then(|| to_rfc3339(Utc::now()));
        let result = sqlx::query(
            "UPDATE sync_operations SET status = $1, started_at = COALESCE($2, started_at), completed_at = $3, error_message = $4
             WHERE id = $5 AND status = $6",
        )
        .bind(operation_status_str(new_status))
        .bind(&started_at)
        .bind(&completed_at)
        .bind(&error_message)
        .bind(id.to_string())
        .bind(operation_status_str(expected_status))
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::backend("transition_operation", e))?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::Conflict(format!(
                "operation {id} is not in status {expected_status:?}"
            )));
        }
        Ok(())
    }

    async fn run_migrations(&self) -> PersistenceResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Migration(e.to_string()))?;

        for migration in MIGRATIONS {
            let already_applied: Option<(i32,)> =
                sqlx::query_as("SELECT version FROM schema_migrations WHERE version = $1")
                    .bind(migration.version as i32)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| PersistenceError::Migration(e.to_string()))?;
            if already_applied.is_some() {
                continue;
            }
            for statement in migration.postgres.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| PersistenceError::Migration(format!("{}: {e}", migration.name)))?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES ($1, $2, $3)")
                .bind(migration.version as i32)
                .bind(migration.name)
                .bind(to_rfc3339(Utc::now()))
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_reachable(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[allow(dead_code)]
fn _resolution_hint(_: ConflictResolution) {}
