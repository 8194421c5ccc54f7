//! Endpoint registration, status reporting, and repository ingestion (§4.3).

use std::sync::Arc;

use auth::{Identity, TokenIssuer};
use chrono::Utc;
use persistence::Store;
use shared_types::{
    CoordinatorError, CoordinatorResult, Endpoint, EndpointId, PoolId, Repository,
    RepositoryId, RepositoryPackage, SyncStatus,
};

/// A repository descriptor as submitted by an endpoint, before an id is
/// assigned. `packages` absent or empty means a lightweight (mirrors-only)
/// submission; non-empty means heavyweight and authoritative.
#[derive(Debug, Clone)]
pub struct RepositorySubmission {
    pub repo_name: String,
    pub primary_url: String,
    pub mirrors: Vec<String>,
    pub packages: Vec<RepositoryPackage>,
}

pub struct EndpointManager {
    store: Arc<dyn Store>,
    tokens: Arc<TokenIssuer>,
}

impl EndpointManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tokens: Arc<TokenIssuer>) -> Self {
        Self { store, tokens }
    }

    /// Idempotent on `(name, hostname)`: a second call with identical
    /// arguments returns the same endpoint id with a fresh token (§8
    /// invariant 5, scenario S1).
    pub async fn register(&self, name: &str, hostname: &str) -> CoordinatorResult<(Endpoint, String)> {
        let endpoint = match self.store.find_endpoint_by_identity(name, hostname).await? {
            Some(existing) => {
                self.store.touch_last_seen(existing.id, Utc::now()).await?;
                self.store.get_endpoint(existing.id).await?.unwrap_or(existing)
            }
            None => self.store.create_endpoint(name, hostname).await?,
        };
        let token = self
            .tokens
            .issue(endpoint.id, endpoint.display_name())
            .map_err(CoordinatorError::from)?;
        Ok((endpoint, token))
    }

    pub async fn get(&self, id: EndpointId) -> CoordinatorResult<Endpoint> {
        self.store
            .get_endpoint(id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found(format!("endpoint {id}")))
    }

    pub async fn list(&self, pool_id: Option<PoolId>) -> CoordinatorResult<Vec<Endpoint>> {
        Ok(self.store.list_endpoints(pool_id).await?)
    }

    pub async fn update_status(
        &self,
        id: EndpointId,
        status: SyncStatus,
        requester: Identity,
    ) -> CoordinatorResult<()> {
        require_self(requester, id)?;
        self.store.update_endpoint_status(id, status).await?;
        Ok(())
    }

    pub async fn update_last_seen(&self, id: EndpointId, at: chrono::DateTime<Utc>) -> CoordinatorResult<()> {
        self.store.touch_last_seen(id, at).await?;
        Ok(())
    }

    /// Self or admin, per `DELETE /api/endpoints/{id}` in §6.
    pub async fn remove(&self, id: EndpointId, requester: Identity) -> CoordinatorResult<()> {
        if !requester.is_endpoint(id) && !requester.is_admin() {
            return Err(CoordinatorError::authorization(format!(
                "identity is not endpoint {id} or admin"
            )));
        }
        self.store.remove_endpoint(id).await?;
        Ok(())
    }

    pub async fn assign_to_pool(
        &self,
        id: EndpointId,
        pool_id: PoolId,
        requester: Identity,
    ) -> CoordinatorResult<()> {
        require_admin(requester)?;
        self.get(id).await?;
        self.store.set_endpoint_pool(id, Some(pool_id)).await?;
        Ok(())
    }

    pub async fn remove_from_pool(&self, id: EndpointId, requester: Identity) -> CoordinatorResult<()> {
        require_admin(requester)?;
        self.store.set_endpoint_pool(id, None).await?;
        Ok(())
    }

    /// Full replacement of an endpoint's repository records in one
    /// transaction (§4.3 `ingest_repositories`).
    pub async fn ingest_repositories(
        &self,
        id: EndpointId,
        submissions: Vec<RepositorySubmission>,
        requester: Identity,
    ) -> CoordinatorResult<Vec<Repository>> {
        require_self(requester, id)?;
        self.get(id).await?;

        let now = Utc::now();
        let repos = submissions
            .into_iter()
            .map(|submission| Repository {
                id: RepositoryId::new(),
                endpoint_id: id,
                repo_name: submission.repo_name,
                primary_url: submission.primary_url,
                authoritative: !submission.packages.is_empty(),
                mirrors: submission.mirrors,
                packages: submission.packages,
                last_updated: now,
            })
            .collect();

        Ok(self.store.replace_repositories(id, repos).await?)
    }

    pub async fn list_repositories(&self, id: EndpointId) -> CoordinatorResult<Vec<Repository>> {
        Ok(self.store.list_repositories_for_endpoint(id).await?)
    }
}

fn require_self(requester: Identity, id: EndpointId) -> CoordinatorResult<()> {
    if requester.is_endpoint(id) {
        Ok(())
    } else {
        Err(CoordinatorError::authorization(format!("identity is not endpoint {id}")))
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
    use sqlx::sqlite::SqlitePoolOptions;

    async fn manager() -> EndpointManager {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("pool");
        let store = persistence::SqliteStore::new(pool);
        store.run_migrations().await.expect("migrations");
        let tokens = TokenIssuer::new(b"endpoint-manager-test-secret-32b!".to_vec(), 3600);
        EndpointManager::new(Arc::new(store), Arc::new(tokens))
    }

    #[tokio::test]
    async fn register_is_idempotent_on_identity() {
        let manager = manager().await;
        let (first, token1) = manager.register("alpha", "h1").await.expect("first register");
        let (second, token2) = manager.register("alpha", "h1").await.expect("second register");
        assert_eq!(first.id, second.id);
        assert_ne!(token1, token2);
    }

    #[tokio::test]
    async fn self_only_update_status_rejects_other_endpoint() {
        let manager = manager().await;
        let (a, _) = manager.register("a", "h1").await.expect("register a");
        let (b, _) = manager.register("b", "h2").await.expect("register b");

        let err = manager
            .update_status(b.id, SyncStatus::InSync, Identity::Endpoint(a.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind, shared_types::ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn ingest_marks_heavyweight_submissions_authoritative() {
        let manager = manager().await;
        let (endpoint, _) = manager.register("a", "h1").await.expect("register");

        let repos = manager
            .ingest_repositories(
                endpoint.id,
                vec![RepositorySubmission {
                    repo_name: "core".to_string(),
                    primary_url: "https://mirror.example/core".to_string(),
                    mirrors: vec![],
                    packages: vec![RepositoryPackage {
                        name: "pkgX".to_string(),
                        version: "1.0".to_string(),
                        repository: "core".to_string(),
                        architecture: "x86_64".to_string(),
                        description: None,
                    }],
                }],
                Identity::Endpoint(endpoint.id),
            )
            .await
            .expect("ingest");
        assert!(repos[0].authoritative);
    }
}
