//! Pool-wide repository compatibility analysis (§4.7).
//!
//! Every computation here is idempotent and side-effect-free: the
//! analyzer only reads endpoints and repository records and returns a
//! fresh view. Callers decide whether and how to cache the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use persistence::Store;
use shared_types::{
    CompatibilityAnalysis, ConflictResolution, CoordinatorError, CoordinatorResult, EndpointId,
    PackageConflict, PoolId,
};

pub type AvailabilityMatrix = BTreeMap<String, BTreeMap<EndpointId, Option<String>>>;

pub struct RepositoryAnalyzer {
    store: Arc<dyn Store>,
}

impl RepositoryAnalyzer {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn analyze(&self, pool_id: PoolId) -> CoordinatorResult<CompatibilityAnalysis> {
        let pool = self.store.get_pool(pool_id).await?.ok_or_else(|| CoordinatorError::not_found(format!("pool {pool_id}")))?;
        let per_endpoint = self.per_endpoint_package_versions(pool_id).await?;
        let total_endpoints = per_endpoint.len();

        let mut by_package: BTreeMap<String, BTreeMap<EndpointId, String>> = BTreeMap::new();
        for (endpoint_id, packages) in &per_endpoint {
            for (name, version) in packages {
                by_package.entry(name.clone()).or_default().insert(*endpoint_id, version.clone());
            }
        }

        let mut common_packages = Vec::new();
        let mut conflicts = Vec::new();
        for (name, endpoint_versions) in &by_package {
            let distinct_versions: std::collections::BTreeSet<&String> = endpoint_versions.values().collect();
            let is_conflict = endpoint_versions.len() >= 2 && distinct_versions.len() > 1;
            let is_common = endpoint_versions.len() == total_endpoints && total_endpoints > 0 && distinct_versions.len() == 1;

            if is_common {
                common_packages.push(name.clone());
            } else if is_conflict {
                let suggested_resolution = suggest_resolution(endpoint_versions, pool.sync_policy.conflict_resolution);
                conflicts.push(PackageConflict {
                    package_name: name.clone(),
                    endpoint_versions: endpoint_versions.clone(),
                    suggested_resolution,
                });
            }
        }

        let mut excluded_packages = pool.sync_policy.exclude_packages.clone();
        if pool.sync_policy.conflict_resolution == ConflictResolution::Manual {
            excluded_packages.extend(conflicts.iter().map(|c| c.package_name.clone()));
        }

        Ok(CompatibilityAnalysis {
            pool_id,
            common_packages,
            excluded_packages,
            conflicts,
            last_analyzed: Utc::now(),
        })
    }

    pub async fn availability_matrix(&self, pool_id: PoolId) -> CoordinatorResult<AvailabilityMatrix> {
        let per_endpoint = self.per_endpoint_package_versions(pool_id).await?;
        let all_endpoint_ids: Vec<EndpointId> = per_endpoint.keys().copied().collect();

        let mut matrix: AvailabilityMatrix = BTreeMap::new();
        for packages in per_endpoint.values() {
            for name in packages.keys() {
                matrix.entry(name.clone()).or_default();
            }
        }
        for (name, row) in matrix.iter_mut() {
            for endpoint_id in &all_endpoint_ids {
                let version = per_endpoint.get(endpoint_id).and_then(|pkgs| pkgs.get(name)).cloned();
                row.insert(*endpoint_id, version);
            }
        }
        Ok(matrix)
    }

    pub async fn excluded_packages(&self, pool_id: PoolId) -> CoordinatorResult<std::collections::BTreeSet<String>> {
        Ok(self.analyze(pool_id).await?.excluded_packages)
    }

    pub async fn conflicts(&self, pool_id: PoolId) -> CoordinatorResult<Vec<PackageConflict>> {
        Ok(self.analyze(pool_id).await?.conflicts)
    }

    /// For each pool member, the union of `(package_name -> version)`
    /// across its repository records. When the same package appears in
    /// more than one repository owned by the same endpoint, the first
    /// one encountered wins.
    async fn per_endpoint_package_versions(
        &self,
        pool_id: PoolId,
    ) -> CoordinatorResult<BTreeMap<EndpointId, BTreeMap<String, String>>> {
        let members = self.store.list_endpoints(Some(pool_id)).await?;
        let mut result = BTreeMap::new();
        for endpoint in members {
            let repos = self.store.list_repositories_for_endpoint(endpoint.id).await?;
            let mut packages = BTreeMap::new();
            for repo in repos {
                for pkg in repo.packages {
                    packages.entry(pkg.name).or_insert(pkg.version);
                }
            }
            result.insert(endpoint.id, packages);
        }
        Ok(result)
    }
}

/// `newest`/`oldest` fall back to lexicographic comparison when no
/// package-manager version comparator is available (§4.7).
fn suggest_resolution(
    versions: &BTreeMap<EndpointId, String>,
    policy: ConflictResolution,
) -> Option<String> {
    match policy {
        ConflictResolution::Manual => None,
        ConflictResolution::Newest => versions.values().max().cloned(),
        ConflictResolution::Oldest => versions.values().min().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{RepositoryPackage, SyncPolicy};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> (RepositoryAnalyzer, PoolId) {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let store = persistence::SqliteStore::new(pool);
        store.run_migrations().await.unwrap();
        let store: Arc<dyn Store> = Arc::new(store);

        let mut sync_policy = SyncPolicy::default();
        sync_policy.conflict_resolution = shared_types::ConflictResolution::Newest;
        let pool_record = store
            .create_pool(persistence::NewPool { name: "fleet".to_string(), description: String::new(), sync_policy })
            .await
            .unwrap();

        let e1 = store.create_endpoint("e1", "h1").await.unwrap();
        let e2 = store.create_endpoint("e2", "h2").await.unwrap();
        store.set_endpoint_pool(e1.id, Some(pool_record.id)).await.unwrap();
        store.set_endpoint_pool(e2.id, Some(pool_record.id)).await.unwrap();

        let pkg = |version: &str| RepositoryPackage {
            name: "pkgX".to_string(),
            version: version.to_string(),
            repository: "core".to_string(),
            architecture: "x86_64".to_string(),
            description: None,
        };
        store
            .replace_repositories(
                e1.id,
                vec![shared_types::Repository {
                    id: shared_types::RepositoryId::new(),
                    endpoint_id: e1.id,
                    repo_name: "core".to_string(),
                    primary_url: "https://e1/core".to_string(),
                    mirrors: vec![],
                    packages: vec![pkg("1.0")],
                    last_updated: Utc::now(),
                    authoritative: true,
                }],
            )
            .await
            .unwrap();
        store
            .replace_repositories(
                e2.id,
                vec![shared_types::Repository {
                    id: shared_types::RepositoryId::new(),
                    endpoint_id: e2.id,
                    repo_name: "core".to_string(),
                    primary_url: "https://e2/core".to_string(),
                    mirrors: vec![],
                    packages: vec![pkg("2.0")],
                    last_updated: Utc::now(),
                    authoritative: true,
                }],
            )
            .await
            .unwrap();

        (RepositoryAnalyzer::new(store), pool_record.id)
    }

    #[tokio::test]
    async fn differing_versions_produce_a_newest_suggested_conflict() {
        let (analyzer, pool_id) = seeded_pool().await;
        let analysis = analyzer.analyze(pool_id).await.unwrap();
        assert!(analysis.common_packages.is_empty());
        assert_eq!(analysis.conflicts.len(), 1);
        assert_eq!(analysis.conflicts[0].package_name, "pkgX");
        assert_eq!(analysis.conflicts[0].suggested_resolution.as_deref(), Some("2.0"));
    }

    #[tokio::test]
    async fn availability_matrix_lists_every_member() {
        let (analyzer, pool_id) = seeded_pool().await;
        let matrix = analyzer.availability_matrix(pool_id).await.unwrap();
        let row = matrix.get("pkgX").expect("pkgX present");
        assert_eq!(row.len(), 2);
        assert!(row.values().all(|v| v.is_some()));
    }
}
