//! Process-wide directory of repositories with federated search.

use crate::asset::{AssetFilters, CulturalAsset};
use crate::repository::{ErcolanoRepository, Repository, RepositoryStatistics};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{debug, info, warn};

/// Outcome of a repository connection test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionHealth {
    Success,
    Warning,
    Error,
}

/// Human-readable connection test report.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub status: ConnectionHealth,
    pub message: String,
}

/// Ordered directory of registered repositories.
///
/// Read-mostly after initialization; writes happen only through
/// `register`/`unregister`, never from worker tasks. Insertion order is
/// preserved so federated results tie-break deterministically.
pub struct RepositoryRegistry {
    repositories: RwLock<Vec<Arc<dyn Repository>>>,
    initialized: AtomicBool,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self {
            repositories: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// The process-wide registry instance.
    pub fn global() -> &'static RepositoryRegistry {
        static REGISTRY: OnceLock<RepositoryRegistry> = OnceLock::new();
        REGISTRY.get_or_init(RepositoryRegistry::new)
    }

    /// Register the built-in repositories. Idempotent: later calls are no-ops.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Repository registry already initialized");
            return;
        }
        self.register(Arc::new(ErcolanoRepository::new()));
        info!("Repository registry initialized");
    }

    /// Add a repository; an existing repository with the same name
    /// (case-insensitive) is replaced in place.
    pub fn register(&self, repository: Arc<dyn Repository>) {
        let mut repos = self.repositories.write().unwrap();
        let name = repository.name().to_lowercase();
        if let Some(existing) = repos.iter_mut().find(|r| r.name().to_lowercase() == name) {
            *existing = repository;
        } else {
            debug!("Registered repository '{}'", name);
            repos.push(repository);
        }
    }

    /// Remove a repository by name. Returns whether anything was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut repos = self.repositories.write().unwrap();
        let lowered = name.to_lowercase();
        let before = repos.len();
        repos.retain(|r| r.name().to_lowercase() != lowered);
        repos.len() < before
    }

    /// Case-insensitive lookup.
    pub fn get_repository(&self, name: &str) -> Option<Arc<dyn Repository>> {
        let lowered = name.to_lowercase();
        self.repositories
            .read()
            .unwrap()
            .iter()
            .find(|r| r.name().to_lowercase() == lowered)
            .cloned()
    }

    /// Names of all registered repositories, in registration order.
    pub fn get_available_repositories(&self) -> Vec<String> {
        self.repositories
            .read()
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Repository>> {
        self.repositories.read().unwrap().clone()
    }

    /// Search every registered repository and merge the results.
    ///
    /// Results are sorted by quality score descending (stable, so equal
    /// scores keep repository registration order) and truncated to `limit`.
    /// A dead source contributes nothing; the others still answer.
    pub async fn search_all_repositories(
        &self,
        query: &str,
        filters: &AssetFilters,
        limit: usize,
    ) -> Vec<CulturalAsset> {
        if limit == 0 {
            return Vec::new();
        }

        let mut merged = Vec::new();
        for repository in self.snapshot() {
            let results = repository.search_assets(query, filters, limit).await;
            if results.is_empty() {
                warn!("Repository '{}' contributed no results", repository.name());
            }
            merged.extend(results);
        }

        merged.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));
        merged.truncate(limit);
        merged
    }

    /// Probe a repository by fetching a single asset.
    pub async fn test_repository_connection(&self, name: &str) -> ConnectionStatus {
        let Some(repository) = self.get_repository(name) else {
            return ConnectionStatus {
                status: ConnectionHealth::Error,
                message: format!("Repository not found: {name}"),
            };
        };

        let probe = repository.fetch_assets(1).await;
        if probe.is_empty() {
            ConnectionStatus {
                status: ConnectionHealth::Warning,
                message: format!("Repository '{name}' reachable but returned no assets"),
            }
        } else {
            ConnectionStatus {
                status: ConnectionHealth::Success,
                message: format!("Repository '{name}' responded"),
            }
        }
    }

    /// Aggregate statistics keyed by repository name.
    pub async fn get_repository_statistics(&self) -> HashMap<String, RepositoryStatistics> {
        let mut stats = HashMap::new();
        for repository in self.snapshot() {
            stats.insert(
                repository.name().to_string(),
                repository.get_statistics().await,
            );
        }
        stats
    }

    /// Drop all repositories and allow `initialize` to run again.
    ///
    /// Test hook; production code never clears the registry.
    pub fn reset(&self) {
        self.repositories.write().unwrap().clear();
        self.initialized.store(false, Ordering::SeqCst);
    }
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
