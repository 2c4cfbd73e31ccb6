//! Repository abstraction over remote museum catalogs.
//!
//! A repository normalizes one remote API into `CulturalAsset` records.
//! Implementations provide the raw fetch and parse; the trait supplies
//! filtered search, facet listings, and statistics on top.

pub mod ercolano;
pub mod registry;

use crate::asset::{AssetFilters, CulturalAsset, FilterKey};
use crate::config::FetchCacheConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use ercolano::ErcolanoRepository;
pub use registry::{ConnectionHealth, ConnectionStatus, RepositoryRegistry};

/// Number of candidates fetched when the whole catalog is needed
/// (facets, statistics, by-id lookup).
const FULL_FETCH_LIMIT: usize = 1000;

/// Static description of a repository source. Immutable after registration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub api_url: String,
    /// Never empty.
    pub supported_formats: Vec<String>,
    pub language: String,
    pub default_license: String,
}

/// Per-repository aggregate counts.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RepositoryStatistics {
    pub total_assets: usize,
    pub assets_with_3d: usize,
    pub object_types: HashMap<String, usize>,
    pub materials: HashMap<String, usize>,
    pub chronologies: HashMap<String, usize>,
}

/// A remote catalog normalized into `CulturalAsset` records.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Static source description.
    fn config(&self) -> &SourceConfig;

    /// Fetch up to `limit` raw catalog records, parsed and normalized.
    ///
    /// Network or parse failures are absorbed into an empty list and logged;
    /// this method never fails a federated search.
    async fn fetch_assets(&self, limit: usize) -> Vec<CulturalAsset>;

    /// Parse a raw catalog response into normalized records.
    fn parse_raw_data(&self, raw: &serde_json::Value) -> Result<Vec<CulturalAsset>>;

    /// Invalidate the fetch memoization.
    fn clear_cache(&self) {}

    /// Registered name of this repository.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Filtered search over the catalog.
    ///
    /// Fetches up to `2 * limit` candidates (cheaper than a second request),
    /// applies the filters, and stops once `limit` matches are collected.
    async fn search_assets(
        &self,
        query: &str,
        filters: &AssetFilters,
        limit: usize,
    ) -> Vec<CulturalAsset> {
        if limit == 0 {
            return Vec::new();
        }

        let mut filters = filters.clone();
        let query = query.trim();
        if !query.is_empty() && filters.search.as_deref().unwrap_or("").trim().is_empty() {
            filters.set(FilterKey::Search, query.to_string());
        }

        let candidates = self.fetch_assets(limit * 2).await;
        let mut matches = Vec::new();
        for asset in candidates {
            if asset.matches_filter(&filters) {
                matches.push(asset);
                if matches.len() >= limit {
                    break;
                }
            }
        }
        matches
    }

    /// Look up a single asset by its repository-scoped id.
    async fn get_asset_by_id(&self, asset_id: &str) -> Option<CulturalAsset> {
        self.fetch_assets(FULL_FETCH_LIMIT)
            .await
            .into_iter()
            .find(|a| a.id == asset_id)
    }

    /// Aggregate counts over the catalog.
    async fn get_statistics(&self) -> RepositoryStatistics {
        let assets = self.fetch_assets(FULL_FETCH_LIMIT).await;
        let mut stats = RepositoryStatistics {
            total_assets: assets.len(),
            ..Default::default()
        };
        for asset in &assets {
            if asset.has_3d_model() {
                stats.assets_with_3d += 1;
            }
            if !asset.object_type.is_empty() {
                *stats.object_types.entry(asset.object_type.clone()).or_insert(0) += 1;
            }
            for material in &asset.materials {
                *stats.materials.entry(material.clone()).or_insert(0) += 1;
            }
            for period in &asset.chronology {
                *stats.chronologies.entry(period.clone()).or_insert(0) += 1;
            }
        }
        stats
    }

    /// Distinct object types, sorted.
    async fn get_available_object_types(&self) -> Vec<String> {
        let assets = self.fetch_assets(FULL_FETCH_LIMIT).await;
        distinct(assets.iter().map(|a| a.object_type.clone()))
    }

    /// Distinct materials, sorted.
    async fn get_available_materials(&self) -> Vec<String> {
        let assets = self.fetch_assets(FULL_FETCH_LIMIT).await;
        distinct(assets.iter().flat_map(|a| a.materials.iter().cloned()))
    }

    /// Distinct chronology entries, sorted.
    async fn get_available_chronologies(&self) -> Vec<String> {
        let assets = self.fetch_assets(FULL_FETCH_LIMIT).await;
        distinct(assets.iter().flat_map(|a| a.chronology.iter().cloned()))
    }
}

fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: Vec<String> = values.filter(|v| !v.trim().is_empty()).collect();
    seen.sort();
    seen.dedup();
    seen
}

/// TTL memoization of `fetch_assets` results keyed by `(name, limit)`.
pub struct FetchCache {
    inner: mini_moka::sync::Cache<(String, usize), Arc<Vec<CulturalAsset>>>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self {
            inner: mini_moka::sync::Cache::builder()
                .max_capacity(FetchCacheConfig::MAX_ENTRIES)
                .time_to_live(FetchCacheConfig::TTL)
                .build(),
        }
    }

    pub fn get(&self, name: &str, limit: usize) -> Option<Arc<Vec<CulturalAsset>>> {
        self.inner.get(&(name.to_string(), limit))
    }

    pub fn insert(&self, name: &str, limit: usize, assets: Vec<CulturalAsset>) {
        self.inner
            .insert((name.to_string(), limit), Arc::new(assets));
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory repository used by registry and search tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Repository backed by a fixed asset list, counting fetches.
    pub struct StaticRepository {
        config: SourceConfig,
        assets: Vec<CulturalAsset>,
        pub fetch_count: AtomicUsize,
        /// When set, `fetch_assets` returns nothing (simulated dead source).
        pub fail: bool,
    }

    impl StaticRepository {
        pub fn new(name: &str, assets: Vec<CulturalAsset>) -> Self {
            Self {
                config: SourceConfig {
                    name: name.to_string(),
                    description: format!("{name} test repository"),
                    base_url: "http://catalog.test".to_string(),
                    api_url: "http://catalog.test/api".to_string(),
                    supported_formats: vec!["obj".to_string()],
                    language: "it".to_string(),
                    default_license: "CC BY 4.0".to_string(),
                },
                assets,
                fetch_count: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub fn failing(name: &str) -> Self {
            let mut repo = Self::new(name, Vec::new());
            repo.fail = true;
            repo
        }
    }

    #[async_trait]
    impl Repository for StaticRepository {
        fn config(&self) -> &SourceConfig {
            &self.config
        }

        async fn fetch_assets(&self, limit: usize) -> Vec<CulturalAsset> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Vec::new();
            }
            self.assets.iter().take(limit).cloned().collect()
        }

        fn parse_raw_data(&self, _raw: &serde_json::Value) -> Result<Vec<CulturalAsset>> {
            Ok(self.assets.clone())
        }
    }

    /// Build a minimal asset with the given id and quality score.
    pub fn asset(repo: &str, id: &str, quality: u8) -> CulturalAsset {
        let mut asset = CulturalAsset::new(id, repo).unwrap();
        asset.name = format!("asset {id}");
        asset.object_type = "vaso".to_string();
        asset.model_urls = vec![format!("http://catalog.test/{id}.zip")];
        asset.quality_score = quality;
        asset
    }
}
