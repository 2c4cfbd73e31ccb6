//! Search orchestration between the UI and the repository layer.
//!
//! `run_search` dispatches the query onto the runtime; the UI timer calls
//! `poll` until the worker publishes its result list. `apply_filter` and
//! `clear_filters` are pure in-memory operations over the authoritative
//! assets cache.

use crate::asset::{AssetFilters, CulturalAsset, FilterKey};
use crate::error::{OpenShelfError, Result};
use crate::host::SceneStateStore;
use crate::repository::registry::RepositoryRegistry;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const DEFAULT_RESULT_LIMIT: usize = 50;

#[derive(Default)]
struct SearchShared {
    in_flight: bool,
    outcome: Option<Vec<CulturalAsset>>,
}

/// Drives searches from UI state and publishes results back into it.
pub struct SearchController {
    runtime: tokio::runtime::Handle,
    result_limit: usize,
    shared: Arc<Mutex<SearchShared>>,
}

impl SearchController {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self::with_limit(runtime, DEFAULT_RESULT_LIMIT)
    }

    pub fn with_limit(runtime: tokio::runtime::Handle, result_limit: usize) -> Self {
        Self {
            runtime,
            result_limit,
            shared: Arc::new(Mutex::new(SearchShared::default())),
        }
    }

    pub fn is_searching(&self) -> bool {
        self.shared.lock().unwrap().in_flight
    }

    /// Collect the filter fields the UI currently shows.
    pub fn filters_from_store(store: &dyn SceneStateStore) -> AssetFilters {
        let mut filters = AssetFilters::default();
        filters.set(FilterKey::Search, store.search_text());
        filters.set(FilterKey::ObjectType, store.filter_object_type());
        filters.set(FilterKey::Material, store.filter_material());
        filters.set(FilterKey::Chronology, store.filter_chronology());
        filters.set(FilterKey::Inventory, store.filter_inventory());
        filters
    }

    /// Kick off a search. Rejected while one is running or when every
    /// filter field is blank.
    pub fn run_search(&self, store: &mut dyn SceneStateStore) -> Result<()> {
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.in_flight {
                return Err(OpenShelfError::Precondition {
                    message: "a search is already running".to_string(),
                });
            }
            let filters = Self::filters_from_store(store);
            if filters.is_empty() {
                return Err(OpenShelfError::Precondition {
                    message: "enter at least one search term or filter".to_string(),
                });
            }
            shared.in_flight = true;
            shared.outcome = None;
        }

        store.set_is_searching(true);
        store.set_status_message("Searching...");

        let filters = Self::filters_from_store(store);
        let source = store.active_repository();
        let limit = self.result_limit;
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            let registry = RepositoryRegistry::global();
            registry.initialize();

            let results = if source.is_empty() || source.eq_ignore_ascii_case("all") {
                registry.search_all_repositories("", &filters, limit).await
            } else {
                match registry.get_repository(&source) {
                    Some(repository) => repository.search_assets("", &filters, limit).await,
                    None => {
                        warn!("Unknown repository selected: {}", source);
                        Vec::new()
                    }
                }
            };

            debug!("Search finished with {} results", results.len());
            let mut shared = shared.lock().unwrap();
            shared.outcome = Some(results);
            shared.in_flight = false;
        });
        Ok(())
    }

    /// Drain a finished search into the store. Returns true when results
    /// landed on this call.
    pub fn poll(&self, store: &mut dyn SceneStateStore) -> bool {
        let results = {
            let mut shared = self.shared.lock().unwrap();
            match shared.outcome.take() {
                Some(results) => results,
                None => return false,
            }
        };

        let count = results.len();
        store.set_assets_cache(results.clone());
        store.set_search_results(results);
        store.set_selected_result_index(0);
        store.set_is_searching(false);
        store.set_status_message(&match count {
            0 => "No results found".to_string(),
            1 => "Found 1 result".to_string(),
            n => format!("Found {n} results"),
        });
        true
    }

    /// Re-filter the authoritative cache into the visible list. Never
    /// touches the network.
    pub fn apply_filter(store: &mut dyn SceneStateStore) {
        let filters = Self::filters_from_store(store);
        let visible: Vec<CulturalAsset> = store
            .assets_cache()
            .into_iter()
            .filter(|asset| asset.matches_filter(&filters))
            .collect();
        store.set_selected_result_index(0);
        store.set_search_results(visible);
    }

    /// Restore the visible list from the authoritative cache.
    pub fn clear_filters(store: &mut dyn SceneStateStore) {
        let cache = store.assets_cache();
        store.set_selected_result_index(0);
        store.set_search_results(cache);
    }
}
