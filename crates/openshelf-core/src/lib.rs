//! OpenShelf Core - In-application browser for cultural-heritage 3D artifacts.
//!
//! This crate provides the headless core: repository catalogs normalized into
//! [`CulturalAsset`] records, federated search, a content-addressed download
//! cache, a persistent local library with metadata sidecars, and the modal
//! acquisition pipeline that moves a selected asset into the host scene.
//!
//! The embedding application supplies the scene-side collaborators
//! ([`ModelImporter`], [`SceneStateStore`]) and drives the pipeline from its
//! UI timer.
//!
//! # Example
//!
//! ```rust,ignore
//! use openshelf_core::{AssetFilters, FilterKey, RepositoryRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = RepositoryRegistry::global();
//!     registry.initialize();
//!
//!     let mut filters = AssetFilters::default();
//!     filters.set(FilterKey::ObjectType, "anello".to_string());
//!
//!     let results = registry.search_all_repositories("", &filters, 10).await;
//!     for asset in results {
//!         println!("{} (quality {})", asset.display_name(), asset.quality_score);
//!     }
//! }
//! ```

pub mod annotate;
pub mod asset;
pub mod cancel;
pub mod config;
pub mod download;
pub mod error;
pub mod host;
pub mod library;
pub mod persist;
pub mod pipeline;
pub mod repository;
pub mod search;
pub mod ui;

// Re-export commonly used types
pub use annotate::attach_cultural_metadata;
pub use asset::{AssetFilters, CulturalAsset, FilterKey};
pub use cancel::CancellationToken;
pub use config::{
    CacheConfig, FetchCacheConfig, LibraryConfig, NetworkConfig, PipelineConfig, Preferences,
};
pub use download::{
    cache_key, extract_archive, format_bytes, DownloadCache, DownloadManager, DownloadProgress,
    FileInfo, ProgressSnapshot,
};
pub use error::{OpenShelfError, Result};
pub use host::{
    ImportSettings, MemorySceneObject, MemoryStateStore, ModelImporter, PropertyValue,
    SceneObject, SceneStateStore,
};
pub use library::{AssetSidecar, LibraryStats, LocalLibraryManager};
pub use pipeline::{
    DrainOutcome, ImportHandoff, ImportPacket, ModalAcquisitionPipeline, PipelineState,
};
pub use repository::ercolano::ErcolanoRepository;
pub use repository::registry::{ConnectionHealth, ConnectionStatus, RepositoryRegistry};
pub use repository::{Repository, RepositoryStatistics, SourceConfig};
pub use search::SearchController;
pub use ui::{ResponsiveTimer, UiState};
