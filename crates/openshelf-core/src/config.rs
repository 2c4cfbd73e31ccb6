//! Centralized configuration for OpenShelf Core.
//!
//! Constant blocks for network, cache, library, and pipeline parameters,
//! plus the host-visible `Preferences` record.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// User agent advertised on every catalog and archive request.
    pub const USER_AGENT: &'static str =
        concat!("OpenShelf/", env!("CARGO_PKG_VERSION"), " (Addon)");

    /// Timeout for catalog fetches.
    pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(30);
    /// Timeout for HEAD probes.
    pub const HEAD_TIMEOUT: Duration = Duration::from_secs(10);
    /// Suffix for in-flight temp files.
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    /// Sliding window length for download speed samples.
    pub const SPEED_SAMPLE_WINDOW: usize = 10;
}

/// Download cache configuration.
pub struct CacheConfig;

impl CacheConfig {
    pub const INDEX_FILENAME: &'static str = "cache_index.json";
    /// Size cap before eviction runs.
    pub const MAX_SIZE_BYTES: u64 = 500 * 1024 * 1024;
    /// Entries older than this are considered absent on read.
    pub const MAX_AGE: Duration = Duration::from_secs(7 * 24 * 3600);
    /// Eviction keeps at most this fraction of entries.
    pub const EVICTION_KEEP_RATIO: f64 = 0.5;
}

/// Local library configuration.
pub struct LibraryConfig;

impl LibraryConfig {
    pub const DEFAULT_DIR_NAME: &'static str = "OpenShelf_Library";
    pub const MODELS_DIR_NAME: &'static str = "models";
    pub const TEMP_DIR_NAME: &'static str = "temp";
    pub const ASSET_DIR_PREFIX: &'static str = "asset_";
    pub const METADATA_FILENAME: &'static str = "metadata.json";
    pub const LIBRARY_VERSION: &'static str = "1.0";
    /// Primary-file selection order within an asset folder.
    pub const MODEL_EXTENSIONS: &'static [&'static str] = &["obj", "gltf", "glb"];
}

/// Fetch memoization configuration.
pub struct FetchCacheConfig;

impl FetchCacheConfig {
    /// TTL for memoized `fetch_assets` results.
    pub const TTL: Duration = Duration::from_secs(3600);
    pub const MAX_ENTRIES: u64 = 64;
}

/// Acquisition pipeline configuration.
pub struct PipelineConfig;

impl PipelineConfig {
    /// Global timeout from pipeline start.
    pub const GLOBAL_TIMEOUT: Duration = Duration::from_secs(180);
    /// Per-step timeout from entering a state.
    pub const STEP_TIMEOUT: Duration = Duration::from_secs(90);

    /// Progress span occupied by the download state.
    pub const DOWNLOAD_SPAN: (u8, u8) = (5, 60);
    /// Progress span occupied by the extract state.
    pub const EXTRACT_SPAN: (u8, u8) = (60, 90);
    /// Progress span occupied by the import state.
    pub const IMPORT_SPAN: (u8, u8) = (90, 100);

    /// Recommended tick interval for the modal pipeline (20-50 Hz).
    pub const TICK_INTERVAL: Duration = Duration::from_millis(30);
    /// Recommended drain interval for the worker handoff path.
    pub const HANDOFF_POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// Minimum interval between UI redraws.
    pub const REDRAW_INTERVAL: Duration = Duration::from_millis(100);
}

/// Recognized host preferences and their effects on the core.
///
/// The host's preferences UI owns persistence; the core only consumes the
/// resolved values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Repository preselected in the search panel; empty means "all".
    pub default_repository: String,
    /// Download cache toggle.
    pub enable_cache: bool,
    /// Override for the cache directory; `None` uses the system temp dir.
    pub custom_cache_directory: Option<PathBuf>,
    /// Cache size cap in megabytes.
    pub cache_max_size_mb: u64,
    /// Cache age cap in days.
    pub cache_max_age_days: u64,
    /// Override for the library root; `None` uses `~/Documents/OpenShelf_Library`.
    pub local_library_path: Option<PathBuf>,
    /// Advisory concurrent-download budget.
    pub download_concurrent: u32,
    /// Per-repository request timeout in seconds.
    pub repository_timeout_secs: u64,
    /// Default import scale as a percentage.
    pub import_scale_percent: f32,
    pub auto_center: bool,
    pub auto_apply_materials: bool,
    pub add_cultural_metadata: bool,
    pub recalculate_normals: bool,
    /// Maximum results returned by a search.
    pub search_result_limit: usize,
    /// Assets below this quality score are filtered out of results.
    pub min_quality_score: u8,
    pub verify_ssl_certificates: bool,
    pub allow_http: bool,
    pub library_auto_save: bool,
    pub show_library_status: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_repository: String::new(),
            enable_cache: true,
            custom_cache_directory: None,
            cache_max_size_mb: 500,
            cache_max_age_days: 7,
            local_library_path: None,
            download_concurrent: 1,
            repository_timeout_secs: 30,
            import_scale_percent: 100.0,
            auto_center: true,
            auto_apply_materials: true,
            add_cultural_metadata: true,
            recalculate_normals: false,
            search_result_limit: 50,
            min_quality_score: 0,
            verify_ssl_certificates: true,
            allow_http: true,
            library_auto_save: true,
            show_library_status: true,
        }
    }
}
