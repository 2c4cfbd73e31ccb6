//! Download subsystem: content-addressed cache, streaming manager,
//! archive extraction, and shared progress records.

pub mod cache;
pub mod extract;
pub mod manager;
pub mod progress;

pub use cache::{cache_key, CacheEntry, CacheHealthReport, CacheStats, DownloadCache};
pub use extract::extract_archive;
pub use manager::{is_supported_url, DownloadManager, FileInfo};
pub use progress::{format_bytes, DownloadProgress, ProgressSnapshot};
