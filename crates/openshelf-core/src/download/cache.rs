//! Content-addressed on-disk cache for downloaded archives.
//!
//! Files are keyed by the MD5 fingerprint of their source URL. A JSON index
//! beside the files records timestamps and sizes; the index self-heals when
//! it drifts from the filesystem and resets to empty when corrupt.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::persist::{atomic_read_json, atomic_write_json};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Fingerprint a URL into its cache key.
pub fn cache_key(url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// One cached download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    /// Basename of the cached file under the cache directory.
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub size: u64,
    pub original_name: String,
}

/// Point-in-time cache metrics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub directory: PathBuf,
}

/// Cache health score with actionable recommendations.
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealthReport {
    /// 0-100; 100 means nothing to do.
    pub score: u8,
    pub recommendations: Vec<String>,
}

/// Content-addressed download cache with an on-disk JSON index.
///
/// The index file is the single source of truth: a file exists under the
/// cache directory iff its entry is present, and reads repair any drift.
pub struct DownloadCache {
    cache_dir: PathBuf,
    index: Mutex<HashMap<String, CacheEntry>>,
    max_size: u64,
    max_age: Duration,
}

impl DownloadCache {
    /// Open a cache rooted at `cache_dir` with default limits.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_limits(cache_dir, CacheConfig::MAX_SIZE_BYTES, CacheConfig::MAX_AGE)
    }

    /// Open a cache with explicit size and age limits.
    pub fn with_limits(
        cache_dir: impl Into<PathBuf>,
        max_size: u64,
        max_age: Duration,
    ) -> Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| crate::OpenShelfError::io_with_path(e, &cache_dir))?;

        let index_path = cache_dir.join(CacheConfig::INDEX_FILENAME);
        let index = match atomic_read_json::<HashMap<String, CacheEntry>>(&index_path) {
            Ok(Some(index)) => index,
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Cache index unreadable, resetting: {}", e);
                HashMap::new()
            }
        };

        Ok(Self {
            cache_dir,
            index: Mutex::new(index),
            max_size,
            max_age,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn index_path(&self) -> PathBuf {
        self.cache_dir.join(CacheConfig::INDEX_FILENAME)
    }

    fn persist_index(&self, index: &HashMap<String, CacheEntry>) {
        if let Err(e) = atomic_write_json(&self.index_path(), index) {
            warn!("Failed to persist cache index: {}", e);
        }
    }

    fn entry_is_expired(&self, entry: &CacheEntry) -> bool {
        let age = Utc::now().signed_duration_since(entry.timestamp);
        age.to_std().map_or(false, |age| age > self.max_age)
    }

    /// Whether a fresh cached copy of `url` exists on disk.
    ///
    /// Entries whose file vanished and entries past the age cap are dropped
    /// as a side effect.
    pub fn is_cached(&self, url: &str) -> bool {
        let key = cache_key(url);
        let mut index = self.index.lock().unwrap();

        let Some(entry) = index.get(&key) else {
            return false;
        };

        let file_path = self.cache_dir.join(&entry.filename);
        if !file_path.exists() {
            debug!("Cache entry for {} lost its file, dropping", url);
            index.remove(&key);
            self.persist_index(&index);
            return false;
        }

        if self.entry_is_expired(entry) {
            debug!("Cache entry for {} expired, evicting", url);
            index.remove(&key);
            let _ = std::fs::remove_file(&file_path);
            self.persist_index(&index);
            return false;
        }

        true
    }

    /// Path of the cached file for `url`, bumping its access time.
    pub fn get_cached_path(&self, url: &str) -> Option<PathBuf> {
        if !self.is_cached(url) {
            return None;
        }

        let key = cache_key(url);
        let mut index = self.index.lock().unwrap();
        let entry = index.get_mut(&key)?;
        entry.last_accessed = Utc::now();
        let path = self.cache_dir.join(&entry.filename);
        self.persist_index(&index);
        Some(path)
    }

    /// Copy a downloaded file into the cache and index it.
    ///
    /// Runs eviction once after the insert.
    pub fn add_to_cache(&self, url: &str, local_path: &Path) -> Result<PathBuf> {
        let key = cache_key(url);
        let original_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "download".to_string());
        let filename = format!("{key}_{original_name}");
        let cache_path = self.cache_dir.join(&filename);

        std::fs::copy(local_path, &cache_path)
            .map_err(|e| crate::OpenShelfError::io_with_path(e, &cache_path))?;
        let size = std::fs::metadata(&cache_path)
            .map_err(|e| crate::OpenShelfError::io_with_path(e, &cache_path))?
            .len();

        let now = Utc::now();
        let mut index = self.index.lock().unwrap();
        index.insert(
            key,
            CacheEntry {
                url: url.to_string(),
                filename,
                timestamp: now,
                last_accessed: now,
                size,
                original_name,
            },
        );
        self.evict_if_needed(&mut index);
        self.persist_index(&index);

        debug!("Cached {} ({} bytes)", url, size);
        Ok(cache_path)
    }

    /// Remove a single entry and its file (cancelled or poisoned download).
    pub fn remove(&self, url: &str) {
        let key = cache_key(url);
        let mut index = self.index.lock().unwrap();
        if let Some(entry) = index.remove(&key) {
            let _ = std::fs::remove_file(self.cache_dir.join(&entry.filename));
            self.persist_index(&index);
        }
    }

    /// Delete every known file and empty the index.
    pub fn clear_cache(&self) {
        let mut index = self.index.lock().unwrap();
        for entry in index.values() {
            let _ = std::fs::remove_file(self.cache_dir.join(&entry.filename));
        }
        index.clear();
        self.persist_index(&index);
    }

    /// Half-cull LRU: when the total size exceeds the cap, drop entries in
    /// ascending `last_accessed` order until at most half remain.
    fn evict_if_needed(&self, index: &mut HashMap<String, CacheEntry>) {
        let total: u64 = index.values().map(|e| e.size).sum();
        if total <= self.max_size || index.is_empty() {
            return;
        }

        let keep = (index.len() as f64 * CacheConfig::EVICTION_KEEP_RATIO) as usize;
        let mut by_age: Vec<(String, DateTime<Utc>)> = index
            .iter()
            .map(|(k, e)| (k.clone(), e.last_accessed))
            .collect();
        by_age.sort_by_key(|(_, accessed)| *accessed);

        let evict_count = index.len() - keep;
        for (key, _) in by_age.into_iter().take(evict_count) {
            if let Some(entry) = index.remove(&key) {
                let _ = std::fs::remove_file(self.cache_dir.join(&entry.filename));
                debug!("Evicted {} from cache", entry.url);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.index.lock().unwrap();
        CacheStats {
            file_count: index.len(),
            total_size_bytes: index.values().map(|e| e.size).sum(),
            max_size_bytes: self.max_size,
            directory: self.cache_dir.clone(),
        }
    }

    /// Score the cache and suggest maintenance actions.
    pub fn health_report(&self) -> CacheHealthReport {
        let index = self.index.lock().unwrap();
        let mut score: i32 = 100;
        let mut recommendations = Vec::new();

        let total: u64 = index.values().map(|e| e.size).sum();
        let fill = total as f64 / self.max_size as f64;
        if fill >= 0.9 {
            score -= 20;
            recommendations
                .push("Cache is nearly full; clear it or raise the size cap".to_string());
        } else if fill >= 0.75 {
            score -= 10;
            recommendations.push("Cache is over 75% full".to_string());
        }

        if !index.is_empty() {
            let now = Utc::now();
            let old = index
                .values()
                .filter(|e| {
                    now.signed_duration_since(e.last_accessed)
                        .to_std()
                        .map_or(false, |age| age >= Duration::from_secs(7 * 24 * 3600))
                })
                .count();
            if old * 2 > index.len() {
                score -= 15;
                recommendations
                    .push("More than half of cached files are unused; consider clearing".to_string());
            }

            let never_touched = index
                .values()
                .filter(|e| e.last_accessed == e.timestamp)
                .count();
            if never_touched as f64 > index.len() as f64 * 0.3 {
                score -= 10;
                recommendations
                    .push("Many cached files were never re-used after download".to_string());
            }
        }

        CacheHealthReport {
            score: score.clamp(0, 100) as u8,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![0u8; len]).unwrap();
        path
    }

    #[test]
    fn test_cache_key_is_md5_hex() {
        // md5("http://example.test/a.zip") is stable
        let key = cache_key("http://example.test/a.zip");
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key("http://example.test/a.zip"));
        assert_ne!(key, cache_key("http://example.test/b.zip"));
    }

    #[test]
    fn test_add_and_retrieve() {
        let tmp = TempDir::new().unwrap();
        let cache = DownloadCache::new(tmp.path().join("cache")).unwrap();
        let src = write_source(tmp.path(), "model.zip", 100);

        let url = "http://example.test/model.zip";
        assert!(!cache.is_cached(url));

        let cached = cache.add_to_cache(url, &src).unwrap();
        assert!(cached.exists());
        assert!(cache.is_cached(url));
        assert_eq!(cache.get_cached_path(url), Some(cached.clone()));

        let basename = cached.file_name().unwrap().to_string_lossy().to_string();
        assert!(basename.starts_with(&cache_key(url)));
        assert!(basename.ends_with("model.zip"));
    }

    #[test]
    fn test_index_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cache");
        let src = write_source(tmp.path(), "model.zip", 64);
        let url = "http://example.test/model.zip";

        {
            let cache = DownloadCache::new(&dir).unwrap();
            cache.add_to_cache(url, &src).unwrap();
        }

        let cache = DownloadCache::new(&dir).unwrap();
        assert!(cache.is_cached(url));
    }

    #[test]
    fn test_corrupt_index_resets_to_empty() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cache");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CacheConfig::INDEX_FILENAME), "{broken").unwrap();

        let cache = DownloadCache::new(&dir).unwrap();
        assert_eq!(cache.stats().file_count, 0);
    }

    #[test]
    fn test_self_heal_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let cache = DownloadCache::new(tmp.path().join("cache")).unwrap();
        let src = write_source(tmp.path(), "model.zip", 32);
        let url = "http://example.test/model.zip";

        let cached = cache.add_to_cache(url, &src).unwrap();
        std::fs::remove_file(&cached).unwrap();

        assert!(!cache.is_cached(url));
        assert_eq!(cache.stats().file_count, 0);
    }

    #[test]
    fn test_age_expiry() {
        let tmp = TempDir::new().unwrap();
        let cache =
            DownloadCache::with_limits(tmp.path().join("cache"), u64::MAX, Duration::ZERO)
                .unwrap();
        let src = write_source(tmp.path(), "model.zip", 32);
        let url = "http://example.test/model.zip";

        let cached = cache.add_to_cache(url, &src).unwrap();
        // Zero max-age: the entry is expired on the next read.
        std::thread::sleep(Duration::from_millis(5));
        assert!(!cache.is_cached(url));
        assert!(!cached.exists());
    }

    #[test]
    fn test_eviction_half_cull() {
        let tmp = TempDir::new().unwrap();
        // Cap of 250 bytes; three 100-byte files exceed it.
        let cache = DownloadCache::with_limits(
            tmp.path().join("cache"),
            250,
            Duration::from_secs(3600),
        )
        .unwrap();

        for i in 0..3 {
            let src = write_source(tmp.path(), &format!("m{i}.zip"), 100);
            cache
                .add_to_cache(&format!("http://example.test/m{i}.zip"), &src)
                .unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
        // Three entries, 300 bytes > 250: eviction culled down to half (1).
        assert!(cache.stats().file_count <= 2);

        let src = write_source(tmp.path(), "m3.zip", 100);
        cache
            .add_to_cache("http://example.test/m3.zip", &src)
            .unwrap();
        // Most recently added file survives eviction.
        assert!(cache.is_cached("http://example.test/m3.zip"));
    }

    #[test]
    fn test_clear_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = DownloadCache::new(tmp.path().join("cache")).unwrap();
        let src = write_source(tmp.path(), "model.zip", 32);
        let cached = cache
            .add_to_cache("http://example.test/model.zip", &src)
            .unwrap();

        cache.clear_cache();
        assert!(!cached.exists());
        assert_eq!(cache.stats().file_count, 0);
    }

    #[test]
    fn test_remove_single_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = DownloadCache::new(tmp.path().join("cache")).unwrap();
        let src = write_source(tmp.path(), "model.zip", 32);
        let url = "http://example.test/model.zip";
        let cached = cache.add_to_cache(url, &src).unwrap();

        cache.remove(url);
        assert!(!cached.exists());
        assert!(!cache.is_cached(url));
    }

    #[test]
    fn test_health_report_clean_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = DownloadCache::new(tmp.path().join("cache")).unwrap();
        let report = cache.health_report();
        assert_eq!(report.score, 100);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_health_report_full_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = DownloadCache::with_limits(
            tmp.path().join("cache"),
            1000,
            Duration::from_secs(3600),
        )
        .unwrap();
        let src = write_source(tmp.path(), "big.zip", 950);
        cache
            .add_to_cache("http://example.test/big.zip", &src)
            .unwrap();

        let report = cache.health_report();
        assert!(report.score < 100);
        assert!(!report.recommendations.is_empty());
    }
}
