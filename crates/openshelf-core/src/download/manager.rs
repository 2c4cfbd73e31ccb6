//! HTTP download manager with progress, cancellation, and cache integration.

use crate::config::NetworkConfig;
use crate::download::cache::DownloadCache;
use crate::download::progress::{format_bytes, DownloadProgress};
use crate::error::{OpenShelfError, Result};
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of a HEAD probe. Never an error: failures land in `available`.
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub size_bytes: Option<u64>,
    pub size_human: String,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub available: bool,
    pub error: Option<String>,
}

/// Whether a model URL is worth attempting (non-blank, HTTP or HTTPS).
pub fn is_supported_url(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() {
        return false;
    }
    matches!(
        url::Url::parse(raw).map(|u| u.scheme().to_string()),
        Ok(scheme) if scheme == "http" || scheme == "https"
    )
}

/// Streams archives to disk with chunk-boundary cancellation.
///
/// Each manager owns a per-session temp directory for in-flight files;
/// completed downloads either move into the content-addressed cache or stay
/// in the session directory for the caller to consume.
pub struct DownloadManager {
    client: reqwest::Client,
    head_client: reqwest::Client,
    cache: Option<Arc<DownloadCache>>,
    session_dir: PathBuf,
}

impl DownloadManager {
    /// Create a manager; `cache` enables content-addressed reuse.
    pub fn new(cache: Option<Arc<DownloadCache>>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .connect_timeout(NetworkConfig::HEAD_TIMEOUT)
            .build()
            .map_err(|e| OpenShelfError::Network {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(e),
            })?;
        let head_client = reqwest::Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .timeout(NetworkConfig::HEAD_TIMEOUT)
            .build()
            .map_err(|e| OpenShelfError::Network {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(e),
            })?;

        let session_dir =
            std::env::temp_dir().join(format!("openshelf_{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&session_dir)
            .map_err(|e| OpenShelfError::io_with_path(e, &session_dir))?;

        Ok(Self {
            client,
            head_client,
            cache,
            session_dir,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn cache(&self) -> Option<&Arc<DownloadCache>> {
        self.cache.as_ref()
    }

    /// Probe a URL with a HEAD request.
    pub async fn get_file_info_quick(&self, url: &str) -> FileInfo {
        let response = match self.head_client.head(url).send().await {
            Ok(response) => response,
            Err(e) => {
                return FileInfo {
                    available: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        if !response.status().is_success() {
            return FileInfo {
                available: false,
                error: Some(format!("HEAD returned {}", response.status())),
                ..Default::default()
            };
        }

        let size_bytes = response.content_length();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        FileInfo {
            size_bytes,
            size_human: size_bytes.map(format_bytes).unwrap_or_default(),
            content_type: header("content-type"),
            last_modified: header("last-modified"),
            available: true,
            error: None,
        }
    }

    /// Download `url`, returning the local path of the completed file.
    ///
    /// With `use_cache`, a fresh cached copy short-circuits the network (the
    /// progress record sees one `(size, size)` update) and a successful
    /// download is inserted into the cache. Cancellation stops at the next
    /// chunk boundary, removes the partial file, and returns `Cancelled`.
    pub async fn download_file(
        &self,
        url: &str,
        use_cache: bool,
        progress: &DownloadProgress,
    ) -> Result<PathBuf> {
        if use_cache {
            if let Some(cache) = &self.cache {
                if let Some(path) = cache.get_cached_path(url) {
                    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    progress.record(size, Some(size));
                    info!("Cache hit for {}", url);
                    return Ok(path);
                }
            }
        }

        let basename = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download.zip");
        let final_path = self.session_dir.join(basename);
        let temp_path = self.session_dir.join(format!(
            "{basename}{}",
            NetworkConfig::DOWNLOAD_TEMP_SUFFIX
        ));

        let result = self.stream_to(url, &temp_path, progress).await;
        match result {
            Ok(()) => {}
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                return Err(e);
            }
        }

        std::fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            OpenShelfError::io_with_path(e, &final_path)
        })?;

        if use_cache {
            if let Some(cache) = &self.cache {
                match cache.add_to_cache(url, &final_path) {
                    Ok(cache_path) => {
                        let _ = std::fs::remove_file(&final_path);
                        return Ok(cache_path);
                    }
                    Err(e) => warn!("Failed to cache {}: {}", url, e),
                }
            }
        }

        Ok(final_path)
    }

    async fn stream_to(
        &self,
        url: &str,
        temp_path: &Path,
        progress: &DownloadProgress,
    ) -> Result<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OpenShelfError::DownloadFailed {
                url: url.to_string(),
                message: format!("server returned {status}"),
            });
        }

        let total = response.content_length();
        let mut file = std::fs::File::create(temp_path)
            .map_err(|e| OpenShelfError::io_with_path(e, temp_path))?;

        let mut downloaded: u64 = 0;
        progress.record(0, total);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            progress.cancel_token().check()?;

            let chunk = chunk.map_err(|e| OpenShelfError::Network {
                message: format!("error reading download stream: {e}"),
                source: Some(e),
            })?;
            file.write_all(&chunk)
                .map_err(|e| OpenShelfError::io_with_path(e, temp_path))?;

            downloaded += chunk.len() as u64;
            progress.record(downloaded, total);
        }

        file.flush()
            .map_err(|e| OpenShelfError::io_with_path(e, temp_path))?;
        debug!("Downloaded {} bytes from {}", downloaded, url);
        Ok(())
    }

    /// Recursively find files under `dir` matching any of `extensions`
    /// (leading dots and case are normalized). Paths come back sorted.
    pub fn find_files_by_extension(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        let wanted: Vec<String> = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();

        let mut found: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| wanted.iter().any(|w| w == &ext.to_lowercase()))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        found
    }

    /// Best-effort removal of the session temp directory.
    pub fn cleanup(&self) {
        let _ = std::fs::remove_dir_all(&self.session_dir);
    }
}

impl Drop for DownloadManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}
