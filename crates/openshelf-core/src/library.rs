//! Persistent local library of downloaded assets.
//!
//! Each asset owns a folder under `models/` holding its 3D files and a
//! `metadata.json` sidecar; `temp/` holds in-flight downloads. An asset is
//! "in library" iff its folder has the sidecar and at least one supported
//! 3D file.

use crate::asset::CulturalAsset;
use crate::config::LibraryConfig;
use crate::download::manager::is_supported_url;
use crate::download::{extract_archive, DownloadManager, DownloadProgress};
use crate::error::{OpenShelfError, Result};
use crate::persist::{atomic_read_json, atomic_write_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// `metadata.json` sidecar: the full asset record plus download provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSidecar {
    #[serde(flatten)]
    pub asset: CulturalAsset,
    pub downloaded_at: DateTime<Utc>,
    pub library_version: String,
    pub source_urls: Vec<String>,
    /// Filenames (relative to the asset folder) present at download time.
    pub files: Vec<String>,
}

/// Library-wide metrics.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub asset_count: usize,
    pub total_size_bytes: u64,
    pub root: PathBuf,
    pub exists: bool,
}

/// Manages the on-disk asset library.
pub struct LocalLibraryManager {
    root: PathBuf,
}

impl LocalLibraryManager {
    /// Open (creating if needed) the library at `root`, or at
    /// `~/Documents/OpenShelf_Library` when `root` is `None`.
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => default_library_root(),
        };
        std::fs::create_dir_all(root.join(LibraryConfig::MODELS_DIR_NAME))
            .map_err(|e| OpenShelfError::io_with_path(e, &root))?;
        std::fs::create_dir_all(root.join(LibraryConfig::TEMP_DIR_NAME))
            .map_err(|e| OpenShelfError::io_with_path(e, &root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder that holds (or would hold) the given asset.
    pub fn asset_dir(&self, asset_id: &str) -> PathBuf {
        self.root.join(LibraryConfig::MODELS_DIR_NAME).join(format!(
            "{}{}",
            LibraryConfig::ASSET_DIR_PREFIX,
            sanitize_asset_id(asset_id)
        ))
    }

    fn sidecar_path(&self, asset_id: &str) -> PathBuf {
        self.asset_dir(asset_id)
            .join(LibraryConfig::METADATA_FILENAME)
    }

    /// Whether the asset is fully present: folder, sidecar, and at least
    /// one supported 3D file.
    pub fn is_asset_downloaded(&self, asset_id: &str) -> bool {
        let dir = self.asset_dir(asset_id);
        dir.is_dir() && self.sidecar_path(asset_id).is_file() && self.primary_file(asset_id).is_some()
    }

    /// The canonical 3D file for an asset, chosen by extension priority
    /// (`.obj`, then `.gltf`, then `.glb`).
    pub fn primary_file(&self, asset_id: &str) -> Option<PathBuf> {
        let dir = self.asset_dir(asset_id);
        primary_file_in(&dir)
    }

    /// Download an asset into the library, trying `urls` in order.
    ///
    /// Idempotent: an already-downloaded asset returns its primary file
    /// without touching the network. Otherwise the archive is fetched into a
    /// fresh temp dir, extracted, verified to contain a supported 3D file,
    /// and the extracted tree is moved into the asset folder together with
    /// the metadata sidecar.
    pub async fn download_asset_to_library(
        &self,
        asset: &CulturalAsset,
        urls: &[String],
        manager: &DownloadManager,
        progress: &DownloadProgress,
    ) -> Result<PathBuf> {
        if self.is_asset_downloaded(&asset.id) {
            debug!("Asset {} already in library", asset.id);
            return self
                .primary_file(&asset.id)
                .ok_or_else(|| OpenShelfError::NoSupportedFile(self.asset_dir(&asset.id)));
        }

        let temp_dir = self
            .root
            .join(LibraryConfig::TEMP_DIR_NAME)
            .join(uuid::Uuid::new_v4().simple().to_string());
        std::fs::create_dir_all(&temp_dir)
            .map_err(|e| OpenShelfError::io_with_path(e, &temp_dir))?;

        let result = self
            .acquire_into(asset, urls, manager, progress, &temp_dir)
            .await;
        let _ = std::fs::remove_dir_all(&temp_dir);
        result
    }

    async fn acquire_into(
        &self,
        asset: &CulturalAsset,
        urls: &[String],
        manager: &DownloadManager,
        progress: &DownloadProgress,
        temp_dir: &Path,
    ) -> Result<PathBuf> {
        let mut archive = None;
        let mut last_error = None;
        for url in urls.iter().filter(|u| is_supported_url(u)) {
            match manager.download_file(url, true, progress).await {
                Ok(path) => {
                    archive = Some(path);
                    break;
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("Download failed for {}: {}", url, e);
                    last_error = Some(e);
                }
            }
        }
        let archive = archive.ok_or_else(|| {
            last_error.unwrap_or_else(|| OpenShelfError::DownloadFailed {
                url: String::new(),
                message: "no usable model URL".to_string(),
            })
        })?;

        let extracted = temp_dir.join("extracted");
        extract_archive(&archive, &extracted, progress.cancel_token(), |_, _| {})?;

        let model_files = DownloadManager::find_files_by_extension(
            &extracted,
            LibraryConfig::MODEL_EXTENSIONS,
        );
        if model_files.is_empty() {
            return Err(OpenShelfError::NoSupportedFile(extracted));
        }

        let asset_dir = self.asset_dir(&asset.id);
        copy_tree(&extracted, &asset_dir)?;

        let files = WalkDir::new(&asset_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&asset_dir)
                    .ok()
                    .map(|p| p.to_string_lossy().to_string())
            })
            .collect();

        let sidecar = AssetSidecar {
            asset: asset.clone(),
            downloaded_at: Utc::now(),
            library_version: LibraryConfig::LIBRARY_VERSION.to_string(),
            source_urls: urls.to_vec(),
            files,
        };
        atomic_write_json(&self.sidecar_path(&asset.id), &sidecar)?;

        info!("Asset {} stored in library", asset.id);
        self.primary_file(&asset.id)
            .ok_or_else(|| OpenShelfError::NoSupportedFile(asset_dir))
    }

    /// Read the sidecar for an asset, or `None` when absent or unreadable.
    pub fn get_asset_metadata(&self, asset_id: &str) -> Option<AssetSidecar> {
        match atomic_read_json(&self.sidecar_path(asset_id)) {
            Ok(sidecar) => sidecar,
            Err(e) => {
                warn!("Unreadable sidecar for {}: {}", asset_id, e);
                None
            }
        }
    }

    /// Delete an asset folder. Returns whether anything was removed.
    pub fn remove_asset(&self, asset_id: &str) -> bool {
        let dir = self.asset_dir(asset_id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).is_ok()
        } else {
            false
        }
    }

    /// Enumerate every sidecar in the library.
    pub fn list_assets(&self) -> Vec<AssetSidecar> {
        let models = self.root.join(LibraryConfig::MODELS_DIR_NAME);
        let mut assets: Vec<AssetSidecar> = WalkDir::new(&models)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() == LibraryConfig::METADATA_FILENAME)
            .filter_map(|e| atomic_read_json(e.path()).ok().flatten())
            .collect();
        assets.sort_by(|a: &AssetSidecar, b: &AssetSidecar| a.asset.id.cmp(&b.asset.id));
        assets
    }

    pub fn get_library_stats(&self) -> LibraryStats {
        let models = self.root.join(LibraryConfig::MODELS_DIR_NAME);
        let asset_count = std::fs::read_dir(&models)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().join(LibraryConfig::METADATA_FILENAME).is_file())
                    .count()
            })
            .unwrap_or(0);
        let total_size_bytes = WalkDir::new(&models)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();

        LibraryStats {
            asset_count,
            total_size_bytes,
            exists: self.root.exists(),
            root: self.root.clone(),
        }
    }
}

/// Default root: the user's documents folder, falling back to home.
fn default_library_root() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LibraryConfig::DEFAULT_DIR_NAME)
}

/// Map an asset id to a filesystem-safe folder name.
pub fn sanitize_asset_id(asset_id: &str) -> String {
    asset_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn primary_file_in(dir: &Path) -> Option<PathBuf> {
    for &ext in LibraryConfig::MODEL_EXTENSIONS {
        let found = DownloadManager::find_files_by_extension(dir, &[ext]);
        if let Some(first) = found.into_iter().next() {
            return Some(first);
        }
    }
    None
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).into_iter().filter_map(|e| e.ok()) {
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| OpenShelfError::Other("path outside copy root".to_string()))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| OpenShelfError::io_with_path(e, &target))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| OpenShelfError::io_with_path(e, parent))?;
            }
            std::fs::copy(entry.path(), &target)
                .map_err(|e| OpenShelfError::io_with_path(e, &target))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_asset() -> CulturalAsset {
        let mut asset = CulturalAsset::new("77445", "ercolano").unwrap();
        asset.inventory_number = "IV-001".to_string();
        asset.object_type = "anello".to_string();
        asset.name = "anello".to_string();
        asset
    }

    fn populate(library: &LocalLibraryManager, asset: &CulturalAsset, files: &[&str]) {
        let dir = library.asset_dir(&asset.id);
        std::fs::create_dir_all(&dir).unwrap();
        for file in files {
            std::fs::write(dir.join(file), b"data").unwrap();
        }
        let sidecar = AssetSidecar {
            asset: asset.clone(),
            downloaded_at: Utc::now(),
            library_version: LibraryConfig::LIBRARY_VERSION.to_string(),
            source_urls: vec![],
            files: files.iter().map(|f| f.to_string()).collect(),
        };
        atomic_write_json(&dir.join(LibraryConfig::METADATA_FILENAME), &sidecar).unwrap();
    }

    #[test]
    fn test_sanitize_asset_id() {
        assert_eq!(sanitize_asset_id("77445"), "77445");
        assert_eq!(sanitize_asset_id("IV 001/a:b"), "IV_001_a_b");
        assert_eq!(sanitize_asset_id("  x  "), "x");
    }

    #[test]
    fn test_is_asset_downloaded_requires_all_parts() {
        let tmp = TempDir::new().unwrap();
        let library = LocalLibraryManager::new(Some(tmp.path().join("lib"))).unwrap();
        let asset = sample_asset();

        assert!(!library.is_asset_downloaded(&asset.id));

        // Folder + 3D file but no sidecar.
        let dir = library.asset_dir(&asset.id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.obj"), b"o").unwrap();
        assert!(!library.is_asset_downloaded(&asset.id));

        // Sidecar but only non-3D files.
        std::fs::remove_file(dir.join("model.obj")).unwrap();
        populate(&library, &asset, &["readme.txt"]);
        assert!(!library.is_asset_downloaded(&asset.id));

        populate(&library, &asset, &["model.obj"]);
        assert!(library.is_asset_downloaded(&asset.id));
    }

    #[test]
    fn test_primary_file_priority() {
        let tmp = TempDir::new().unwrap();
        let library = LocalLibraryManager::new(Some(tmp.path().join("lib"))).unwrap();
        let asset = sample_asset();
        populate(&library, &asset, &["scene.glb", "scene.gltf", "scene.obj"]);

        let primary = library.primary_file(&asset.id).unwrap();
        assert!(primary.ends_with("scene.obj"));

        std::fs::remove_file(&primary).unwrap();
        let primary = library.primary_file(&asset.id).unwrap();
        assert!(primary.ends_with("scene.gltf"));
    }

    #[tokio::test]
    async fn test_download_is_idempotent_when_present() {
        let tmp = TempDir::new().unwrap();
        let library = LocalLibraryManager::new(Some(tmp.path().join("lib"))).unwrap();
        let asset = sample_asset();
        populate(&library, &asset, &["model.obj"]);

        let manager = DownloadManager::new(None).unwrap();
        let progress = DownloadProgress::new();
        // The URL is unreachable; an idempotent hit must not attempt it.
        let path = library
            .download_asset_to_library(
                &asset,
                &["http://127.0.0.1:1/model.zip".to_string()],
                &manager,
                &progress,
            )
            .await
            .unwrap();
        assert!(path.ends_with("model.obj"));
    }

    #[test]
    fn test_metadata_roundtrip_and_remove() {
        let tmp = TempDir::new().unwrap();
        let library = LocalLibraryManager::new(Some(tmp.path().join("lib"))).unwrap();
        let asset = sample_asset();
        populate(&library, &asset, &["model.obj"]);

        let sidecar = library.get_asset_metadata(&asset.id).unwrap();
        assert_eq!(sidecar.asset.id, "77445");
        assert_eq!(sidecar.library_version, LibraryConfig::LIBRARY_VERSION);

        assert!(library.remove_asset(&asset.id));
        assert!(!library.remove_asset(&asset.id));
        assert!(library.get_asset_metadata(&asset.id).is_none());
    }

    #[test]
    fn test_stats_and_listing() {
        let tmp = TempDir::new().unwrap();
        let library = LocalLibraryManager::new(Some(tmp.path().join("lib"))).unwrap();

        let stats = library.get_library_stats();
        assert_eq!(stats.asset_count, 0);
        assert!(stats.exists);

        let first = sample_asset();
        populate(&library, &first, &["model.obj"]);
        let mut second = sample_asset();
        second.id = "88000".to_string();
        populate(&library, &second, &["model.glb"]);

        let stats = library.get_library_stats();
        assert_eq!(stats.asset_count, 2);
        assert!(stats.total_size_bytes > 0);

        let listed = library.list_assets();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].asset.id, "77445");
        assert_eq!(listed[1].asset.id, "88000");
    }
}
