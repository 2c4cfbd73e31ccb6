//! ZIP archive extraction with per-entry progress.

use crate::cancel::CancellationToken;
use crate::error::{OpenShelfError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extract `archive` (a ZIP file) into `dest`, creating it if needed.
///
/// `progress` is invoked after each entry with `(entries_done, total)`.
/// `cancel` is polled at entry boundaries. Entry paths are validated to
/// stay under `dest`; hostile entries are skipped with a warning.
pub fn extract_archive(
    archive: &Path,
    dest: &Path,
    cancel: &CancellationToken,
    mut progress: impl FnMut(usize, usize),
) -> Result<PathBuf> {
    let file = File::open(archive).map_err(|e| OpenShelfError::io_with_path(e, archive))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| OpenShelfError::Archive {
        message: format!("cannot open archive: {e}"),
        path: archive.to_path_buf(),
    })?;

    std::fs::create_dir_all(dest).map_err(|e| OpenShelfError::io_with_path(e, dest))?;

    let total = zip.len();
    for index in 0..total {
        cancel.check()?;
        let mut entry = zip.by_index(index).map_err(|e| OpenShelfError::Archive {
            message: format!("cannot read archive entry {index}: {e}"),
            path: archive.to_path_buf(),
        })?;

        // enclosed_name rejects absolute paths and `..` traversal.
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe archive entry: {}", entry.name());
            progress(index + 1, total);
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| OpenShelfError::io_with_path(e, &target))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| OpenShelfError::io_with_path(e, parent))?;
            }
            let mut out = File::create(&target)
                .map_err(|e| OpenShelfError::io_with_path(e, &target))?;
            std::io::copy(&mut entry, &mut out).map_err(|e| OpenShelfError::Archive {
                message: format!("failed to extract {}: {e}", entry.name()),
                path: archive.to_path_buf(),
            })?;
        }

        progress(index + 1, total);
    }

    debug!("Extracted {} entries to {}", total, dest.display());
    Ok(dest.to_path_buf())
}
