//! Atomic JSON persistence for the cache index and library sidecars.
//!
//! Writes go through a uniquely named temp file, are flushed to disk, and
//! land with an atomic rename so readers never observe a half-written file.

use crate::error::{OpenShelfError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, an error if it cannot be read
/// or parsed. Callers that tolerate corruption (the cache index) reset to a
/// default on error.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = File::open(path).map_err(|e| OpenShelfError::io_with_path(e, path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| OpenShelfError::io_with_path(e, path))?;

    let data: T = serde_json::from_str(&contents).map_err(|e| OpenShelfError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| OpenShelfError::io_with_path(e, parent))?;
        }
    }

    // Unique temp name so concurrent writers from different processes
    // cannot trample each other's in-flight file.
    let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));

    let serialized = serde_json::to_string_pretty(data)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| OpenShelfError::io_with_path(e, &temp_path))?;

        file.write_all(serialized.as_bytes())
            .map_err(|e| OpenShelfError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| OpenShelfError::io_with_path(e, &temp_path))?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        OpenShelfError::io_with_path(e, path)
    })?;

    Ok(())
}
