//! Error types for OpenShelf Core.
//!
//! Each variant maps to one of the failure kinds surfaced to the host
//! application's status line. Repository-level failures are usually absorbed
//! into empty results before they reach callers; acquisition-level failures
//! terminate the pipeline with a user-visible message.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for OpenShelf operations.
#[derive(Debug, Error)]
pub enum OpenShelfError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // Catalog errors
    #[error("Failed to parse catalog response: {message}")]
    Parse { message: String },

    #[error("Repository not found: {name}")]
    RepositoryNotFound { name: String },

    #[error("Asset not found: {asset_id}")]
    AssetNotFound { asset_id: String },

    // Archive errors
    #[error("Archive error at {path:?}: {message}")]
    Archive { message: String, path: PathBuf },

    #[error("No supported 3D files found in {0}")]
    NoSupportedFile(PathBuf),

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Import errors
    #[error("Model import failed: {message}")]
    ImportFailed { message: String },

    // User-initiated, terminal but distinct from an error state
    #[error("Operation cancelled by user")]
    Cancelled,

    // Programmer/user precondition violations (warnings, not errors)
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for OpenShelf operations.
pub type Result<T> = std::result::Result<T, OpenShelfError>;

// Conversion implementations for common error types

impl From<std::io::Error> for OpenShelfError {
    fn from(err: std::io::Error) -> Self {
        OpenShelfError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for OpenShelfError {
    fn from(err: serde_json::Error) -> Self {
        OpenShelfError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for OpenShelfError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OpenShelfError::Timeout(std::time::Duration::from_secs(0))
        } else {
            OpenShelfError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl OpenShelfError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        OpenShelfError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether this error is the user-initiated cancellation terminal.
    ///
    /// Cancellation is reported differently from real failures: the status
    /// line shows a neutral message and progress resets without an error flag.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OpenShelfError::Cancelled)
    }

    /// Whether this error is a precondition warning rather than a failure.
    pub fn is_precondition(&self) -> bool {
        matches!(self, OpenShelfError::Precondition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OpenShelfError::RepositoryNotFound {
            name: "ercolano".into(),
        };
        assert_eq!(err.to_string(), "Repository not found: ercolano");
    }

    #[test]
    fn test_cancelled_is_not_precondition() {
        assert!(OpenShelfError::Cancelled.is_cancelled());
        assert!(!OpenShelfError::Cancelled.is_precondition());
        let warn = OpenShelfError::Precondition {
            message: "search already running".into(),
        };
        assert!(warn.is_precondition());
        assert!(!warn.is_cancelled());
    }

    #[test]
    fn test_io_with_path_keeps_path() {
        let err = OpenShelfError::io_with_path(
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            "/tmp/x",
        );
        match err {
            OpenShelfError::Io { path, .. } => assert_eq!(path, Some(PathBuf::from("/tmp/x"))),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
