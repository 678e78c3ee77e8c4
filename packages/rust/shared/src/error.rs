//! Error types for ochub.
//!
//! Library crates use [`OcHubError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ochub operations.
#[derive(Debug, thiserror::Error)]
pub enum OcHubError {
    /// The registry manifest path does not resolve to a file.
    #[error("registry manifest not found at {path:?}")]
    ManifestNotFound { path: PathBuf },

    /// The registry manifest exists but is not a valid registry document.
    #[error("failed to parse registry manifest {path:?}: {message}")]
    ManifestParse { path: PathBuf, message: String },

    /// Cloning/fetching a version's source failed.
    #[error("fetch failed for {location}: {message}")]
    Fetch { location: String, message: String },

    /// A version's materialized source directory is absent.
    #[error("version path not found: {path:?}")]
    VersionPathNotFound { path: PathBuf },

    /// The external packer exited non-zero or could not be run.
    #[error("packing error: {message}")]
    Packing { message: String },

    /// Intermediate document is malformed or rejected by the converter.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The collections root is missing when stage two starts.
    #[error("collections directory not found at {path:?}; run `ochub fetch` first")]
    CollectionsRootMissing { path: PathBuf },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OcHubError>;

impl OcHubError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a manifest parse error for the given manifest path.
    pub fn manifest_parse(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ManifestParse {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a packing error carrying the tool's diagnostic output.
    pub fn packing(msg: impl Into<String>) -> Self {
        Self::Packing {
            message: msg.into(),
        }
    }

    /// Create a conversion error from any displayable message.
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
