//! Registry manifest loading.
//!
//! The registry is a YAML document listing every collection the catalog
//! publishes and, per collection, the versions to fetch:
//!
//! ```yaml
//! collections:
//!   - name: petstore
//!     versions:
//!       - name: v2
//!         url: https://github.com/acme/petstore-bruno.git
//! ```
//!
//! Loading is the only step of a run that may fail before any filesystem
//! work happens; nothing here touches disk beyond reading the manifest.

mod parser;

use std::path::Path;

use ochub_shared::{OcHubError, Registry, Result};
use tracing::{info, instrument};

pub use parser::{is_valid_segment, parse_registry};

/// Load and validate the registry manifest at `path`.
///
/// Fails with [`OcHubError::ManifestNotFound`] when the path does not resolve
/// to a readable file and [`OcHubError::ManifestParse`] when the content is
/// not a valid registry. An empty registry is returned as-is; callers decide
/// how to report a no-op run.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_registry(path: &Path) -> Result<Registry> {
    if !path.is_file() {
        return Err(OcHubError::ManifestNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => OcHubError::ManifestNotFound {
            path: path.to_path_buf(),
        },
        _ => OcHubError::io(path, e),
    })?;

    let registry = parse_registry(&content, path)?;

    info!(
        collections = registry.collections.len(),
        versions = registry.declared_versions().len(),
        "registry loaded"
    );

    Ok(registry)
}
