//! Destroy-and-rebuild of the collections root.
//!
//! Layout produced:
//! ```text
//! <root>/
//! ├── <collection>/
//! │   ├── <version>/            (fetched source tree)
//! │   └── .<version>.partial/   (only while that version is being fetched)
//! └── ...
//! ```

use std::path::Path;
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use ochub_shared::{OcHubError, Registry, Result, VersionKey};

use crate::SourceFetcher;
use crate::git::redact_source;

/// What happened to each declared version during materialization.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Versions now present under the collections root.
    pub fetched: Vec<VersionKey>,
    /// Versions skipped because they declare no source location.
    pub skipped: Vec<VersionKey>,
    /// Versions whose fetch failed; absent from disk.
    pub failed: Vec<(VersionKey, OcHubError)>,
}

/// Per-version progress callbacks for the fetch stage.
pub trait FetchProgress: Send + Sync {
    /// Called before a version's source is fetched.
    fn version_started(&self, key: &VersionKey);
    /// Called after a version's fetch finished, successfully or not.
    fn version_finished(&self, key: &VersionKey, ok: bool);
}

/// No-op fetch progress.
pub struct SilentFetchProgress;

impl FetchProgress for SilentFetchProgress {
    fn version_started(&self, _key: &VersionKey) {}
    fn version_finished(&self, _key: &VersionKey, _ok: bool) {}
}

/// Rebuild `root` so it holds exactly the fetchable versions of `registry`.
///
/// A registry without collections is a no-op: `root` is left untouched.
/// Otherwise:
///
/// 1. Remove `root` recursively if it exists
/// 2. Recreate it
/// 3. Fetch every version that has a source location into
///    `<root>/<collection>/<version>`, staging in a dot-prefixed sibling and
///    renaming into place only when the fetch succeeded
///
/// Versions without a source and versions whose fetch fails are logged and
/// reported, never fatal. Only failures to reset the root itself are errors.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn materialize(
    registry: &Registry,
    root: &Path,
    fetcher: &dyn SourceFetcher,
    progress: &dyn FetchProgress,
) -> Result<MaterializeReport> {
    let start = Instant::now();

    if registry.is_empty() {
        info!("registry declares no collections, nothing to do");
        return Ok(MaterializeReport::default());
    }

    if tokio::fs::try_exists(root)
        .await
        .map_err(|e| OcHubError::io(root, e))?
    {
        info!("removing existing collections directory");
        tokio::fs::remove_dir_all(root)
            .await
            .map_err(|e| OcHubError::io(root, e))?;
    }
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| OcHubError::io(root, e))?;

    let mut report = MaterializeReport::default();

    for collection in &registry.collections {
        if collection.versions.is_empty() {
            warn!(collection = %collection.name, "no versions declared, skipping");
            continue;
        }

        info!(
            collection = %collection.name,
            versions = collection.versions.len(),
            "processing collection"
        );

        for version in &collection.versions {
            let key = VersionKey::new(&collection.name, &version.name);

            let Some(source) = version.source_location() else {
                warn!(%key, "no url declared, skipping");
                report.skipped.push(key);
                continue;
            };

            progress.version_started(&key);
            match fetch_version(root, &key, source, fetcher).await {
                Ok(()) => {
                    info!(%key, "fetched");
                    progress.version_finished(&key, true);
                    report.fetched.push(key);
                }
                Err(e) => {
                    error!(%key, error = %e, "fetch failed");
                    progress.version_finished(&key, false);
                    report.failed.push((key, e));
                }
            }
        }
    }

    info!(
        fetched = report.fetched.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "materialization complete"
    );

    Ok(report)
}

/// Fetch a single version into place, leaving nothing behind on failure.
async fn fetch_version(
    root: &Path,
    key: &VersionKey,
    source: &str,
    fetcher: &dyn SourceFetcher,
) -> Result<()> {
    let collection_dir = root.join(&key.collection);
    if !tokio::fs::try_exists(&collection_dir)
        .await
        .map_err(|e| OcHubError::io(&collection_dir, e))?
    {
        tokio::fs::create_dir(&collection_dir)
            .await
            .map_err(|e| OcHubError::io(&collection_dir, e))?;
    }

    let staging = collection_dir.join(format!(".{}.partial", key.version));
    let target = key.dir_under(root);

    info!(%key, source = %redact_source(source), "cloning");

    let fetched = match fetcher.fetch(source, &staging).await {
        Ok(()) => tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| OcHubError::io(&target, e)),
        Err(e) => Err(e),
    };

    if fetched.is_err() {
        discard(&staging).await;
    }
    fetched
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial fetch");
        }
    }
}
