//! Batch coordinator: pack and convert every materialized version.
//!
//! The collections root and the output root are keyed identically:
//! ```text
//! <collections_root>/<collection>/<version>/           (source tree)
//! <output_root>/<collection>/<version>/
//! ├── bruno-collection.json    (intermediate, only while packing/converting)
//! └── opencollection.json      (canonical document)
//! ```
//!
//! Each version is processed inside its own isolation boundary: whatever goes
//! wrong is returned as a [`VersionOutcome`] and folded into the batch totals,
//! never propagated.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument, warn};

use ochub_packer::Packer;
use ochub_shared::{BatchResult, OcHubError, Result, VersionKey};

use crate::progress::ProgressReporter;

/// Where the coordinator reads sources from and writes documents to.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root of the materialized source trees.
    pub collections_root: PathBuf,
    /// Root of the canonical document tree.
    pub output_root: PathBuf,
}

/// A version whose canonical document was written this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltVersion {
    pub key: VersionKey,
    /// Path of the written canonical document.
    pub path: PathBuf,
    /// Hex SHA-256 of the written document.
    pub sha256: String,
    /// Number of requests in the document.
    pub requests: usize,
}

/// Result of processing one version.
#[derive(Debug)]
pub enum VersionOutcome {
    Built(BuiltVersion),
    Failed { key: VersionKey, error: OcHubError },
}

impl VersionOutcome {
    pub fn key(&self) -> &VersionKey {
        match self {
            Self::Built(built) => &built.key,
            Self::Failed { key, .. } => key,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Built(_))
    }
}

/// Aggregate of one batch.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub result: BatchResult,
    pub built: Vec<BuiltVersion>,
    pub failed: Vec<(VersionKey, OcHubError)>,
}

impl BuildReport {
    /// Fold one outcome into the report.
    #[must_use]
    pub fn record(mut self, outcome: VersionOutcome) -> Self {
        self.result = self.result.record(outcome.is_success());
        match outcome {
            VersionOutcome::Built(built) => self.built.push(built),
            VersionOutcome::Failed { key, error } => self.failed.push((key, error)),
        }
        self
    }

    /// Look up a built version by key.
    pub fn built(&self, key: &VersionKey) -> Option<&BuiltVersion> {
        self.built.iter().find(|b| &b.key == key)
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// List the `(collection, version)` directory pairs under `root`.
///
/// Only directories count; dot-prefixed entries (staging leftovers, VCS
/// metadata) are ignored. The result is sorted.
pub fn discover_versions(root: &Path) -> Result<Vec<VersionKey>> {
    if !root.is_dir() {
        return Err(OcHubError::CollectionsRootMissing {
            path: root.to_path_buf(),
        });
    }

    let mut keys = BTreeSet::new();
    for collection in list_dirs(root)? {
        let collection_dir = root.join(&collection);
        for version in list_dirs(&collection_dir)? {
            keys.insert(VersionKey::new(&collection, version));
        }
    }

    debug!(count = keys.len(), root = %root.display(), "discovered versions");
    Ok(keys.into_iter().collect())
}

/// Names of the visible subdirectories of `dir`.
pub(crate) fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| OcHubError::io(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| OcHubError::io(dir, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| OcHubError::io(entry.path(), e))?
            .is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dir && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Build every version discovered under the collections root.
///
/// Fails only when the collections root itself is missing or unreadable.
pub async fn build_all(
    config: &BuildConfig,
    packer: &dyn Packer,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    let keys = discover_versions(&config.collections_root)?;
    Ok(build_versions(config, &keys, packer, progress).await)
}

/// Process `keys` one after another and fold their outcomes.
#[instrument(skip_all, fields(versions = keys.len(), output = %config.output_root.display()))]
pub async fn build_versions(
    config: &BuildConfig,
    keys: &[VersionKey],
    packer: &dyn Packer,
    progress: &dyn ProgressReporter,
) -> BuildReport {
    let start = Instant::now();
    let mut report = BuildReport::default();

    for key in keys {
        progress.version_started(key);
        let outcome = process_version(config, key, packer).await;
        progress.version_finished(key, outcome.is_success());
        report = report.record(outcome);
    }

    info!(
        success = report.result.success_count,
        failed = report.result.failure_count,
        elapsed_ms = start.elapsed().as_millis(),
        "build complete"
    );

    report
}

/// Pack and convert a single version. Never fails; errors become the outcome.
#[instrument(skip_all, fields(collection = %key.collection, version = %key.version))]
pub async fn process_version(
    config: &BuildConfig,
    key: &VersionKey,
    packer: &dyn Packer,
) -> VersionOutcome {
    info!("building");

    match pack_and_convert(config, key, packer).await {
        Ok(built) => {
            info!(sha256 = %built.sha256, requests = built.requests, "built");
            VersionOutcome::Built(built)
        }
        Err(error) => {
            match &error {
                OcHubError::VersionPathNotFound { path } => {
                    warn!(path = %path.display(), "version path not found");
                }
                _ => error!(error = %error, "build failed"),
            }
            remove_if_empty(&key.dir_under(&config.output_root));
            remove_if_empty(&config.output_root.join(&key.collection));
            VersionOutcome::Failed {
                key: key.clone(),
                error,
            }
        }
    }
}

async fn pack_and_convert(
    config: &BuildConfig,
    key: &VersionKey,
    packer: &dyn Packer,
) -> Result<BuiltVersion> {
    let source_dir = key.dir_under(&config.collections_root);
    if !source_dir.is_dir() {
        return Err(OcHubError::VersionPathNotFound { path: source_dir });
    }

    let out_dir = key.dir_under(&config.output_root);
    std::fs::create_dir_all(&out_dir).map_err(|e| OcHubError::io(&out_dir, e))?;

    let intermediate = IntermediateFile::new(key.intermediate_path(&config.output_root));
    packer.pack(&source_dir, intermediate.path()).await?;

    let raw = std::fs::read_to_string(intermediate.path())
        .map_err(|e| OcHubError::io(intermediate.path(), e))?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        OcHubError::conversion(format!("packer output is not valid JSON: {e}"))
    })?;

    let doc = ochub_converter::convert_value(value)?;
    let json = ochub_converter::to_canonical_json(&doc)?;

    let target = key.canonical_path(&config.output_root);
    write_atomic(&target, json.as_bytes())?;

    Ok(BuiltVersion {
        key: key.clone(),
        path: target,
        sha256: sha256_hex(json.as_bytes()),
        requests: doc.request_names().len(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The packer's output file; removed when dropped, whatever the outcome.
struct IntermediateFile {
    path: PathBuf,
}

impl IntermediateFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IntermediateFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed intermediate document"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove intermediate document"
                );
            }
        }
    }
}

/// Write `content` to a temp file next to `target`, then rename into place.
pub(crate) fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| OcHubError::io(&temp, e))?;
    if let Err(e) = std::fs::rename(&temp, target) {
        let _ = std::fs::remove_file(&temp);
        return Err(OcHubError::io(target, e));
    }

    debug!(path = %target.display(), size = content.len(), "wrote document");
    Ok(())
}

/// Remove `dir` if it exists and is empty. Anything else is left as is.
fn remove_if_empty(dir: &Path) {
    if std::fs::remove_dir(dir).is_ok() {
        debug!(path = %dir.display(), "removed empty output directory");
    }
}

pub(crate) fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
