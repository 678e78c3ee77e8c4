//! Core domain types for the collection registry and its build outputs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

/// File name of the canonical document inside each output version directory.
pub const CANONICAL_FILE_NAME: &str = "opencollection.json";

/// File name of the transient packer output, next to the canonical document.
pub const INTERMEDIATE_FILE_NAME: &str = "bruno-collection.json";

/// Version alias the catalog viewer resolves for every collection.
pub const LATEST_ALIAS: &str = "latest";

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The parsed registry manifest: an ordered list of collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Declared collections, in manifest order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub collections: Vec<Collection>,
}

/// A named API collection with one or more versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Unique name, used as a directory and URL segment.
    pub name: String,
    /// Declared versions, in manifest order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub versions: Vec<Version>,
}

/// A single version of a collection and where its source lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Unique name within the owning collection.
    pub name: String,
    /// Git-cloneable source location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Registry {
    /// True when the manifest declares no collections at all.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Every `(collection, version)` pair that has a source location, in manifest order.
    pub fn declared_versions(&self) -> Vec<VersionKey> {
        self.collections
            .iter()
            .flat_map(|c| {
                c.versions
                    .iter()
                    .filter(|v| v.source_location().is_some())
                    .map(|v| VersionKey::new(&c.name, &v.name))
            })
            .collect()
    }

    /// Look up a collection by name.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }
}

impl Version {
    /// The trimmed source location, or `None` when missing or blank.
    pub fn source_location(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// VersionKey
// ---------------------------------------------------------------------------

/// Identity of one unit of work: a `(collection, version)` pair.
///
/// The collections root and the output root are keyed identically, so every
/// on-disk location is derived from the key by path joining alone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionKey {
    pub collection: String,
    pub version: String,
}

impl VersionKey {
    pub fn new(collection: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            version: version.into(),
        }
    }

    /// `<root>/<collection>/<version>`
    pub fn dir_under(&self, root: &Path) -> PathBuf {
        root.join(&self.collection).join(&self.version)
    }

    /// Where the canonical document for this key lives under `output_root`.
    pub fn canonical_path(&self, output_root: &Path) -> PathBuf {
        self.dir_under(output_root).join(CANONICAL_FILE_NAME)
    }

    /// Where the packer writes its intermediate document under `output_root`.
    pub fn intermediate_path(&self, output_root: &Path) -> PathBuf {
        self.dir_under(output_root).join(INTERMEDIATE_FILE_NAME)
    }
}

impl std::fmt::Display for VersionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.version)
    }
}

// ---------------------------------------------------------------------------
// BatchResult
// ---------------------------------------------------------------------------

/// Aggregate success/failure counts for one build run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchResult {
    /// Fold one outcome into the running totals.
    #[must_use]
    pub fn record(self, succeeded: bool) -> Self {
        if succeeded {
            Self {
                success_count: self.success_count + 1,
                ..self
            }
        } else {
            Self {
                failure_count: self.failure_count + 1,
                ..self
            }
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }
}
