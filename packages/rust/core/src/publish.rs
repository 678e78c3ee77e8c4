//! Post-build steps over the output root: the `latest` alias and stale sweeps.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use ochub_shared::{LATEST_ALIAS, OcHubError, Registry, Result, VersionKey};

use crate::build::{BuildReport, list_dirs, write_atomic};

/// A `latest` alias that now resolves, and the version it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestAlias {
    pub collection: String,
    pub target_version: String,
}

/// Make `<output_root>/<collection>/latest/opencollection.json` resolve for
/// every collection that built at least one version this run.
///
/// A version literally named `latest` is its own alias. Otherwise the first
/// declared version that built successfully is copied over.
#[instrument(skip_all, fields(output = %output_root.display()))]
pub fn publish_latest(
    registry: &Registry,
    output_root: &Path,
    report: &BuildReport,
) -> Result<Vec<LatestAlias>> {
    let mut aliases = Vec::new();

    for collection in &registry.collections {
        let latest_key = VersionKey::new(&collection.name, LATEST_ALIAS);
        if report.built(&latest_key).is_some() {
            debug!(collection = %collection.name, "declares its own latest version");
            aliases.push(LatestAlias {
                collection: collection.name.clone(),
                target_version: LATEST_ALIAS.to_string(),
            });
            continue;
        }

        let Some(built) = collection
            .versions
            .iter()
            .find_map(|v| report.built(&VersionKey::new(&collection.name, &v.name)))
        else {
            warn!(collection = %collection.name, "no version built, latest alias not updated");
            continue;
        };

        let content = std::fs::read(&built.path).map_err(|e| OcHubError::io(&built.path, e))?;
        let alias_path = latest_key.canonical_path(output_root);
        if let Some(dir) = alias_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| OcHubError::io(dir, e))?;
        }
        write_atomic(&alias_path, &content)?;

        info!(
            collection = %collection.name,
            version = %built.key.version,
            "published latest alias"
        );
        aliases.push(LatestAlias {
            collection: collection.name.clone(),
            target_version: built.key.version.clone(),
        });
    }

    Ok(aliases)
}

/// Remove output directories for collections and versions no longer in the
/// registry. `latest` aliases of live collections are kept.
///
/// Returns the removed directories.
#[instrument(skip_all, fields(output = %output_root.display()))]
pub fn prune_stale_outputs(output_root: &Path, registry: &Registry) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !output_root.is_dir() {
        return Ok(removed);
    }

    for collection_name in list_dirs(output_root)? {
        let collection_dir = output_root.join(&collection_name);

        let Some(collection) = registry.collection(&collection_name) else {
            remove_dir(&collection_dir)?;
            removed.push(collection_dir);
            continue;
        };

        for version_name in list_dirs(&collection_dir)? {
            let live = version_name == LATEST_ALIAS
                || collection.versions.iter().any(|v| v.name == version_name);
            if !live {
                let version_dir = collection_dir.join(&version_name);
                remove_dir(&version_dir)?;
                removed.push(version_dir);
            }
        }
    }

    info!(removed = removed.len(), "stale output pruned");
    Ok(removed)
}

fn remove_dir(path: &Path) -> Result<()> {
    std::fs::remove_dir_all(path).map_err(|e| OcHubError::io(path, e))?;
    info!(path = %path.display(), "removed stale output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use ochub_shared::{Collection, Version};

    use super::*;
    use crate::build::{BuiltVersion, VersionOutcome};

    fn registry(collections: &[(&str, &[&str])]) -> Registry {
        Registry {
            collections: collections
                .iter()
                .map(|(name, versions)| Collection {
                    name: (*name).into(),
                    versions: versions
                        .iter()
                        .map(|v| Version {
                            name: (*v).into(),
                            url: Some(format!("https://example.com/{name}-{v}.git")),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn built(output_root: &Path, collection: &str, version: &str, body: &str) -> VersionOutcome {
        let key = VersionKey::new(collection, version);
        let path = key.canonical_path(output_root);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        VersionOutcome::Built(BuiltVersion {
            key,
            path,
            sha256: String::new(),
            requests: 0,
        })
    }

    fn failed(collection: &str, version: &str) -> VersionOutcome {
        VersionOutcome::Failed {
            key: VersionKey::new(collection, version),
            error: OcHubError::packing("boom"),
        }
    }

    #[test]
    fn latest_copies_first_declared_success() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        let reg = registry(&[("petstore", &["v3", "v2", "v1"])]);
        let report = BuildReport::default()
            .record(built(out, "petstore", "v1", "v1 doc"))
            .record(failed("petstore", "v3"))
            .record(built(out, "petstore", "v2", "v2 doc"));

        let aliases = publish_latest(&reg, out, &report).unwrap();

        assert_eq!(
            aliases,
            vec![LatestAlias {
                collection: "petstore".into(),
                target_version: "v2".into(),
            }]
        );
        assert_eq!(
            std::fs::read_to_string(out.join("petstore/latest/opencollection.json")).unwrap(),
            "v2 doc"
        );
    }

    #[test]
    fn declared_latest_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        let reg = registry(&[("weather", &["v1", "latest"])]);
        let report = BuildReport::default()
            .record(built(out, "weather", "v1", "v1 doc"))
            .record(built(out, "weather", "latest", "latest doc"));

        let aliases = publish_latest(&reg, out, &report).unwrap();

        assert_eq!(aliases[0].target_version, "latest");
        assert_eq!(
            std::fs::read_to_string(out.join("weather/latest/opencollection.json")).unwrap(),
            "latest doc"
        );
    }

    #[test]
    fn failed_latest_falls_back_to_first_built_version() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        let alias = out.join("weather/latest/opencollection.json");
        std::fs::create_dir_all(alias.parent().unwrap()).unwrap();
        std::fs::write(&alias, "previous latest doc").unwrap();

        let reg = registry(&[("weather", &["latest", "v1"])]);
        let report = BuildReport::default()
            .record(failed("weather", "latest"))
            .record(built(out, "weather", "v1", "v1 doc"));

        let aliases = publish_latest(&reg, out, &report).unwrap();

        assert_eq!(
            aliases,
            vec![LatestAlias {
                collection: "weather".into(),
                target_version: "v1".into(),
            }]
        );
        assert_eq!(std::fs::read_to_string(&alias).unwrap(), "v1 doc");
    }

    #[test]
    fn collection_without_success_gets_no_alias() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        let reg = registry(&[("petstore", &["v1"])]);
        let report = BuildReport::default().record(failed("petstore", "v1"));

        let aliases = publish_latest(&reg, out, &report).unwrap();

        assert!(aliases.is_empty());
        assert!(!out.join("petstore/latest").exists());
    }

    #[test]
    fn prune_removes_unlisted_outputs_only() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        let dirs = [
            "petstore/v1",
            "petstore/v0",
            "petstore/latest",
            "retired/v1",
            ".cache",
        ];
        for dir in dirs {
            std::fs::create_dir_all(out.join(dir)).unwrap();
        }
        let reg = registry(&[("petstore", &["v1"])]);

        let mut removed = prune_stale_outputs(out, &reg).unwrap();
        removed.sort();

        assert_eq!(removed, vec![out.join("petstore/v0"), out.join("retired")]);
        assert!(out.join("petstore/v1").exists());
        assert!(out.join("petstore/latest").exists());
        assert!(out.join(".cache").exists());
    }

    #[test]
    fn prune_tolerates_missing_output_root() {
        let tmp = tempfile::tempdir().unwrap();
        let dist = tmp.path().join("dist");
        let removed = prune_stale_outputs(&dist, &Registry::default()).unwrap();
        assert!(removed.is_empty());
    }
}
