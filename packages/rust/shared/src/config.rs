//! Application configuration for ochub.
//!
//! Project config lives at `./ochub.toml` (or wherever `--config` points).
//! CLI flags and environment variables override config file values, which
//! override defaults.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OcHubError, Result};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "ochub.toml";

/// The packer release every build is pinned to unless overridden.
pub const DEFAULT_PACKER_PACKAGE: &str = "@usebruno/cli-next@2.13.2-oc2";

/// `name@X.Y.Z[-pre]`, optionally scoped. Ranges and dist-tags are rejected.
static PINNED_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(@[A-Za-z0-9._-]+/)?[A-Za-z0-9._-]+@\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?$")
        .expect("valid regex")
});

// ---------------------------------------------------------------------------
// Config structs (matching ochub.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Registry manifest and working directories.
    #[serde(default)]
    pub paths: PathsSection,

    /// Source fetching.
    #[serde(default)]
    pub fetch: FetchSection,

    /// External packer invocation.
    #[serde(default)]
    pub packer: PackerSection,

    /// Post-batch publishing behavior.
    #[serde(default)]
    pub build: BuildSection,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    /// Registry manifest (YAML).
    #[serde(default = "default_registry")]
    pub registry: PathBuf,

    /// Root of the materialized sources, rebuilt on every fetch.
    #[serde(default = "default_collections_dir")]
    pub collections_dir: PathBuf,

    /// Root of the canonical documents.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            collections_dir: default_collections_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_registry() -> PathBuf {
    "registry.yml".into()
}
fn default_collections_dir() -> PathBuf {
    "collections".into()
}
fn default_output_dir() -> PathBuf {
    "dist".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Git executable used to clone sources.
    #[serde(default = "default_git_command")]
    pub git_command: String,

    /// Shallow clone depth; full clone when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            git_command: default_git_command(),
            depth: None,
        }
    }
}

fn default_git_command() -> String {
    "git".into()
}

/// `[packer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackerSection {
    /// Launcher for the packer package (e.g. `npx`).
    #[serde(default = "default_packer_command")]
    pub command: String,

    /// Exact, pinned package spec handed to the launcher.
    #[serde(default = "default_packer_package")]
    pub package: String,
}

impl Default for PackerSection {
    fn default() -> Self {
        Self {
            command: default_packer_command(),
            package: default_packer_package(),
        }
    }
}

fn default_packer_command() -> String {
    "npx".into()
}
fn default_packer_package() -> String {
    DEFAULT_PACKER_PACKAGE.into()
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Publish a `latest` alias for every collection after the batch.
    #[serde(default = "default_true")]
    pub publish_latest: bool,

    /// Remove output for versions no longer in the registry.
    #[serde(default)]
    pub prune_stale_output: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            publish_latest: true,
            prune_stale_output: false,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the config from `explicit` if given, else `./ochub.toml` if present,
/// else defaults. The result is validated before it is returned.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = match explicit {
        Some(path) => load_config_from(path)?,
        None => {
            let path = Path::new(CONFIG_FILE_NAME);
            if path.exists() {
                load_config_from(path)?
            } else {
                tracing::debug!(?path, "config file not found, using defaults");
                AppConfig::default()
            }
        }
    };

    validate_packer_package(&config.packer.package)?;
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OcHubError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| OcHubError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file at `path`. Refuses to overwrite an existing file.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(OcHubError::config(format!(
            "{} already exists; remove it first to regenerate",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| OcHubError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| OcHubError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

/// Reject packer package specs that are not pinned to an exact version.
pub fn validate_packer_package(package: &str) -> Result<()> {
    if PINNED_PACKAGE.is_match(package) {
        Ok(())
    } else {
        Err(OcHubError::config(format!(
            "packer package '{package}' must be pinned to an exact version (e.g. {DEFAULT_PACKER_PACKAGE})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("collections_dir"));
        assert!(toml_str.contains(DEFAULT_PACKER_PACKAGE));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.paths.output_dir, PathBuf::from("dist"));
        assert_eq!(parsed.packer.command, "npx");
        assert!(parsed.build.publish_latest);
        assert!(!parsed.build.prune_stale_output);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[paths]
output_dir = "public/collections"

[fetch]
depth = 1
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.output_dir, PathBuf::from("public/collections"));
        assert_eq!(config.paths.registry, PathBuf::from("registry.yml"));
        assert_eq!(config.fetch.depth, Some(1));
        assert_eq!(config.fetch.git_command, "git");
        assert_eq!(config.packer.package, DEFAULT_PACKER_PACKAGE);
    }

    #[test]
    fn pinned_packages_are_accepted() {
        assert!(validate_packer_package(DEFAULT_PACKER_PACKAGE).is_ok());
        assert!(validate_packer_package("@usebruno/cli@2.3.0").is_ok());
        assert!(validate_packer_package("bru-pack@1.0.12").is_ok());
    }

    #[test]
    fn unpinned_packages_are_rejected() {
        for spec in [
            "@usebruno/cli-next",
            "@usebruno/cli-next@latest",
            "@usebruno/cli-next@^2.13.2",
            "bru-pack@2",
        ] {
            let err = validate_packer_package(spec).unwrap_err();
            assert!(err.to_string().contains("pinned"), "{spec} should be rejected");
        }
    }

    #[test]
    fn load_config_validates_pin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[packer]\npackage = \"@usebruno/cli-next@latest\"\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, OcHubError::Config { .. }));
    }

    #[test]
    fn init_config_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let written = init_config(&path).unwrap();
        assert_eq!(written, path);
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.paths.collections_dir, PathBuf::from("collections"));

        assert!(init_config(&path).is_err());
    }
}
