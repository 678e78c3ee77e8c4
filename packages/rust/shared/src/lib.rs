//! Shared types, error model, and configuration for ochub.
//!
//! This crate is the foundation depended on by all other ochub crates.
//! It provides:
//! - [`OcHubError`]: the unified error type
//! - Domain types ([`Registry`], [`Collection`], [`Version`], [`VersionKey`], [`BatchResult`])
//! - Configuration ([`AppConfig`], config loading, packer pin validation)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildSection, CONFIG_FILE_NAME, DEFAULT_PACKER_PACKAGE, FetchSection, PackerSection,
    PathsSection, init_config, load_config, load_config_from, validate_packer_package,
};
pub use error::{OcHubError, Result};
pub use types::{
    BatchResult, CANONICAL_FILE_NAME, Collection, INTERMEDIATE_FILE_NAME, LATEST_ALIAS, Registry,
    Version, VersionKey,
};
