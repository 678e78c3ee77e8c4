//! Source materialization: turning registry entries into on-disk trees.
//!
//! This crate provides:
//! - [`SourceFetcher`]: the capability that copies one remote source into a directory
//! - [`GitFetcher`]: the production fetcher, a `git clone` subprocess
//! - [`materialize`]: destroy-and-rebuild of the whole collections root

mod git;
mod materialize;

use std::path::Path;

use async_trait::async_trait;
use ochub_shared::Result;

pub use git::{GitFetcher, redact_source};
pub use materialize::{FetchProgress, MaterializeReport, SilentFetchProgress, materialize};

/// Fetches a remote source into `dest`.
///
/// `dest` does not exist when `fetch` is called; implementations create it.
/// On error the caller discards whatever was written to `dest`.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()>;
}
