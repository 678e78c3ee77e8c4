//! End-to-end pipeline: registry → materialize → build → publish.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use ochub_fetch::{MaterializeReport, SourceFetcher, materialize};
use ochub_packer::Packer;
use ochub_shared::{BatchResult, Registry, Result};

use crate::build::{self, BuildConfig, BuildReport};
use crate::progress::{FetchReporter, ProgressReporter};
use crate::publish::{self, LatestAlias};

/// Configuration for the fetch, build, and run stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the materialized source trees.
    pub collections_root: PathBuf,
    /// Root of the canonical document tree.
    pub output_root: PathBuf,
    /// Publish `<collection>/latest` after the build.
    pub publish_latest: bool,
    /// Remove output for collections and versions no longer in the registry.
    pub prune_stale_output: bool,
}

impl PipelineConfig {
    fn build_config(&self) -> BuildConfig {
        BuildConfig {
            collections_root: self.collections_root.clone(),
            output_root: self.output_root.clone(),
        }
    }
}

/// Result of a build or a full run.
#[derive(Debug)]
pub struct RunSummary {
    /// Fetch-stage report; `None` for a build over an existing tree.
    pub materialize: Option<MaterializeReport>,
    pub build: BuildReport,
    pub aliases: Vec<LatestAlias>,
    pub pruned: Vec<PathBuf>,
    pub output_root: PathBuf,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn result(&self) -> BatchResult {
        self.build.result
    }
}

/// Outcome of [`run_pipeline`].
#[derive(Debug)]
pub enum RunOutcome {
    /// The registry declares no collections; nothing was touched.
    EmptyRegistry,
    Completed(RunSummary),
}

/// Stage one: rebuild the collections root from the registry.
///
/// An empty registry leaves the collections root untouched.
#[instrument(skip_all, fields(root = %config.collections_root.display()))]
pub async fn fetch_sources(
    config: &PipelineConfig,
    registry: &Registry,
    fetcher: &dyn SourceFetcher,
    progress: &dyn ProgressReporter,
) -> Result<MaterializeReport> {
    if registry.is_empty() {
        info!("registry declares no collections, skipping fetch");
        return Ok(MaterializeReport::default());
    }
    progress.phase("Fetching sources");
    materialize(
        registry,
        &config.collections_root,
        fetcher,
        &FetchReporter(progress),
    )
    .await
}

/// Stage two: build every version present under the collections root.
#[instrument(skip_all, fields(root = %config.collections_root.display()))]
pub async fn build_sources(
    config: &PipelineConfig,
    registry: &Registry,
    packer: &dyn Packer,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();

    progress.phase("Building collections");
    let report = build::build_all(&config.build_config(), packer, progress).await?;

    finish(config, registry, None, report, start, progress)
}

/// Run both stages.
///
/// 1. Materialize every declared source
/// 2. Build every version that is on disk or declared with a source, so
///    failed fetches surface as "version path not found"
/// 3. Prune stale output (when enabled)
/// 4. Publish `latest` aliases (when enabled)
#[instrument(skip_all, fields(collections = registry.collections.len()))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    registry: &Registry,
    fetcher: &dyn SourceFetcher,
    packer: &dyn Packer,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    if registry.is_empty() {
        info!("registry declares no collections, nothing to do");
        return Ok(RunOutcome::EmptyRegistry);
    }

    let start = Instant::now();
    info!(
        collections = registry.collections.len(),
        output = %config.output_root.display(),
        "starting run"
    );

    let fetched = fetch_sources(config, registry, fetcher, progress).await?;

    progress.phase("Building collections");
    let keys: BTreeSet<_> = build::discover_versions(&config.collections_root)?
        .into_iter()
        .chain(registry.declared_versions())
        .collect();
    let keys: Vec<_> = keys.into_iter().collect();
    let report = build::build_versions(&config.build_config(), &keys, packer, progress).await;

    finish(config, registry, Some(fetched), report, start, progress).map(RunOutcome::Completed)
}

fn finish(
    config: &PipelineConfig,
    registry: &Registry,
    materialize: Option<MaterializeReport>,
    build: BuildReport,
    start: Instant,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let pruned = if config.prune_stale_output {
        progress.phase("Pruning stale output");
        publish::prune_stale_outputs(&config.output_root, registry)?
    } else {
        Vec::new()
    };

    let aliases = if config.publish_latest {
        progress.phase("Publishing latest aliases");
        publish::publish_latest(registry, &config.output_root, &build)?
    } else {
        Vec::new()
    };

    let summary = RunSummary {
        materialize,
        build,
        aliases,
        pruned,
        output_root: config.output_root.clone(),
        elapsed: start.elapsed(),
    };

    info!(
        success = summary.result().success_count,
        failed = summary.result().failure_count,
        output = %summary.output_root.display(),
        elapsed_ms = summary.elapsed.as_millis(),
        "pipeline complete"
    );
    progress.done(&summary.result());

    Ok(summary)
}
