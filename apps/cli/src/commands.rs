//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use ochub_core::build::BuildReport;
use ochub_core::pipeline::{self, PipelineConfig, RunOutcome, RunSummary};
use ochub_core::progress::ProgressReporter;
use ochub_fetch::{GitFetcher, MaterializeReport, redact_source};
use ochub_packer::CliPacker;
use ochub_registry::load_registry;
use ochub_shared::{
    AppConfig, BatchResult, CONFIG_FILE_NAME, Registry, VersionKey, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ochub: build a browsable catalog of API collections.
#[derive(Parser)]
#[command(
    name = "ochub",
    version,
    about = "Fetch versioned API collections and convert them to OpenCollection documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./ochub.toml when present).
    #[arg(long, env = "OCHUB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Registry manifest path.
    #[arg(long, env = "OCHUB_REGISTRY", global = true)]
    pub registry: Option<PathBuf>,

    /// Directory the collection sources are fetched into.
    #[arg(long, env = "OCHUB_COLLECTIONS_DIR", global = true)]
    pub collections_dir: Option<PathBuf>,

    /// Directory the canonical documents are written to.
    #[arg(long, env = "OCHUB_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch every registry version into the collections directory.
    Fetch,

    /// Convert the already fetched collections into canonical documents.
    Build {
        /// Remove output for collections and versions no longer in the registry.
        #[arg(long)]
        prune: bool,
    },

    /// Fetch, then build.
    Run {
        /// Remove output for collections and versions no longer in the registry.
        #[arg(long)]
        prune: bool,
    },

    /// List the collections and versions declared in the registry.
    List,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ochub=info",
        1 => "ochub=debug",
        _ => "ochub=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Fetch => cmd_fetch(&cli).await,
        Command::Build { prune } => cmd_build(&cli, *prune).await,
        Command::Run { prune } => cmd_run(&cli, *prune).await,
        Command::List => cmd_list(&cli),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(&cli),
            ConfigAction::Show => cmd_config_show(&cli),
        },
    }
}

/// Config file, then flag/env overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(path) = &cli.registry {
        config.paths.registry = path.clone();
    }
    if let Some(path) = &cli.collections_dir {
        config.paths.collections_dir = path.clone();
    }
    if let Some(path) = &cli.output_dir {
        config.paths.output_dir = path.clone();
    }
    Ok(config)
}

fn pipeline_config(config: &AppConfig, prune: bool) -> PipelineConfig {
    PipelineConfig {
        collections_root: config.paths.collections_dir.clone(),
        output_root: config.paths.output_dir.clone(),
        publish_latest: config.build.publish_latest,
        prune_stale_output: prune || config.build.prune_stale_output,
    }
}

fn packer(config: &AppConfig) -> Result<CliPacker> {
    let packer = CliPacker::npx(&config.packer.command, &config.packer.package)?;
    info!(packer = %packer.describe(), "using packer");
    Ok(packer)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let registry = load_registry(&config.paths.registry)?;
    if registry.is_empty() {
        print_nothing_to_do(&config);
        return Ok(());
    }
    let fetcher = GitFetcher::new(&config.fetch.git_command, config.fetch.depth);

    let reporter = CliProgress::new();
    let report = pipeline::fetch_sources(
        &pipeline_config(&config, false),
        &registry,
        &fetcher,
        &reporter,
    )
    .await;
    reporter.finish();
    let report = report?;

    println!();
    println!("  Collections: {}", config.paths.collections_dir.display());
    print_fetch_summary(&report);
    println!();

    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(eyre!("{} version(s) failed to fetch", report.failed.len()))
    }
}

async fn cmd_build(cli: &Cli, prune: bool) -> Result<()> {
    let config = resolve_config(cli)?;
    let registry = load_registry(&config.paths.registry)?;
    let packer = packer(&config)?;

    let reporter = CliProgress::new();
    let summary = pipeline::build_sources(
        &pipeline_config(&config, prune),
        &registry,
        &packer,
        &reporter,
    )
    .await;
    reporter.finish();

    report_run(&summary?)
}

async fn cmd_run(cli: &Cli, prune: bool) -> Result<()> {
    let config = resolve_config(cli)?;
    let registry = load_registry(&config.paths.registry)?;
    let packer = packer(&config)?;
    let fetcher = GitFetcher::new(&config.fetch.git_command, config.fetch.depth);

    let reporter = CliProgress::new();
    let outcome = pipeline::run_pipeline(
        &pipeline_config(&config, prune),
        &registry,
        &fetcher,
        &packer,
        &reporter,
    )
    .await;
    reporter.finish();

    match outcome? {
        RunOutcome::EmptyRegistry => {
            print_nothing_to_do(&config);
            Ok(())
        }
        RunOutcome::Completed(summary) => {
            if let Some(fetched) = &summary.materialize {
                println!();
                print_fetch_summary(fetched);
            }
            report_run(&summary)
        }
    }
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let registry = load_registry(&config.paths.registry)?;
    print_registry(&registry);
    Ok(())
}

fn cmd_config_init(cli: &Cli) -> Result<()> {
    let target = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let path = init_config(&target)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_nothing_to_do(config: &AppConfig) {
    println!(
        "No collections declared in {}; nothing to do.",
        config.paths.registry.display()
    );
}

fn print_fetch_summary(report: &MaterializeReport) {
    println!("  Fetched: {}", report.fetched.len());
    println!("  Skipped: {} (no url)", report.skipped.len());
    println!("  Failed:  {}", report.failed.len());
    for (key, error) in &report.failed {
        println!("    {key}: {error}");
    }
}

/// Print the build summary; an error when any version failed.
fn report_run(summary: &RunSummary) -> Result<()> {
    let result = summary.result();

    println!();
    println!("  Output:  {}", summary.output_root.display());
    print_build_summary(&summary.build, result);
    for alias in &summary.aliases {
        println!("  Latest:  {} -> {}", alias.collection, alias.target_version);
    }
    for path in &summary.pruned {
        println!("  Pruned:  {}", path.display());
    }
    println!("  Time:    {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    if result.has_failures() {
        Err(eyre!(
            "{} of {} version(s) failed to build",
            result.failure_count,
            result.total()
        ))
    } else {
        Ok(())
    }
}

fn print_build_summary(report: &BuildReport, result: BatchResult) {
    println!("  Built:   {}", result.success_count);
    println!("  Failed:  {}", result.failure_count);
    for (key, error) in &report.failed {
        println!("    {key}: {error}");
    }
}

fn print_registry(registry: &Registry) {
    if registry.is_empty() {
        println!("No collections declared.");
        return;
    }

    for collection in &registry.collections {
        println!("{}", collection.name);
        for version in &collection.versions {
            let source = version
                .source_location()
                .map(redact_source)
                .unwrap_or_else(|| "(no url)".to_string());
            println!("  {:<12} {source}", version.name);
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    phase: Mutex<String>,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            phase: Mutex::new(String::new()),
        }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }

    fn phase_name(&self) -> String {
        self.phase.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = name.to_string();
        }
        self.spinner.set_message(name.to_string());
    }

    fn version_started(&self, key: &VersionKey) {
        self.spinner
            .set_message(format!("{} [{key}]", self.phase_name()));
    }

    fn version_finished(&self, key: &VersionKey, ok: bool) {
        if !ok {
            self.spinner.println(format!("  ✗ {key}"));
        }
    }

    fn done(&self, _result: &BatchResult) {
        self.finish();
    }
}
