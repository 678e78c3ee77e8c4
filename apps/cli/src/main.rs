//! ochub CLI: API collection catalog builder.
//!
//! Fetches the versioned collection repositories listed in the registry and
//! converts each one into a canonical OpenCollection document.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Before parsing, so `.env` values feed clap's `env` fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
