//! Deckhand CLI: publish slide decks and search their content.
//!
//! Runs the ingestion and query entry points against a local object store,
//! stack outputs file and CDN invalidation log.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
