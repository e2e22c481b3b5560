//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use deckhand_core::handlers::{
    IngestContext, IngestSettings, QueryContext, QueryRequest, QuerySettings, StorageEvent,
    handle_ingest, handle_query,
};
use deckhand_shared::{
    AppConfig, apply_env_overrides, init_config, init_config_at, load_config, load_config_from,
    validate_config,
};
use deckhand_storage::{FileStackOutputs, FileTemplate, FsCdnInvalidator, FsObjectStore};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Deckhand: build slide decks from numbered content and search them.
#[derive(Parser)]
#[command(
    name = "deckhand",
    version,
    about = "Assemble numbered slide content into a presentation and search it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.deckhand/deckhand.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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
    /// Rebuild and publish the deck from a source location.
    Generate {
        /// Source location holding the slide objects.
        #[arg(long, required_unless_present = "event")]
        location: Option<String>,

        /// Request id used as the invalidation caller reference.
        #[arg(long)]
        request_id: Option<String>,

        /// Storage event JSON file to replay instead of building one.
        #[arg(long, conflicts_with_all = ["location", "request_id"])]
        event: Option<PathBuf>,
    },

    /// Search the markdown slides of the configured stack.
    Search {
        /// Free-text query.
        query: Option<String>,

        /// Request JSON file to replay instead of building one.
        #[arg(long, conflicts_with = "query")]
        event: Option<PathBuf>,
    },

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
    /// Write a default config file (kept if one already exists).
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
        0 => "deckhand=info",
        1 => "deckhand=debug",
        _ => "deckhand=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Generate {
            location,
            request_id,
            event,
        } => {
            cmd_generate(
                config_path,
                location.as_deref(),
                request_id.as_deref(),
                event.as_deref(),
            )
            .await
        }
        Command::Search { query, event } => {
            cmd_search(config_path, query.as_deref(), event.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path).await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Load the config file, apply environment overrides and validate.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

async fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&content).map_err(|e| eyre!("invalid JSON in {}: {e}", path.display()))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_generate(
    config_path: Option<&Path>,
    location: Option<&str>,
    request_id: Option<&str>,
    event_path: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;

    let event = match (event_path, location) {
        (Some(path), _) => read_json_file::<StorageEvent>(path).await?,
        (None, Some(location)) => StorageEvent::for_location(location, request_id),
        (None, None) => return Err(eyre!("either --location or --event is required")),
    };

    let ctx = IngestContext {
        store: Arc::new(FsObjectStore::new(&config.storage.root)),
        cdn: Arc::new(FsCdnInvalidator::new(&config.cdn.log_dir)),
        template: Arc::new(FileTemplate::new(&config.presentation.template_path)),
        settings: IngestSettings::from(&config),
    };

    info!(location = event.location()?, "generating deck");
    let outcome = handle_ingest(&ctx, &event).await?;

    println!();
    println!("  Deck published!");
    println!(
        "  Document:     {}/{}",
        config.presentation.location, outcome.receipt.identifier
    );
    println!("  Groups:       {}", outcome.groups);
    println!("  SHA-256:      {}", outcome.receipt.sha256);
    println!("  Invalidation: {}", outcome.invalidation.id);
    println!("  Time:         {:.1}s", outcome.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_search(
    config_path: Option<&Path>,
    query: Option<&str>,
    event_path: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;

    let request = match (event_path, query) {
        (Some(path), _) => read_json_file::<QueryRequest>(path).await?,
        (None, Some(query)) => QueryRequest::with_query(query),
        (None, None) => QueryRequest::default(),
    };

    let ctx = QueryContext {
        store: Arc::new(FsObjectStore::new(&config.storage.root)),
        outputs: Arc::new(FileStackOutputs::new(&config.stack.outputs_file)),
        settings: QuerySettings::from(&config),
    };

    let response = handle_query(&ctx, &request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => init_config_at(path)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
