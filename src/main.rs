//! Collection Publisher CLI
//!
//! Usage:
//!     collection-publisher publish -c CB4-WFI-1 -i /data/batch/items.json
//!     collection-publisher publish -c CB4-WFI-1 -d /data/incoming -a
//!     collection-publisher register-collection --name CB4-WFI --version 1
//!     collection-publisher register-tile --name 007004

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use collection_publisher::catalog::SqliteCatalog;
use collection_publisher::config::Settings;
use collection_publisher::processor::ManifestInput;
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI Definition
// =============================================================================

#[derive(Parser)]
#[command(name = "collection-publisher", version)]
#[command(about = "Publish scene manifests as catalog items")]
struct Cli {
    /// Catalog database (overrides COLLECTION_PUBLISHER_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish the scenes of one manifest or of every items.json under a directory
    #[command(group(ArgGroup::new("input").required(true).args(["input_json", "directory"])))]
    Publish {
        /// Target collection, as name-version
        #[arg(short, long)]
        collection: String,

        /// Manifest file
        #[arg(short, long)]
        input_json: Option<PathBuf>,

        /// Directory scanned recursively for items.json files
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Check scene names against the collection taxonomy
        #[arg(short, long)]
        authenticate: bool,

        /// Log level or filter directive (defaults to RUST_LOG, then info)
        #[arg(short, long)]
        log_level: Option<String>,
    },
    /// Register a collection in the catalog
    RegisterCollection {
        #[arg(long)]
        name: String,

        #[arg(long)]
        version: String,
    },
    /// Register a tile in the catalog
    RegisterTile {
        #[arg(long)]
        name: String,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = match &cli.command {
        Commands::Publish { log_level, .. } => log_level.clone(),
        _ => None,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            log_level
                .or_else(|| env::var("RUST_LOG").ok())
                .unwrap_or_else(|| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = Settings::from_env().context("Invalid configuration")?;
    if let Some(database) = cli.database {
        settings.database = database;
    }

    let catalog = SqliteCatalog::open(&settings.database)
        .with_context(|| format!("Failed to open catalog {:?}", settings.database))?;

    match cli.command {
        Commands::Publish {
            collection,
            input_json,
            directory,
            authenticate,
            ..
        } => {
            let input = match (directory, input_json) {
                (Some(dir), _) => ManifestInput::Directory(dir),
                (None, Some(file)) => ManifestInput::File(file),
                (None, None) => anyhow::bail!("either --input-json or --directory is required"),
            };
            publish(catalog, &settings, &collection, &input, authenticate)
        }
        Commands::RegisterCollection { name, version } => {
            let collection = catalog
                .register_collection(&name, &version)
                .context("Failed to register collection")?;
            info!(
                "Collection {} registered with id {}",
                collection.identifier(),
                collection.id
            );
            Ok(())
        }
        Commands::RegisterTile { name } => {
            let tile = catalog
                .register_tile(&name)
                .context("Failed to register tile")?;
            info!("Tile {} registered with id {}", tile.name, tile.id);
            Ok(())
        }
    }
}

#[cfg(feature = "gdal")]
fn publish(
    mut catalog: SqliteCatalog,
    settings: &Settings,
    collection: &str,
    input: &ManifestInput,
    authenticate: bool,
) -> Result<()> {
    use collection_publisher::processor::ManifestProcessor;
    use collection_publisher::raster::gdal::GdalRasterSource;
    use collection_publisher::report::OutcomeKind;

    let source = GdalRasterSource;
    let report = ManifestProcessor::new(&mut catalog, &source, settings).run(collection, input, authenticate);

    info!(
        "Run finished: {} created, {} updated, {} skipped, {} failed",
        report.count(OutcomeKind::Created),
        report.count(OutcomeKind::Updated),
        report.count(OutcomeKind::SkippedAlreadyPublished),
        report.count(OutcomeKind::Failed),
    );
    if let Some(log_file) = report.log_file() {
        info!("Log written to {:?}", log_file);
    }
    Ok(())
}

#[cfg(not(feature = "gdal"))]
fn publish(
    _catalog: SqliteCatalog,
    _settings: &Settings,
    _collection: &str,
    _input: &ManifestInput,
    _authenticate: bool,
) -> Result<()> {
    anyhow::bail!("publishing needs a raster backend; rebuild without `--no-default-features`")
}
