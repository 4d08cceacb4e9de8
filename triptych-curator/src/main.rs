//! triptych-curator - Daily Artifact Curation Service
//!
//! Selects one musical work, one visual artwork and one literary excerpt per
//! user per day, resolves each to a verifiable reference, and tracks the
//! themed arc that governs selection.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use triptych_curator::services::{
    CurationOrchestrator, HttpContentGenerator, ImageArchiveClient, MusicBrainzClient,
    ReadingSearchClient,
};
use triptych_curator::AppState;

const DEFAULT_PORT: u16 = 5740;

#[derive(Debug, Parser)]
#[command(name = "triptych-curator", version, about = "Daily artifact curation service")]
struct Args {
    /// Root folder holding the database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// HTTP port (overrides TOML)
    #[arg(long)]
    port: Option<u16>,

    /// Path to the TOML config file (falls back to TRIPTYCH_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = triptych_common::config::load_toml_config(args.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting triptych-curator");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder =
        triptych_common::config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = triptych_common::config::prepare_root_folder(&root_folder)
        .context("Failed to initialize root folder")?;
    info!("Database: {}", db_path.display());

    let db_pool = triptych_curator::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let api_key =
        triptych_curator::config::resolve_generation_api_key(&db_pool, &toml_config).await?;

    let generation = &toml_config.generation;
    let generator = HttpContentGenerator::new(
        &generation.endpoint,
        &generation.model,
        generation.max_tokens,
        api_key,
        Duration::from_secs(generation.timeout_secs),
    )?;

    let catalog = &toml_config.catalog;
    let music = MusicBrainzClient::new(&catalog.musicbrainz_url)?;
    let images = ImageArchiveClient::new(&catalog.image_archive_url)?;
    let reading = ReadingSearchClient::new(&catalog.search_url, catalog.search_api_key.clone())?;

    let orchestrator = CurationOrchestrator::new(
        db_pool.clone(),
        Arc::new(generator),
        Arc::new(music),
        Arc::new(images),
        toml_config.curation.clone(),
    );

    let state = AppState::new(db_pool, Arc::new(orchestrator), Arc::new(reading));
    let app = triptych_curator::build_router(state);

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
