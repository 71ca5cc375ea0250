//! ofertafit-sync - Price-synchronization and catalog-admission engine
//!
//! Backend engine for the ofertafit storefront: polls tracked marketplace
//! listings for price changes on a schedule and gates new catalog candidates
//! through the admission pipeline. The storefront itself only reads the rows
//! this service writes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use ofertafit_sync::ingest::admission_gate::CatalogAdmissionGate;
use ofertafit_sync::ingest::IngestPipeline;
use ofertafit_sync::services::notifier::LogNotifier;
use ofertafit_sync::services::sync_orchestrator::{spawn_scheduler, SyncOrchestrator};
use ofertafit_sync::services::ProviderRegistry;
use ofertafit_sync::{build_router, AppState};

/// Command-line arguments for ofertafit-sync
#[derive(Parser, Debug)]
#[command(name = "ofertafit-sync")]
#[command(about = "Price-sync and catalog-admission engine for ofertafit")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "OFERTAFIT_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address, overrides the configured one
    #[arg(short, long, env = "OFERTAFIT_BIND_ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ofertafit_sync=info,ofertafit_common=info".into()),
        )
        .init();

    info!(
        "Starting ofertafit-sync v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    // Configuration is resolved and validated once; everything downstream
    // reads plain typed fields
    let mut config = ofertafit_common::config::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    let config = Arc::new(config);

    info!("Database: {}", config.database.path.display());
    let db = ofertafit_common::db::init_database_pool(&config.database.path)
        .await
        .context("Failed to initialize database")?;

    // Marketplace implementations are registered once at startup; tracked
    // items resolve against this registry by name
    let registry = Arc::new(ProviderRegistry::with_defaults());
    let notifier = Arc::new(LogNotifier);

    let orchestrator = Arc::new(SyncOrchestrator::new(
        db.clone(),
        registry,
        notifier,
        config.sync.clone(),
    ));
    let pipeline = Arc::new(IngestPipeline::new(
        db.clone(),
        CatalogAdmissionGate::with_builtin_rules(),
        config.ingest.clone(),
    ));

    let scheduler = spawn_scheduler(orchestrator.clone(), config.sync.interval_minutes);
    info!(
        interval_minutes = config.sync.interval_minutes,
        "Sync scheduler started"
    );

    let state = AppState::new(db, orchestrator, pipeline, config.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!("Listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app).await?;

    scheduler.abort();
    Ok(())
}
