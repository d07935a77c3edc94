//! walks-geocode - start location backfill
//!
//! Finds walks that have coordinates or a grid reference but no postcode,
//! resolves a postcode for each through the address and place search
//! services, and writes the correction with an audit event. Safe to re-run:
//! walks that already have a postcode are never selected again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walks_geocode::config::resolve_area_settings;
use walks_geocode::services::{
    CoordinateLookup, CoordinateLookupClient, DistanceValidator, GridReferenceCodec, MigrationOptions,
    MigrationRunner, NominatimClient, PlaceNameResolver, PlaceSearch, ResolutionOrchestrator,
};

/// Command-line arguments for walks-geocode
#[derive(Parser, Debug)]
#[command(name = "walks-geocode")]
#[command(about = "Backfill start location postcodes on walk records")]
#[command(version)]
struct Args {
    /// Bootstrap config file (defaults to WALKS_CONFIG, then ~/.config/walks/geocode.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database holding the walks (overrides the config file)
    #[arg(short, long, env = "WALKS_DATABASE")]
    database: Option<PathBuf>,

    /// Resolve and report without writing to walk documents
    #[arg(long)]
    dry_run: bool,

    /// Process at most this many walks
    #[arg(long)]
    limit: Option<usize>,

    /// Log level when RUST_LOG is not set (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml_config, config_source) = walks_common::config::load_toml_config(args.config.as_deref())
        .context("Failed to load config file")?;

    // Initialize tracing: RUST_LOG, then --log-level, then config file
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| toml_config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("walks_geocode={level},walks_common={level},warn").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting walks-geocode v{} ({} {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    config_source.log();

    let db_path = args.database.clone().unwrap_or_else(|| toml_config.database_path.clone());
    info!("Database: {}", db_path.display());
    let pool = walks_geocode::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let area = resolve_area_settings(&pool, &toml_config).await?;
    info!(
        county = ?area.preferred_county,
        center = ?area.center,
        threshold_miles = area.threshold_miles,
        "Area settings"
    );

    let services = &toml_config.services;
    let timeout = Duration::from_secs(services.request_timeout_secs);

    let coordinate_lookup: Arc<dyn CoordinateLookup> = Arc::new(
        CoordinateLookupClient::new(&services.reverse_geocode_url, &services.user_agent, timeout)
            .context("Failed to create reverse geocode client")?,
    );
    let place_search: Arc<dyn PlaceSearch> = Arc::new(
        NominatimClient::new(
            &services.place_search_url,
            &services.user_agent,
            timeout,
            services.place_search_limit as usize,
            services.place_search_delay_ms,
        )
        .context("Failed to create place search client")?,
    );

    let codec = GridReferenceCodec::new(&area.unreliable_grid_prefixes);
    let orchestrator = ResolutionOrchestrator::new(
        coordinate_lookup.clone(),
        PlaceNameResolver::new(place_search, coordinate_lookup, area.preferred_county.clone()),
        codec,
        DistanceValidator::new(area.center, area.threshold_miles),
    );

    let runner = MigrationRunner::new(
        pool,
        orchestrator,
        MigrationOptions {
            dry_run: args.dry_run,
            limit: args.limit,
        },
    );

    let run = runner.run().await.context("Location backfill aborted")?;

    println!(
        "{}{}: {}",
        run.run_id,
        if run.dry_run { " (dry run)" } else { "" },
        run.stats.display_string()
    );

    Ok(())
}
