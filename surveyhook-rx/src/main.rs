//! surveyhook-rx - form submission webhook receiver
//!
//! Startup order: tracing, build banner, configuration, database, mirror
//! client, then the listener.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use surveyhook_common::config::{resolve_config_path, HookConfig, CONFIG_ENV_VAR};
use surveyhook_rx::db::init_database_pool;
use surveyhook_rx::mirror::{AirtableClient, MirrorClient};
use surveyhook_rx::{build_router, AppState, Pipeline};
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "surveyhook-rx")]
#[command(about = "Form submission webhook receiver", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file (else $SURVEYHOOK_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Database file override
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Default log directive when RUST_LOG is unset
    #[arg(long, env = "SURVEYHOOK_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Tracing first so configuration warnings are visible
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&args.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting surveyhook-rx v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config = HookConfig::load(config_path.as_deref())?;
    config.apply_env_overrides()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    config.validate()?;
    info!(?config, "Configuration loaded");

    if !config.signing_enabled() {
        warn!("No signing secret configured: accepting unsigned deliveries (open mode)");
    }

    info!("Database path: {}", config.database_path.display());
    let pool = match init_database_pool(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Connected to submission database");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {:#}", e);
            return Err(e);
        }
    };

    let mirror_client: Option<Arc<dyn MirrorClient>> = if config.mirror.is_enabled() {
        let client = AirtableClient::new(&config.mirror).context("Invalid mirror configuration")?;
        info!(url = %client.records_url(), "Mirror enabled");
        Some(Arc::new(client))
    } else {
        info!("Mirror disabled (no base id configured)");
        None
    };

    let pipeline = Pipeline::from_config(&config, pool, mirror_client);
    let app = build_router(AppState::new(pipeline));

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("surveyhook-rx listening on http://{}", addr);
    info!("Webhook endpoint: http://{}/webhook", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
