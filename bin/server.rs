// Draw Engine - Web Server
// REST API with Axum over the shared SQLite store

use anyhow::{Context, Result};
use clap::Parser;
use draw_engine::api::{build_router, AppState};
use draw_engine::{EngineConfig, SqliteStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "draw-server")]
#[command(about = "HTTP API for the draw reconciliation engine")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "DRAW_ENGINE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "draw_engine=info,draw_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref())?;

    let store = SqliteStore::open(&config.database_path).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })?;
    info!(path = %config.database_path.display(), "database opened");

    if config.reconcile_secret().is_none() {
        warn!("reconcile secret not configured; /api/invoices/reconcile-stuck will refuse every request");
    }

    let bind_address = config.bind_address.clone();
    let state = AppState::new(store, Arc::new(SystemClock), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!(address = %bind_address, "🚀 draw-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    Ok(())
}
