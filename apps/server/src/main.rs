//! # Tally Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  .env ──► ServerConfig::load ──► Database (SQLite, migrations)          │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │  Browser ───► HTTP (BIND_ADDR) ───► Router ───► repositories            │
//! │                                     │                                   │
//! │                                     ├── receipts dir (PDF artifacts)    │
//! │                                     └── mail relay / log                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tally_db::{Database, DbConfig};
use tally_server::config::ServerConfig;
use tally_server::{build_router, mailer_from_config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tally_server=info,tally_db=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    info!("Starting Tally server...");

    let config = ServerConfig::load().context("Loading configuration")?;
    info!(
        bind = %config.bind_addr,
        database = %config.database_path.display(),
        receipts = %config.receipts_dir.display(),
        env = ?config.app_env,
        "Configuration loaded"
    );
    if config.mail_relay_url.is_none() {
        warn!("MAIL_RELAY_URL not set, emails will only be logged");
    }

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Creating {}", parent.display()))?;
        }
    }
    tokio::fs::create_dir_all(&config.receipts_dir)
        .await
        .with_context(|| format!("Creating {}", config.receipts_dir.display()))?;

    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await
    .context("Opening database")?;

    let mailer = mailer_from_config(&config);
    let bind_addr = config.bind_addr;
    let state = AppState::new(db.clone(), config, mailer);
    let app = build_router(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Binding {bind_addr}"))?;
    info!(addr = %bind_addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
