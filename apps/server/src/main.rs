//! # Stockbook Server
//!
//! HTTP API for the inventory and booking dashboard.
//!
//! ## Startup
//! ```text
//! load config ──► open SQLite + migrate ──► bootstrap admin ──► serve
//!                                                                 │
//!                                          Ctrl+C / SIGTERM ──────┘ graceful shutdown
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stockbook_db::{Database, DbConfig};
use stockbook_server::{app, bootstrap_admin, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting Stockbook server...");

    // Load configuration
    let config = ServerConfig::load().context("Failed to load configuration")?;
    let addr = config.socket_addr()?;
    info!(
        %addr,
        db_path = %config.database_path.display(),
        "Configuration loaded"
    );
    if config.uses_dev_secret() {
        warn!("JWT_SECRET is not set; using the development secret");
    }

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    // Connect to database (runs migrations)
    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.max_connections),
    )
    .await
    .context("Failed to open database")?;
    info!("Database ready");

    let state = AppState::new(db.clone(), config);
    if bootstrap_admin(&state).await?.is_none() && db.users().count().await? == 0 {
        warn!("No users exist; set STOCKBOOK_ADMIN_EMAIL and STOCKBOOK_ADMIN_PASSWORD to create an admin");
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
