//! # Campus API
//!
//! REST server for the school administration backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Campus API Server                                │
//! │                                                                         │
//! │  Admin UI ───► HTTP (8080) ───► Router ───► campus-db ───► SQLite      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Logging is controlled by `RUST_LOG` (default `info,campus=debug`).

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use campus_api::config::ApiConfig;
use campus_api::{create_router, AppState};
use campus_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,campus=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Campus API server...");

    let config = ApiConfig::load()?;
    let addr = config.socket_addr()?;
    info!(
        %addr,
        database = %config.database_path,
        max_connections = config.db_max_connections,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .with_context(|| format!("opening database {}", config.database_path))?;
    info!("Database ready");

    let app = create_router(AppState::new(db.clone()));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
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
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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
