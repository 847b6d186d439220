//! ats-api server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::info;

use ats_api::logging::{self, LogConfig};
use ats_api::state::spawn_limiter_sweeper;
use ats_api::{router, AppState, ServerConfig};
use ats_core::CandidateService;
use ats_db::Database;

/// How often idle client buckets are dropped from the rate limiter.
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init(&LogConfig::from_env());

    let config = ServerConfig::from_env();
    let addr = config.socket_addr().context("invalid HOST/PORT")?;

    info!(
        subsystem = "api",
        component = "startup",
        max_connections = config.pool.max_connections,
        rate_limit_enabled = config.rate_limit.enabled,
        allowed_origins = config.allowed_origins.len(),
        "Connecting to database"
    );
    let db = Database::connect_with_config(&config.database_url, config.pool.clone())
        .await
        .context("failed to connect to database")?;

    if config.run_migrations {
        db.migrate().await.context("failed to run migrations")?;
    }

    let service = CandidateService::new(Arc::new(db.candidates.clone()));
    let state = AppState::new(service, &config.rate_limit);
    let sweeper = state
        .rate_limiter
        .clone()
        .map(|limiter| spawn_limiter_sweeper(limiter, LIMITER_SWEEP_INTERVAL));
    let app = router(state, &config);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    info!(subsystem = "api", component = "shutdown", "Server stopped, closing database");
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
