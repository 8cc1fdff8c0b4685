//! citizen-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use citizen_gateway::api;
use citizen_gateway::app_state::AppState;
use citizen_gateway::config::{GatewayConfig, LogFormat};
use citizen_gateway::context::CallContext;
use citizen_gateway::domain::{ReportRepository, ReportStore, UserRepository, UserStore};
use citizen_gateway::observability;
use citizen_gateway::persistence::{self, PostgresReportRepository, PostgresUserRepository};

/// Time allowed for the hub to drain on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|err| anyhow::anyhow!("invalid configuration: {err}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting citizen-gateway");

    let metrics_handle = if config.metrics_enabled {
        Some(observability::install_recorder().context("install metrics recorder")?)
    } else {
        None
    };

    // Build storage
    let (users, reports): (Arc<dyn UserRepository>, Arc<dyn ReportRepository>) =
        if config.persistence_enabled {
            let pool = persistence::connect(&config.database_url, config.database_max_connections)
                .await
                .context("connect to postgres")?;
            (
                Arc::new(PostgresUserRepository::new(pool.clone())),
                Arc::new(PostgresReportRepository::new(pool)),
            )
        } else {
            tracing::info!("persistence disabled, using in-memory stores");
            (Arc::new(UserStore::new()), Arc::new(ReportStore::new()))
        };

    // Build application state
    let state = AppState::new(
        &config,
        users,
        reports,
        observability::facade(),
        metrics_handle,
    );
    let app = api::app(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let signal_state = state.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        // Upgraded sessions are not tracked by the server; end them so it can drain.
        let ctx = CallContext::background().with_timeout(SHUTDOWN_GRACE);
        if let Err(err) = signal_state.hub.shutdown(&ctx).await {
            tracing::warn!(error = %err, "hub drain cut short");
        }
    })
    .await
    .context("serve")?;

    state.shutdown(SHUTDOWN_GRACE).await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
