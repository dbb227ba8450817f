//! Startup orchestration.
//!
//! Config is already resolved by the caller. Order: metrics exporter,
//! database pool, listener, then traffic. Any error here is fatal.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::store::{PgBookStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to configure database pool: {0}")]
    Store(#[from] StoreError),
    #[error("invalid CORS origin: {0}")]
    Cors(#[from] axum::http::header::InvalidHeaderValue),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the service until a shutdown signal arrives.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = PgBookStore::connect_lazy(&config.database)?;

    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        environment = ?config.environment,
        "Server listening"
    );

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, Arc::new(store))?;
    let server_shutdown = shutdown.subscribe();

    let mut serve = tokio::spawn(server.run(listener, server_shutdown));

    let finished = tokio::select! {
        _ = signals::wait_for_signal() => None,
        result = &mut serve => Some(result),
    };
    let joined = match finished {
        Some(result) => result,
        None => {
            shutdown.trigger();
            serve.await
        }
    };

    match joined {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Server task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
