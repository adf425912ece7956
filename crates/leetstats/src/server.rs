use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum_server::Handle;
use leetstats_service::cache::StatsCache;
use leetstats_service::config::Config;
use leetstats_service::metric;
use leetstats_service::upstream::LeetCodeClient;

use crate::endpoints;

/// Time given to in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Starts the background refresh and the HTTP server based on loaded config.
///
/// Blocks until the server is shut down by a signal.
pub fn run(config: Config) -> Result<()> {
    // Log this metric before actually starting the server. This allows to see restarts even if
    // service creation fails.
    metric!(counter("server.starting") += 1);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("leetstats-web")
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))?;
    tracing::info!("System shutdown complete");

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let client =
        LeetCodeClient::new(&config.upstream).context("failed to create upstream client")?;
    let cache = StatsCache::new(Arc::new(client), config.username.clone(), config.scheduler);

    // The guard stops the refresh on every exit path, including a failing server.
    let scheduler = cache.start();

    let socket = config.bind_addr()?;
    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    tracing::info!(username = cache.username(), "Starting HTTP server on {}", socket);
    axum_server::bind(socket)
        .handle(handle)
        .serve(endpoints::create_app(cache).into_make_service())
        .await
        .context("HTTP server failed")?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    Ok(())
}

async fn shutdown_on_signal(handle: Handle) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                tracing::error!(
                    error = &error as &dyn std::error::Error,
                    "Failed to listen for Ctrl-C"
                );
                return;
            }
        }
        _ = terminate => {}
    }

    tracing::info!("Shutting down, waiting for in-flight requests");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
