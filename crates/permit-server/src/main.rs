//! Arbiter Service binary (SPEC §4.4): connects to the Shared Counter
//! Store, installs a Prometheus recorder, and serves the permit
//! arbitration HTTP API until interrupted.

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use permit_server::{ArbiterConfig, ArbiterState};
use permit_store::RedisStore;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ArbiterConfig::parse();

    let metrics_handle = PrometheusBuilder::new().install_recorder().ok();
    if metrics_handle.is_none() {
        tracing::warn!("a Prometheus recorder is already installed; /metrics will be empty");
    }

    let store = RedisStore::connect(&config.store_url, config.limits())
        .await
        .with_context(|| format!("connecting to shared counter store at {}", config.store_url))?;

    let bind_addr = config.bind_addr;
    let state = Arc::new(ArbiterState::new(store, config, metrics_handle));
    state.start().await;

    let app = permit_server::router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding to {bind_addr}"))?;

    info!(%bind_addr, "arbiter service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving arbiter HTTP API")?;

    Ok(())
}

/// Waits for Ctrl+C or, on Unix, SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
