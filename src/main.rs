// =============================================================================
// Heikin-Ashi Exporter — Main Entry Point
// =============================================================================
//
// Serves Heikin-Ashi candles, derived on every scrape from a Prometheus
// instant query evaluated now and at two historical instants per window.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod cli;
mod collector;
mod exposition;
mod heikin_ashi;
mod runtime_config;
mod types;
mod upstream;
mod windows;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::cli::Args;
use crate::collector::CandleCollector;
use crate::runtime_config::ExporterConfig;
use crate::upstream::QueryClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ExporterConfig::from_args(&args).context("invalid configuration")?;

    // ── 2. Upstream client & collector ───────────────────────────────────
    let client = QueryClient::new(
        &config.upstream_host,
        config.upstream_port,
        config.query.clone(),
        config.request_timeout(),
        config.retry_policy(),
    )
    .context("failed to build upstream HTTP client")?;
    let upstream_name = client.display_url();

    let collector = CandleCollector::new(
        Arc::new(client),
        config.catalog()?,
        upstream_name.clone(),
        config.query.clone(),
        config.collector_settings(),
    );

    info!(
        upstream = %upstream_name,
        windows = collector.catalog().windows().len(),
        "collector ready"
    );

    let state = Arc::new(AppState::new(collector, config));

    // ── 3. Metrics server ────────────────────────────────────────────────
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], state.config.listen_port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind metrics server on {bind_addr}"))?;
    info!(addr = %bind_addr, "metrics server listening");

    let app = api::rest::router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("metrics server failed")?;

    info!("Heikin-Ashi exporter shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    warn!("Shutdown signal received — stopping gracefully");
}
