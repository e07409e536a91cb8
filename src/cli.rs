use clap::Parser;

use crate::runtime_config::{
    DEFAULT_CYCLE_TIMEOUT_SECS, DEFAULT_LISTEN_PORT, DEFAULT_MAX_CONCURRENCY, DEFAULT_QUERY,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRIES, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_UPSTREAM_HOST,
    DEFAULT_UPSTREAM_PORT,
};

/// Export Heikin-Ashi candles derived from a Prometheus query.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The TCP port to listen on.
    #[arg(long, env = "HA_EXPORTER_PORT", default_value_t = DEFAULT_LISTEN_PORT)]
    pub port: u16,

    /// The Prometheus server to query.
    #[arg(long, env = "HA_EXPORTER_HOST", default_value = DEFAULT_UPSTREAM_HOST)]
    pub host: String,

    /// The Prometheus port.
    #[arg(
        long = "prometheusport",
        env = "HA_EXPORTER_PROMETHEUS_PORT",
        default_value_t = DEFAULT_UPSTREAM_PORT
    )]
    pub prometheus_port: u16,

    /// The Prometheus metric to query.
    #[arg(long, env = "HA_EXPORTER_QUERY", default_value = DEFAULT_QUERY)]
    pub query: String,

    /// Comma-separated lookback windows, e.g. `30m,1h,1d,1w`.
    #[arg(long, env = "HA_EXPORTER_WINDOWS")]
    pub windows: Option<String>,

    /// Maximum number of windows fetched at the same time.
    #[arg(long, env = "HA_EXPORTER_MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Deadline for a whole collection cycle, in seconds.
    #[arg(long, env = "HA_EXPORTER_CYCLE_TIMEOUT_SECS", default_value_t = DEFAULT_CYCLE_TIMEOUT_SECS)]
    pub cycle_timeout_secs: u64,

    /// Timeout for a single upstream request, in seconds.
    #[arg(long, env = "HA_EXPORTER_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Extra attempts per upstream request on transient failures.
    #[arg(long, env = "HA_EXPORTER_RETRIES", default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Initial retry backoff in milliseconds (doubled per attempt).
    #[arg(long, env = "HA_EXPORTER_RETRY_BACKOFF_MS", default_value_t = DEFAULT_RETRY_BACKOFF_MS)]
    pub retry_backoff_ms: u64,

    /// Drop windows whose upstream queries fail instead of failing the scrape.
    #[arg(long, env = "HA_EXPORTER_SKIP_FAILED_WINDOWS")]
    pub skip_failed_windows: bool,
}
