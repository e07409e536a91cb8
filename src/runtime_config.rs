// =============================================================================
// Runtime Configuration — exporter settings resolved once at startup
// =============================================================================
//
// Sources, highest precedence first:
//   1. command-line flags
//   2. HA_EXPORTER_* environment variables (a `.env` file is honoured)
//   3. the defaults below
//
// Nothing is persisted; the resolved config is only reported on /health.
// =============================================================================

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::Args;
use crate::collector::{CollectorSettings, FailurePolicy};
use crate::types::TimeWindow;
use crate::upstream::RetryPolicy;
use crate::windows::TimeWindowCatalog;

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_LISTEN_PORT: u16 = 9101;
pub const DEFAULT_UPSTREAM_HOST: &str = "localhost";
pub const DEFAULT_UPSTREAM_PORT: u16 = 9090;
pub const DEFAULT_QUERY: &str = "bittrex";
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// Longest accepted cycle timeout (one day).
pub const MAX_CYCLE_TIMEOUT_SECS: u64 = 86_400;

/// Upper bound for a single retry backoff.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

// =============================================================================
// ExporterConfig
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ExporterConfig {
    /// Port the /metrics server listens on.
    pub listen_port: u16,

    // --- Upstream -----------------------------------------------------------
    pub upstream_host: String,
    pub upstream_port: u16,
    /// Query whose result carries `Type` and `MarketName` labels.
    pub query: String,

    // --- Collection ---------------------------------------------------------
    pub windows: Vec<TimeWindow>,
    pub max_concurrency: usize,
    pub cycle_timeout_secs: u64,
    pub failure_policy: FailurePolicy,

    // --- HTTP ---------------------------------------------------------------
    pub request_timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            upstream_host: DEFAULT_UPSTREAM_HOST.to_string(),
            upstream_port: DEFAULT_UPSTREAM_PORT,
            query: DEFAULT_QUERY.to_string(),
            windows: TimeWindowCatalog::default().windows().to_vec(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cycle_timeout_secs: DEFAULT_CYCLE_TIMEOUT_SECS,
            failure_policy: FailurePolicy::AbortCycle,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl ExporterConfig {
    /// Resolve and validate the configuration from parsed arguments.
    pub fn from_args(args: &Args) -> Result<Self> {
        let windows = match args.windows.as_deref() {
            Some(list) => list
                .parse::<TimeWindowCatalog>()
                .with_context(|| format!("invalid --windows value '{list}'"))?
                .windows()
                .to_vec(),
            None => TimeWindowCatalog::default().windows().to_vec(),
        };

        let config = Self {
            listen_port: args.port,
            upstream_host: args.host.clone(),
            upstream_port: args.prometheus_port,
            query: args.query.clone(),
            windows,
            max_concurrency: args.max_concurrency,
            cycle_timeout_secs: args.cycle_timeout_secs,
            failure_policy: if args.skip_failed_windows {
                FailurePolicy::SkipWindow
            } else {
                FailurePolicy::AbortCycle
            },
            request_timeout_secs: args.request_timeout_secs,
            retries: args.retries,
            retry_backoff_ms: args.retry_backoff_ms,
        };
        config.validate()?;

        info!(
            upstream = %format!("{}:{}", config.upstream_host, config.upstream_port),
            query = %config.query,
            windows = ?config.windows.iter().map(|w| w.name.as_str()).collect::<Vec<_>>(),
            max_concurrency = config.max_concurrency,
            failure_policy = %config.failure_policy,
            "exporter config resolved"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream_host.trim().is_empty() {
            bail!("upstream host must not be empty");
        }
        if self.query.trim().is_empty() {
            bail!("query must not be empty");
        }
        if self.max_concurrency == 0 {
            bail!("max concurrency must be at least 1");
        }
        if self.cycle_timeout_secs == 0 {
            bail!("cycle timeout must be at least 1 second");
        }
        if self.cycle_timeout_secs > MAX_CYCLE_TIMEOUT_SECS {
            bail!("cycle timeout must be at most {MAX_CYCLE_TIMEOUT_SECS} seconds");
        }
        if self.request_timeout_secs == 0 {
            bail!("request timeout must be at least 1 second");
        }
        self.catalog().map(|_| ())
    }

    pub fn catalog(&self) -> Result<TimeWindowCatalog> {
        TimeWindowCatalog::new(self.windows.clone())
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            max_concurrency: self.max_concurrency,
            cycle_timeout: Duration::from_secs(self.cycle_timeout_secs),
            failure_policy: self.failure_policy,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retries,
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_backoff: MAX_RETRY_BACKOFF,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
