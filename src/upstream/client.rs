// =============================================================================
// Query API Client — instant queries against a Prometheus-compatible API
// =============================================================================
//
//   GET http://{host}:{port}/api/v1/query?query={query}[&time={instant}]
//
// `instant` is rendered as `%Y-%m-%dT%H:%M:%SZ` (UTC, second precision).
// Omitting it asks the upstream for the current value.
// =============================================================================

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::error::FetchError;
use super::response::parse_snapshot;
use super::retry::RetryPolicy;
use crate::types::MarketSnapshot;

/// Format used for the `time` query parameter.
pub const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A snapshot together with how long the fetch took.
#[derive(Debug, Clone)]
pub struct TimedSnapshot {
    pub snapshot: MarketSnapshot,
    pub elapsed: Duration,
}

/// Anything that can produce a market snapshot for an instant (or now).
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self, at: Option<DateTime<Utc>>) -> Result<TimedSnapshot, FetchError>;
}

pub fn format_instant(at: DateTime<Utc>) -> String {
    at.format(INSTANT_FORMAT).to_string()
}

/// reqwest-backed [`SnapshotSource`].
#[derive(Clone)]
pub struct QueryClient {
    client: reqwest::Client,
    endpoint: String,
    query: String,
    retry: RetryPolicy,
}

impl QueryClient {
    /// Create a client for `http://{host}:{port}/api/v1/query`.
    pub fn new(
        host: &str,
        port: u16,
        query: impl Into<String>,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(
            client,
            format!("http://{host}:{port}/api/v1/query"),
            query,
            retry,
        ))
    }

    /// Re-use an existing HTTP client against an explicit endpoint URL.
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        query: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            query: query.into(),
            retry,
        }
    }

    /// Endpoint plus query string, without `time`.  Used as the `Name` label
    /// of latency samples.
    pub fn display_url(&self) -> String {
        format!("{}?query={}", self.endpoint, self.query)
    }

    fn url_for(&self, at: Option<&str>) -> String {
        match at {
            Some(t) => format!("{}&time={t}", self.display_url()),
            None => self.display_url(),
        }
    }

    /// One GET, no retries.
    async fn fetch_once(&self, at: Option<&str>) -> Result<MarketSnapshot, FetchError> {
        let url = self.url_for(at);
        debug!(url = %url, "querying upstream");

        let mut params: Vec<(&str, &str)> = vec![("query", self.query.as_str())];
        if let Some(t) = at {
            params.push(("time", t));
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchError::transport(&url, &e))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::transport(&url, &e))?;

        if !status.is_success() {
            return Err(FetchError::status(
                &url,
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }

        parse_snapshot(&body).map_err(|e| FetchError::parse(&url, e))
    }
}

#[async_trait]
impl SnapshotSource for QueryClient {
    #[instrument(skip(self), name = "upstream::fetch")]
    async fn fetch(&self, at: Option<DateTime<Utc>>) -> Result<TimedSnapshot, FetchError> {
        let at = at.map(format_instant);
        let started = Instant::now();
        let snapshot = self.retry.run(|| self.fetch_once(at.as_deref())).await?;
        let elapsed = started.elapsed();

        debug!(
            instruments = snapshot.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "upstream snapshot fetched"
        );

        Ok(TimedSnapshot { snapshot, elapsed })
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("endpoint", &self.endpoint)
            .field("query", &self.query)
            .field("retry", &self.retry)
            .finish()
    }
}
