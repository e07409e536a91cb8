// =============================================================================
// Candle Collector — one collection cycle per scrape
// =============================================================================
//
// Cycle:
//   FetchCurrent -> { FetchHistoricalPair -> Derive }* per window -> Emit
//
// The current snapshot is fetched once and shared read-only by every window.
// Windows run concurrently, at most `max_concurrency` at a time, and their
// results are re-ordered by catalog position before emission so the output
// does not depend on completion order.
//
// Failure handling:
//   - current fetch fails          -> cycle fails
//   - window fetch fails, Abort    -> cycle fails (no partial output)
//   - window fetch fails, Skip     -> window omitted, logged
//   - cycle deadline expires       -> unfinished windows omitted, logged
// =============================================================================

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::heikin_ashi;
use crate::types::{
    CandleField, HeikinAshiCandle, MarketSnapshot, MetricFamily, MetricKind, TimeWindow,
};
use crate::upstream::{FetchError, SnapshotSource};
use crate::windows::TimeWindowCatalog;

pub const LATENCY_METRIC: &str = "bittrex_heikinashi_response_time";
pub const LATENCY_HELP: &str = "Total time for the Prometheus API to respond.";
pub const CANDLE_METRIC: &str = "bittrexheikinashi";
pub const CANDLE_HELP: &str = "Bittrex Heikin-Ashi metric values.";

/// `Range` label of the latency sample for the current-value fetch.
pub const CURRENT_RANGE: &str = "current";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// What to do when a window's historical fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole cycle.
    #[default]
    AbortCycle,
    /// Drop the failing window and keep the rest.
    SkipWindow,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AbortCycle => write!(f, "abort_cycle"),
            Self::SkipWindow => write!(f, "skip_window"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    pub max_concurrency: usize,
    pub cycle_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            cycle_timeout: Duration::from_secs(30),
            failure_policy: FailurePolicy::AbortCycle,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("current snapshot fetch failed: {0}")]
    Current(#[source] FetchError),

    #[error("window {window} fetch failed: {source}")]
    Window {
        window: String,
        #[source]
        source: FetchError,
    },

    #[error("current snapshot fetch exceeded the {0:?} cycle deadline")]
    Deadline(Duration),
}

/// Why a window contributed no samples to a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed { error: String },
    DeadlineExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedWindow {
    pub window: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Everything one cycle produced.
#[derive(Debug, Clone)]
pub struct CycleOutput {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub latency: MetricFamily,
    pub candles: MetricFamily,
    pub skipped: Vec<SkippedWindow>,
}

impl CycleOutput {
    /// Latency family first, then candles.
    pub fn families(&self) -> [&MetricFamily; 2] {
        [&self.latency, &self.candles]
    }
}

/// Results of one window's fetch + derive step.
#[derive(Debug)]
struct WindowOutcome {
    one_back_elapsed: Duration,
    two_back_elapsed: Duration,
    candles: BTreeMap<String, HeikinAshiCandle>,
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

pub struct CandleCollector {
    source: Arc<dyn SnapshotSource>,
    catalog: TimeWindowCatalog,
    /// `Name` label of latency samples (upstream URL incl. query).
    upstream_name: String,
    /// `query` label of latency samples.
    query: String,
    settings: CollectorSettings,
}

impl CandleCollector {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        catalog: TimeWindowCatalog,
        upstream_name: impl Into<String>,
        query: impl Into<String>,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            source,
            catalog,
            upstream_name: upstream_name.into(),
            query: query.into(),
            settings,
        }
    }

    pub fn catalog(&self) -> &TimeWindowCatalog {
        &self.catalog
    }

    /// Run one cycle anchored at the current wall-clock time.
    pub async fn collect(&self) -> Result<CycleOutput, CollectError> {
        self.collect_at(Utc::now()).await
    }

    /// Run one cycle with historical instants derived from `now`.
    pub async fn collect_at(&self, now: DateTime<Utc>) -> Result<CycleOutput, CollectError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("collect_cycle", %cycle_id);
        self.run_cycle(cycle_id, now).instrument(span).await
    }

    async fn run_cycle(
        &self,
        cycle_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CycleOutput, CollectError> {
        let started = Instant::now();
        // None when the timeout is too large to represent: no deadline.
        let deadline = started.checked_add(self.settings.cycle_timeout);

        // ── Current snapshot ────────────────────────────────────────────
        let current = match before(deadline, self.source.fetch(None)).await {
            Some(Ok(c)) => c,
            Some(Err(e)) => {
                error!(error = %e, "current snapshot fetch failed, aborting cycle");
                return Err(CollectError::Current(e));
            }
            None => {
                error!("current snapshot fetch exceeded cycle deadline");
                return Err(CollectError::Deadline(self.settings.cycle_timeout));
            }
        };
        let current_snapshot = &current.snapshot;
        if current_snapshot.is_empty() {
            warn!("current snapshot has no instruments");
        }

        // ── Windows, bounded concurrency ────────────────────────────────
        let windows = self.catalog.windows();
        let mut outcomes: Vec<Option<WindowOutcome>> = windows.iter().map(|_| None).collect();
        let mut failed: Vec<Option<SkipReason>> = windows.iter().map(|_| None).collect();

        let mut pending = stream::iter(0..windows.len())
            .map(move |idx| async move {
                (idx, self.run_window(&windows[idx], now, current_snapshot).await)
            })
            .buffer_unordered(self.settings.max_concurrency.max(1));

        loop {
            match before(deadline, pending.next()).await {
                Some(Some((idx, Ok(outcome)))) => {
                    debug!(
                        window = %windows[idx].name,
                        instruments = outcome.candles.len(),
                        "window derived"
                    );
                    outcomes[idx] = Some(outcome);
                }
                Some(Some((idx, Err(e)))) => {
                    let window = &windows[idx].name;
                    match self.settings.failure_policy {
                        FailurePolicy::AbortCycle => {
                            error!(window = %window, error = %e, "window fetch failed, aborting cycle");
                            return Err(CollectError::Window {
                                window: window.clone(),
                                source: e,
                            });
                        }
                        FailurePolicy::SkipWindow => {
                            warn!(window = %window, error = %e, "window fetch failed, skipping window");
                            failed[idx] = Some(SkipReason::FetchFailed {
                                error: e.to_string(),
                            });
                        }
                    }
                }
                Some(None) => break,
                None => {
                    warn!(
                        timeout_ms = self.settings.cycle_timeout.as_millis() as u64,
                        "cycle deadline reached, dropping unfinished windows"
                    );
                    break;
                }
            }
        }
        drop(pending);

        let mut skipped = Vec::new();
        for (idx, window) in windows.iter().enumerate() {
            if outcomes[idx].is_some() {
                continue;
            }
            let reason = failed[idx].take().unwrap_or(SkipReason::DeadlineExceeded);
            skipped.push(SkippedWindow {
                window: window.name.clone(),
                reason,
            });
        }

        // ── Emit ────────────────────────────────────────────────────────
        let (latency, candles) = self.build_families(current.elapsed, windows, &outcomes);

        info!(
            latency_samples = latency.samples.len(),
            candle_samples = candles.samples.len(),
            instruments = current_snapshot.len(),
            skipped_windows = skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collection cycle complete"
        );

        Ok(CycleOutput {
            cycle_id,
            started_at: now,
            latency,
            candles,
            skipped,
        })
    }

    /// Fetch both historical snapshots of one window and derive its candles.
    async fn run_window(
        &self,
        window: &TimeWindow,
        now: DateTime<Utc>,
        current: &MarketSnapshot,
    ) -> Result<WindowOutcome, FetchError> {
        let one_back_at = now - window.duration();
        let two_back_at = now - window.duration() * 2;

        let (one_back, two_back) = tokio::try_join!(
            self.source.fetch(Some(one_back_at)),
            self.source.fetch(Some(two_back_at)),
        )?;

        let candles = heikin_ashi::derive(current, &one_back.snapshot, &two_back.snapshot);

        Ok(WindowOutcome {
            one_back_elapsed: one_back.elapsed,
            two_back_elapsed: two_back.elapsed,
            candles,
        })
    }

    fn latency_labels(&self, range: String) -> Vec<(&'static str, String)> {
        vec![
            ("Name", self.upstream_name.clone()),
            ("Range", range),
            ("query", self.query.clone()),
        ]
    }

    fn build_families(
        &self,
        current_elapsed: Duration,
        windows: &[TimeWindow],
        outcomes: &[Option<WindowOutcome>],
    ) -> (MetricFamily, MetricFamily) {
        let mut latency = MetricFamily::new(LATENCY_METRIC, LATENCY_HELP, MetricKind::Summary);
        let mut candles = MetricFamily::new(CANDLE_METRIC, CANDLE_HELP, MetricKind::Gauge);

        latency.push(
            current_elapsed.as_secs_f64(),
            self.latency_labels(CURRENT_RANGE.to_string()),
        );

        for (window, outcome) in windows.iter().zip(outcomes) {
            let Some(outcome) = outcome else {
                continue;
            };

            latency.push(
                outcome.one_back_elapsed.as_secs_f64(),
                self.latency_labels(window.name.clone()),
            );
            latency.push(
                outcome.two_back_elapsed.as_secs_f64(),
                self.latency_labels(window.double_range_label()),
            );

            for field in CandleField::ALL {
                for (instrument, candle) in &outcome.candles {
                    if let Some(value) = candle.get(field) {
                        candles.push(
                            value,
                            vec![
                                ("MarketName", instrument.clone()),
                                ("Range", window.name.clone()),
                                ("Type", field.label().to_string()),
                            ],
                        );
                    }
                }
            }
        }

        (latency, candles)
    }
}

/// Await `fut` until `deadline`; `None` if the deadline passed first.
async fn before<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}

impl std::fmt::Debug for CandleCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleCollector")
            .field("catalog", &self.catalog)
            .field("upstream_name", &self.upstream_name)
            .field("query", &self.query)
            .field("settings", &self.settings)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
