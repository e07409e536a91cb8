// =============================================================================
// Application State — shared by every request handler
// =============================================================================
//
// Holds the collector and a record of the most recent cycle for /health.
// Collection cycles themselves keep no state between scrapes.
//
// Thread safety:
//   - Atomic counters for cycle totals.
//   - parking_lot::RwLock for the last-cycle report.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::collector::{CandleCollector, CollectError, CycleOutput, SkippedWindow};
use crate::runtime_config::ExporterConfig;

/// Summary of one finished (or failed) collection cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Option<Uuid>,
    /// Instant the historical queries were anchored to.
    pub anchored_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
    pub ok: bool,
    pub latency_samples: usize,
    pub candle_samples: usize,
    pub skipped_windows: Vec<SkippedWindow>,
    pub error: Option<String>,
}

impl CycleReport {
    fn success(output: &CycleOutput) -> Self {
        Self {
            cycle_id: Some(output.cycle_id),
            anchored_at: Some(output.started_at),
            finished_at: Utc::now(),
            ok: true,
            latency_samples: output.latency.samples.len(),
            candle_samples: output.candles.samples.len(),
            skipped_windows: output.skipped.clone(),
            error: None,
        }
    }

    fn failure(err: &CollectError) -> Self {
        Self {
            cycle_id: None,
            anchored_at: None,
            finished_at: Utc::now(),
            ok: false,
            latency_samples: 0,
            candle_samples: 0,
            skipped_windows: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

pub struct AppState {
    pub collector: CandleCollector,
    pub config: ExporterConfig,
    cycles_total: AtomicU64,
    cycles_failed: AtomicU64,
    last_cycle: RwLock<Option<CycleReport>>,
}

impl AppState {
    pub fn new(collector: CandleCollector, config: ExporterConfig) -> Self {
        Self {
            collector,
            config,
            cycles_total: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            last_cycle: RwLock::new(None),
        }
    }

    /// Run one collection cycle and record its outcome.
    pub async fn collect(&self) -> Result<CycleOutput, CollectError> {
        let result = self.collector.collect().await;
        self.cycles_total.fetch_add(1, Ordering::Relaxed);

        let report = match &result {
            Ok(output) => CycleReport::success(output),
            Err(e) => {
                self.cycles_failed.fetch_add(1, Ordering::Relaxed);
                CycleReport::failure(e)
            }
        };
        *self.last_cycle.write() = Some(report);

        result
    }

    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle.read().clone()
    }

    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("collector", &self.collector)
            .field("cycles_total", &self.cycles_total())
            .field("cycles_failed", &self.cycles_failed())
            .finish()
    }
}
