// =============================================================================
// REST Endpoints — Axum 0.7
// =============================================================================
//
//   GET /metrics  runs one collection cycle and returns the exposition body
//   GET /health   JSON status including the last cycle's outcome
//
// A failed cycle yields HTTP 500 and no samples, so the scrape is recorded as
// failed rather than as a partial set of series.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::app_state::{AppState, CycleReport};
use crate::exposition;
use crate::runtime_config::ExporterConfig;

// =============================================================================
// Router construction
// =============================================================================

/// Build the router with request tracing and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Metrics
// =============================================================================

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.collect().await {
        Ok(output) => {
            let body = exposition::render(output.families());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)],
                body,
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "scrape failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("collection failed: {e}\n"),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'static str,
    upstream: String,
    /// Range labels in emission order.
    windows: Vec<String>,
    cycles_total: u64,
    cycles_failed: u64,
    last_cycle: Option<CycleReport>,
    config: &'a ExporterConfig,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let last_cycle = state.last_cycle();
    let status = match &last_cycle {
        Some(report) if !report.ok => "degraded",
        _ => "ok",
    };
    let resp = HealthResponse {
        status,
        upstream: format!("{}:{}", state.config.upstream_host, state.config.upstream_port),
        windows: state
            .collector
            .catalog()
            .iter()
            .map(|w| w.name.clone())
            .collect(),
        cycles_total: state.cycles_total(),
        cycles_failed: state.cycles_failed(),
        last_cycle,
        config: &state.config,
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    match serde_json::to_value(&resp) {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to serialise health report");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{DateTime, Utc};
    use tower::ServiceExt;

    use crate::collector::{CandleCollector, CollectorSettings};
    use crate::types::MarketSnapshot;
    use crate::upstream::client::TimedSnapshot;
    use crate::upstream::{FetchError, SnapshotSource};
    use crate::windows::TimeWindowCatalog;

    /// Same prices at every instant.
    struct Flat;

    #[async_trait]
    impl SnapshotSource for Flat {
        async fn fetch(&self, _at: Option<DateTime<Utc>>) -> Result<TimedSnapshot, FetchError> {
            let mut snapshot = MarketSnapshot::new();
            let q = snapshot.entry("BTC-LTC");
            q.high = Some(2.0);
            q.low = Some(1.0);
            q.last_close = Some(1.5);
            Ok(TimedSnapshot {
                snapshot,
                elapsed: Duration::from_millis(20),
            })
        }
    }

    struct Down;

    #[async_trait]
    impl SnapshotSource for Down {
        async fn fetch(&self, _at: Option<DateTime<Utc>>) -> Result<TimedSnapshot, FetchError> {
            Err(FetchError::status("http://fake", 502, "bad gateway"))
        }
    }

    fn state(source: Arc<dyn SnapshotSource>) -> Arc<AppState> {
        let config = ExporterConfig::default();
        let catalog: TimeWindowCatalog = "1h,1d".parse().unwrap();
        let collector = CandleCollector::new(
            source,
            catalog,
            "http://localhost:9090/api/v1/query?query=bittrex",
            "bittrex",
            CollectorSettings::default(),
        );
        Arc::new(AppState::new(collector, config))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn metrics_renders_both_families() {
        let app = router(state(Arc::new(Flat)));
        let (status, body) = get(app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE bittrex_heikinashi_response_time summary"));
        assert!(body.contains("# TYPE bittrexheikinashi gauge"));
        assert!(body.contains(
            "bittrex_heikinashi_response_time{Name=\"http://localhost:9090/api/v1/query?query=bittrex\",Range=\"current\",query=\"bittrex\"} 0.02"
        ));
        assert!(!body.contains("bittrexheikinashi{MarketName=\"BTC-LTC\",Range=\"1dx2\""));
        assert!(body.contains("bittrexheikinashi{MarketName=\"BTC-LTC\",Range=\"1d\",Type=\"xClose\"} 1.5"));
        assert_eq!(body.matches("bittrex_heikinashi_response_time{").count(), 5);
        assert_eq!(body.matches("bittrexheikinashi{").count(), 8);

        // Latency family precedes the candle family.
        let lat = body.find("# HELP bittrex_heikinashi_response_time").unwrap();
        let candles = body.find("# HELP bittrexheikinashi").unwrap();
        assert!(lat < candles);
    }

    #[tokio::test]
    async fn metrics_fails_whole_scrape_on_upstream_error() {
        let app = router(state(Arc::new(Down)));
        let (status, body) = get(app, "/metrics").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("bittrexheikinashi"));
        assert!(body.contains("502"));
    }

    #[tokio::test]
    async fn health_reports_last_cycle() {
        let st = state(Arc::new(Flat));
        let (_, body) = get(router(st.clone()), "/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["windows"], serde_json::json!(["1h", "1d"]));
        assert!(json["last_cycle"].is_null());

        get(router(st.clone()), "/metrics").await;
        let (status, body) = get(router(st), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["cycles_total"], 1);
        assert_eq!(json["last_cycle"]["ok"], true);
        assert_eq!(json["last_cycle"]["candle_samples"], 8);
        assert_eq!(json["upstream"], "localhost:9090");
    }

    #[tokio::test]
    async fn health_degraded_after_failure() {
        let st = state(Arc::new(Down));
        get(router(st.clone()), "/metrics").await;
        let (_, body) = get(router(st), "/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["cycles_failed"], 1);
        assert!(json["last_cycle"]["error"].as_str().unwrap().contains("current snapshot"));
    }
}
