// =============================================================================
// Upstream Query API
// =============================================================================
//
// Everything needed to turn one time-series query (optionally pinned to an
// instant) into a `MarketSnapshot`:
//
//   1. client    — reqwest GET against /api/v1/query, timed
//   2. response  — serde model of the JSON body and snapshot decoding
//   3. retry     — bounded exponential backoff around each GET
//   4. error     — Fetch / Parse failure taxonomy

pub mod client;
pub mod error;
pub mod response;
pub mod retry;

pub use client::{QueryClient, SnapshotSource};
pub use error::FetchError;
pub use retry::RetryPolicy;
