// =============================================================================
// HTTP surface scraped by Prometheus
// =============================================================================

pub mod rest;
