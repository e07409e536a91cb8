// =============================================================================
// Query API response model
// =============================================================================
//
// Expected body:
//   {"data":{"result":[{"metric":{"Type":"Last","MarketName":"BTC-LTC"},
//                        "value":[1700000000.0,"0.0123"]}, ...]}}
//
// Only `data.result` is structurally required.  Individual entries are
// decoded leniently: a missing label, an unknown `Type`, or a `value` whose
// second element is not a number (bare or stringified) skips that entry
// instead of failing the fetch.
// =============================================================================

use serde::Deserialize;
use tracing::trace;

use crate::types::MarketSnapshot;

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub data: QueryData,
}

#[derive(Debug, Deserialize)]
pub struct QueryData {
    pub result: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub metric: serde_json::Value,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Upstream `Type` label values that feed a snapshot field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteKind {
    High,
    Low,
    Last,
}

impl QuoteKind {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "High" => Some(Self::High),
            "Low" => Some(Self::Low),
            "Last" => Some(Self::Last),
            _ => None,
        }
    }
}

impl QueryResult {
    fn label(&self, key: &str) -> Option<&str> {
        self.metric.get(key).and_then(|v| v.as_str())
    }

    /// The sample value at `value[1]`, either a stringified float or a
    /// bare JSON number.  Extra trailing elements are ignored.
    fn sample_value(&self) -> Option<f64> {
        let raw = self.value.as_array()?.get(1)?;
        match raw.as_str() {
            Some(s) => s.trim().parse::<f64>().ok(),
            None => raw.as_f64(),
        }
    }
}

impl QueryResponse {
    /// Fold every usable result entry into a fresh snapshot.
    ///
    /// When the upstream returns the same (instrument, Type) more than once,
    /// the last entry wins.
    pub fn into_snapshot(self) -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::new();

        for entry in &self.data.result {
            let Some(kind) = entry.label("Type").and_then(QuoteKind::from_label) else {
                continue;
            };
            let Some(market) = entry.label("MarketName") else {
                trace!("result entry without MarketName skipped");
                continue;
            };
            let Some(value) = entry.sample_value() else {
                trace!(market, "result entry with malformed value skipped");
                continue;
            };

            let quote = snapshot.entry(market);
            match kind {
                QuoteKind::High => quote.high = Some(value),
                QuoteKind::Low => quote.low = Some(value),
                QuoteKind::Last => quote.last_close = Some(value),
            }
        }

        snapshot
    }
}

/// Decode a raw body into a snapshot.
pub fn parse_snapshot(body: &[u8]) -> Result<MarketSnapshot, serde_json::Error> {
    let resp: QueryResponse = serde_json::from_slice(body)?;
    Ok(resp.into_snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_high_low_last() {
        let body = br#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"__name__": "bittrex", "Type": "High", "MarketName": "BTC-LTC"}, "value": [1700000000.123, "0.0130"]},
                    {"metric": {"__name__": "bittrex", "Type": "Low", "MarketName": "BTC-LTC"}, "value": [1700000000.123, "0.0110"]},
                    {"metric": {"__name__": "bittrex", "Type": "Last", "MarketName": "BTC-LTC"}, "value": [1700000000.123, "0.0120"]},
                    {"metric": {"__name__": "bittrex", "Type": "Last", "MarketName": "USDT-BTC"}, "value": [1700000000.123, "37000.5"]}
                ]
            }
        }"#;
        let snap = parse_snapshot(body).unwrap();
        assert_eq!(snap.len(), 2);
        let ltc = snap.get("BTC-LTC").unwrap();
        assert_eq!(ltc.high, Some(0.0130));
        assert_eq!(ltc.low, Some(0.0110));
        assert_eq!(ltc.last_close, Some(0.0120));
        let btc = snap.get("USDT-BTC").unwrap();
        assert_eq!(btc.high, None);
        assert_eq!(btc.last_close, Some(37000.5));
    }

    #[test]
    fn ignores_other_types_and_malformed_values() {
        let body = br#"{"data":{"result":[
            {"metric": {"Type": "Volume", "MarketName": "BTC-LTC"}, "value": [1, "10"]},
            {"metric": {"Type": "Last", "MarketName": "BTC-ETH"}, "value": [1]},
            {"metric": {"Type": "Last", "MarketName": "BTC-XRP"}, "value": [1, "not-a-number"]},
            {"metric": {"Type": "Last", "MarketName": "BTC-ADA"}, "value": [1, true]},
            {"metric": {"Type": "Last", "MarketName": "BTC-NEO"}, "value": "1.0"},
            {"metric": {"Type": "Last"}, "value": [1, "3"]},
            {"metric": {"MarketName": "BTC-DOT"}, "value": [1, "3"]},
            {"value": [1, "3"]},
            {"metric": {"Type": "High", "MarketName": "BTC-SC"}, "value": [1, "0.5"]}
        ]}}"#;
        let snap = parse_snapshot(body).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("BTC-SC").unwrap().high, Some(0.5));
    }

    #[test]
    fn accepts_numeric_and_padded_values() {
        let body = br#"{"data":{"result":[
            {"metric": {"Type": "Last", "MarketName": "BTC-ADA"}, "value": [1, 2.5]},
            {"metric": {"Type": "High", "MarketName": "BTC-ADA"}, "value": [1, 3]},
            {"metric": {"Type": "Low", "MarketName": "BTC-ADA"}, "value": [1, " 2.0 ", "extra"]}
        ]}}"#;
        let snap = parse_snapshot(body).unwrap();
        let ada = snap.get("BTC-ADA").unwrap();
        assert_eq!(ada.last_close, Some(2.5));
        assert_eq!(ada.high, Some(3.0));
        assert_eq!(ada.low, Some(2.0));
    }

    #[test]
    fn empty_result_is_empty_snapshot() {
        let snap = parse_snapshot(br#"{"data":{"result":[]}}"#).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn missing_data_is_a_parse_error() {
        assert!(parse_snapshot(br#"{"status":"error","error":"bad_data"}"#).is_err());
        assert!(parse_snapshot(b"<html>").is_err());
    }

    #[test]
    fn duplicate_entries_last_wins() {
        let body = br#"{"data":{"result":[
            {"metric": {"Type": "Last", "MarketName": "BTC-LTC"}, "value": [1, "1.0"]},
            {"metric": {"Type": "Last", "MarketName": "BTC-LTC"}, "value": [1, "2.0"]}
        ]}}"#;
        let snap = parse_snapshot(body).unwrap();
        assert_eq!(snap.last_close("BTC-LTC"), Some(2.0));
    }
}
