// =============================================================================
// Shared types used across the Heikin-Ashi exporter
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named lookback duration, e.g. `6h` -> 360 minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub name: String,
    pub duration_minutes: u32,
}

impl TimeWindow {
    pub fn new(name: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            name: name.into(),
            duration_minutes,
        }
    }

    /// `Range` label used for the fetch two windows back.
    pub fn double_range_label(&self) -> String {
        format!("{}x2", self.name)
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}m)", self.name, self.duration_minutes)
    }
}

/// Per-instrument price statistics as of one queried instant.
///
/// A field is `Some` only when the upstream result carried a sample of the
/// matching `Type` for this instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentQuote {
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub last_close: Option<f64>,
}

/// Instrument identifier (`MarketName`) -> quote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    quotes: BTreeMap<String, InstrumentQuote>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instrument: &str) -> Option<&InstrumentQuote> {
        self.quotes.get(instrument)
    }

    /// Mutable access to an instrument's quote, inserting an empty one first
    /// if the instrument has not been seen yet.
    pub fn entry(&mut self, instrument: impl Into<String>) -> &mut InstrumentQuote {
        self.quotes.entry(instrument.into()).or_default()
    }

    pub fn last_close(&self, instrument: &str) -> Option<f64> {
        self.get(instrument).and_then(|q| q.last_close)
    }

    /// Iterate instruments in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &InstrumentQuote)> {
        self.quotes.iter()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Which of the four Heikin-Ashi values a sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CandleField {
    Close,
    Open,
    High,
    Low,
}

impl CandleField {
    /// Emission order within a window.
    pub const ALL: [CandleField; 4] = [Self::Close, Self::Open, Self::High, Self::Low];

    /// Value of the `Type` label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Close => "xClose",
            Self::Open => "xOpen",
            Self::High => "xHigh",
            Self::Low => "xLow",
        }
    }
}

impl std::fmt::Display for CandleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derived candle for one (instrument, window) pair.
///
/// Fields are independent: an upstream gap can leave any of them unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeikinAshiCandle {
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
}

impl HeikinAshiCandle {
    pub fn get(&self, field: CandleField) -> Option<f64> {
        match field {
            CandleField::Close => self.close,
            CandleField::Open => self.open,
            CandleField::High => self.high,
            CandleField::Low => self.low,
        }
    }

    pub fn is_empty(&self) -> bool {
        CandleField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// One labeled observation ready for exposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub name: &'static str,
    pub value: f64,
    /// Ordered label pairs; exposition keeps this order.
    pub labels: Vec<(&'static str, String)>,
}

impl Sample {
    #[cfg(test)]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Summary,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gauge => write!(f, "gauge"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// A named group of samples sharing HELP and TYPE metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    pub fn new(name: &'static str, help: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            help,
            kind,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, value: f64, labels: Vec<(&'static str, String)>) {
        self.samples.push(Sample {
            name: self.name,
            value,
            labels,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_entry_creates_and_updates() {
        let mut snap = MarketSnapshot::new();
        snap.entry("BTC-USD").high = Some(100.0);
        snap.entry("BTC-USD").last_close = Some(95.0);
        assert_eq!(snap.len(), 1);
        let q = snap.get("BTC-USD").unwrap();
        assert_eq!(q.high, Some(100.0));
        assert_eq!(q.low, None);
        assert_eq!(snap.last_close("BTC-USD"), Some(95.0));
        assert_eq!(snap.last_close("ETH-USD"), None);
    }

    #[test]
    fn snapshot_iterates_sorted() {
        let mut snap = MarketSnapshot::new();
        snap.entry("USDT-ETH");
        snap.entry("BTC-LTC");
        snap.entry("USDT-BTC");
        let names: Vec<&String> = snap.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["BTC-LTC", "USDT-BTC", "USDT-ETH"]);
    }

    #[test]
    fn candle_field_labels() {
        let labels: Vec<&str> = CandleField::ALL.iter().map(|f| f.label()).collect();
        assert_eq!(labels, vec!["xClose", "xOpen", "xHigh", "xLow"]);
    }

    #[test]
    fn candle_emptiness() {
        let c = HeikinAshiCandle {
            open: Some(1.0),
            close: None,
            high: None,
            low: None,
        };
        assert_eq!(c.get(CandleField::Open), Some(1.0));
        assert_eq!(c.get(CandleField::High), None);
        assert!(!c.is_empty());
        assert!(HeikinAshiCandle::default().is_empty());
    }

    #[test]
    fn window_double_label() {
        let w = TimeWindow::new("6h", 360);
        assert_eq!(w.double_range_label(), "6hx2");
        assert_eq!(w.duration(), chrono::Duration::minutes(360));
    }

    #[test]
    fn family_push_stamps_name() {
        let mut fam = MetricFamily::new("m", "help", MetricKind::Gauge);
        fam.push(1.5, vec![("Range", "1h".to_string())]);
        assert_eq!(fam.samples[0].name, "m");
        assert_eq!(fam.samples[0].label("Range"), Some("1h"));
        assert_eq!(fam.samples[0].label("Type"), None);
    }
}
