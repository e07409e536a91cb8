// =============================================================================
// Time Window Catalog — fixed, ordered set of lookback windows
// =============================================================================
//
// Each window yields two historical query instants per cycle:
//   one back  = now - D
//   two back  = now - 2D
//
// The catalog is built once at startup and never mutated.  Iteration order is
// the order windows were declared in and drives the order of emitted samples.
// =============================================================================

use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::types::TimeWindow;

/// Ordered, immutable list of [`TimeWindow`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindowCatalog {
    windows: Vec<TimeWindow>,
}

impl TimeWindowCatalog {
    /// Build a catalog, rejecting empty lists, zero durations and duplicate
    /// names (names double as the `Range` label, so they must be unique).
    pub fn new(windows: Vec<TimeWindow>) -> Result<Self> {
        if windows.is_empty() {
            bail!("time window catalog must contain at least one window");
        }
        let mut seen = HashSet::new();
        for w in &windows {
            if w.duration_minutes == 0 {
                bail!("time window '{}' has a zero duration", w.name);
            }
            if !seen.insert(w.name.as_str()) {
                bail!("duplicate time window '{}'", w.name);
            }
        }
        Ok(Self { windows })
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeWindow> {
        self.windows.iter()
    }
}

impl Default for TimeWindowCatalog {
    /// 30min, 1hr, 6hr, 12hr, 1d, 1w.
    fn default() -> Self {
        Self {
            windows: vec![
                TimeWindow::new("30m", 30),
                TimeWindow::new("1h", 60),
                TimeWindow::new("6h", 360),
                TimeWindow::new("12h", 720),
                TimeWindow::new("1d", 1440),
                TimeWindow::new("1w", 10080),
            ],
        }
    }
}

impl FromStr for TimeWindowCatalog {
    type Err = anyhow::Error;

    /// Parse a comma-separated list such as `30m,1h,1d`.
    fn from_str(s: &str) -> Result<Self> {
        let windows = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(parse_window)
            .collect::<Result<Vec<_>>>()?;
        Self::new(windows)
    }
}

/// Parse a single `<n><unit>` token, unit in `m`, `h`, `d`, `w`.
pub fn parse_window(token: &str) -> Result<TimeWindow> {
    let (digits, per_unit) = if let Some(stripped) = token.strip_suffix('m') {
        (stripped, 1)
    } else if let Some(stripped) = token.strip_suffix('h') {
        (stripped, 60)
    } else if let Some(stripped) = token.strip_suffix('d') {
        (stripped, 1440)
    } else if let Some(stripped) = token.strip_suffix('w') {
        (stripped, 10080)
    } else {
        bail!("invalid window '{token}': use formats like 30m, 6h, 1d or 1w");
    };

    let count = u32::from_str(digits)
        .with_context(|| format!("invalid window '{token}': bad number '{digits}'"))?;
    let minutes = count
        .checked_mul(per_unit)
        .with_context(|| format!("window '{token}' overflows"))?;

    Ok(TimeWindow::new(token, minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_six_windows_in_order() {
        let cat = TimeWindowCatalog::default();
        let pairs: Vec<(&str, u32)> = cat
            .iter()
            .map(|w| (w.name.as_str(), w.duration_minutes))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("30m", 30),
                ("1h", 60),
                ("6h", 360),
                ("12h", 720),
                ("1d", 1440),
                ("1w", 10080)
            ]
        );
    }

    #[test]
    fn parse_list() {
        let cat: TimeWindowCatalog = "15m, 4h,2d".parse().unwrap();
        assert_eq!(cat.windows().len(), 3);
        assert_eq!(cat.windows()[0], TimeWindow::new("15m", 15));
        assert_eq!(cat.windows()[1], TimeWindow::new("4h", 240));
        assert_eq!(cat.windows()[2], TimeWindow::new("2d", 2880));
    }

    #[test]
    fn parse_default_spelling_matches_default() {
        let cat: TimeWindowCatalog = "30m,1h,6h,12h,1d,1w".parse().unwrap();
        assert_eq!(cat, TimeWindowCatalog::default());
    }

    #[test]
    fn rejects_bad_tokens() {
        assert!(parse_window("10s").is_err());
        assert!(parse_window("xh").is_err());
        assert!(parse_window("h").is_err());
        assert!("".parse::<TimeWindowCatalog>().is_err());
    }

    #[test]
    fn rejects_zero_and_duplicates() {
        assert!("0m".parse::<TimeWindowCatalog>().is_err());
        assert!("1h,1h".parse::<TimeWindowCatalog>().is_err());
    }
}
