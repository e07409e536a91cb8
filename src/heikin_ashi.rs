// =============================================================================
// Heikin-Ashi Engine — smoothed candle from three snapshots
// =============================================================================
//
// For a window of duration D, with C = snapshot now, P1 = now - D and
// P2 = now - 2D:
//
//   xClose = (P1.last + C.high + C.low + C.last) / 4
//   xOpen  = (P2.last + P1.last) / 2
//   xHigh  = max(C.high, xOpen, xClose)
//   xLow   = min(C.low,  xOpen, xClose)
//
// High/low always come from the current snapshot, for every window; the
// upstream only exposes current extrema.
//
// Missing inputs propagate: any value whose inputs are not all defined is left
// unset, and instruments without P1.last are skipped outright.
// =============================================================================

use std::collections::BTreeMap;

use crate::types::{HeikinAshiCandle, MarketSnapshot};

/// Derive one candle per instrument of `current` that has a last close.
///
/// Pure and deterministic: the same three snapshots always produce the same
/// map, in instrument order.
pub fn derive(
    current: &MarketSnapshot,
    one_back: &MarketSnapshot,
    two_back: &MarketSnapshot,
) -> BTreeMap<String, HeikinAshiCandle> {
    let mut candles = BTreeMap::new();

    for (instrument, quote) in current.iter() {
        let Some(last) = quote.last_close else {
            continue;
        };
        let Some(prev_close) = one_back.last_close(instrument) else {
            continue;
        };

        let close = match (quote.high, quote.low) {
            (Some(high), Some(low)) => Some((prev_close + high + low + last) / 4.0),
            _ => None,
        };
        let open = two_back
            .last_close(instrument)
            .map(|older_close| (older_close + prev_close) / 2.0);

        let (high, low) = match (open, close) {
            (Some(o), Some(c)) => (
                quote.high.map(|h| h.max(o).max(c)),
                quote.low.map(|l| l.min(o).min(c)),
            ),
            _ => (None, None),
        };

        let candle = HeikinAshiCandle {
            open,
            close,
            high,
            low,
        };
        if !candle.is_empty() {
            candles.insert(instrument.clone(), candle);
        }
    }

    candles
}
