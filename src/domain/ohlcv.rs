//! Daily OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Previous session's close as published by the data source, if any.
    pub prev_close: Option<f64>,
}

impl Bar {
    /// A session with no volume is a trading halt.
    pub fn is_suspended(&self) -> bool {
        self.volume == 0
    }

    /// Vendor files carry zero or negative prices on bad rows.
    pub fn has_valid_prices(&self) -> bool {
        self.high > 0.0 && self.low > 0.0 && self.close > 0.0
    }
}

/// Reference price for the limit check at `index`: the bar's own published
/// previous close, else the prior bar's close. `None` for the first bar.
pub fn previous_close(bars: &[Bar], index: usize) -> Option<f64> {
    let bar = bars.get(index)?;
    match bar.prev_close {
        Some(pc) => Some(pc),
        None if index > 0 => Some(bars[index - 1].close),
        None => None,
    }
}
