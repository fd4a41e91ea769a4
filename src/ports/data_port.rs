//! Data access port trait.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::domain::signal::Signal;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `code`, sorted by date, with bad price rows already dropped.
    fn fetch_bars(&self, code: &str) -> Result<Vec<Bar>, BacktestError>;

    /// Externally supplied signals for `code`, one per bar returned by
    /// `fetch_bars` and in the same order.
    fn fetch_signals(&self, code: &str) -> Result<Vec<(NaiveDate, Signal)>, BacktestError>;

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError>;
}
