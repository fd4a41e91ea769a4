//! Report writing port trait.

use std::path::Path;

use crate::domain::batch::BatchReport;
use crate::domain::error::BacktestError;
use crate::domain::ledger::TradeRecord;

/// Port for persisting backtest output. Callers choose the paths.
pub trait ReportPort {
    fn write_trade_log(&self, trades: &[TradeRecord], path: &Path) -> Result<(), BacktestError>;

    fn write_batch_summary(&self, report: &BatchReport, path: &Path)
    -> Result<(), BacktestError>;
}
