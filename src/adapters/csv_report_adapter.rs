//! CSV report adapter: per-symbol trade logs and the batch summary table.

use std::fs;
use std::path::Path;

use crate::domain::batch::BatchReport;
use crate::domain::error::BacktestError;
use crate::domain::ledger::TradeRecord;
use crate::ports::report_port::ReportPort;

const TRADE_LOG_HEADER: [&str; 10] = [
    "entry_date",
    "entry_price",
    "exit_date",
    "exit_price",
    "gross_return_pct",
    "net_return_pct",
    "holding_days",
    "shares",
    "net_pnl",
    "total_costs",
];

const SUMMARY_HEADER: [&str; 10] = [
    "symbol",
    "trade_count",
    "win_rate",
    "aggregate_net_return",
    "total_return",
    "max_drawdown",
    "sharpe_ratio",
    "total_fees",
    "blocked_buys",
    "blocked_sells",
];

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn report_err(path: &Path, e: impl std::fmt::Display) -> BacktestError {
    BacktestError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn open_writer(path: &Path) -> Result<csv::Writer<fs::File>, BacktestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    csv::Writer::from_path(path).map_err(|e| report_err(path, e))
}

/// Percent with two decimals, as the trade log shows returns.
fn pct(fraction: f64) -> String {
    format!("{:.2}", fraction * 100.0)
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn ratio(value: f64) -> String {
    format!("{:.4}", value)
}

impl ReportPort for CsvReportAdapter {
    fn write_trade_log(&self, trades: &[TradeRecord], path: &Path) -> Result<(), BacktestError> {
        let mut wtr = open_writer(path)?;
        wtr.write_record(TRADE_LOG_HEADER)
            .map_err(|e| report_err(path, e))?;

        for t in trades {
            wtr.write_record([
                t.entry_date.to_string(),
                money(t.entry_price),
                t.exit_date.to_string(),
                money(t.exit_price),
                pct(t.gross_return_pct),
                pct(t.net_return_pct),
                t.holding_days.to_string(),
                t.shares.to_string(),
                money(t.net_pnl),
                money(t.total_costs()),
            ])
            .map_err(|e| report_err(path, e))?;
        }

        wtr.flush()?;
        Ok(())
    }

    fn write_batch_summary(
        &self,
        report: &BatchReport,
        path: &Path,
    ) -> Result<(), BacktestError> {
        let mut wtr = open_writer(path)?;
        wtr.write_record(SUMMARY_HEADER)
            .map_err(|e| report_err(path, e))?;

        for r in &report.results {
            let s = &r.summary;
            wtr.write_record([
                r.code.clone(),
                s.trade_count.to_string(),
                ratio(s.win_rate),
                ratio(s.aggregate_net_return),
                ratio(s.total_return),
                ratio(s.max_drawdown),
                ratio(s.sharpe_ratio),
                money(s.total_fees),
                s.blocked_buys.to_string(),
                s.blocked_sells.to_string(),
            ])
            .map_err(|e| report_err(path, e))?;
        }

        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::BacktestResult;
    use crate::domain::cost::CostBreakdown;
    use crate::domain::metrics::Summary;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn trade() -> TradeRecord {
        TradeRecord {
            entry_date: date(2),
            entry_price: 10.5,
            exit_date: date(3),
            exit_price: 9.8,
            shares: 9_500,
            gross_return_pct: 9.8 / 10.5 - 1.0,
            net_return_pct: -0.069459,
            holding_days: 1,
            entry_costs: CostBreakdown {
                commission: 99.75,
                ..Default::default()
            },
            exit_costs: CostBreakdown {
                commission: 93.1,
                tax: 93.1,
                ..Default::default()
            },
            net_pnl: -6_935.95,
        }
    }

    fn result(code: &str, total_return: f64) -> BacktestResult {
        BacktestResult {
            code: code.into(),
            trades: vec![trade()],
            open_position: None,
            skipped: Vec::new(),
            equity_curve: Vec::new(),
            final_cash: 0.0,
            summary: Summary {
                trade_count: 1,
                total_return,
                blocked_buys: 2,
                ..Default::default()
            },
        }
    }

    #[test]
    fn trade_log_columns_and_percentages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("600000_trades.csv");
        CsvReportAdapter::new()
            .write_trade_log(&[trade()], &path)
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "entry_date,entry_price,exit_date,exit_price,gross_return_pct,net_return_pct,holding_days,shares,net_pnl,total_costs"
        );
        assert_eq!(
            lines[1],
            "2024-01-02,10.50,2024-01-03,9.80,-6.67,-6.95,1,9500,-6935.95,285.95"
        );
    }

    #[test]
    fn empty_trade_log_has_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        CsvReportAdapter::new().write_trade_log(&[], &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn batch_summary_one_row_per_symbol() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.csv");
        let report = BatchReport {
            results: vec![result("600000", 0.12), result("000001", -0.03)],
            failures: Vec::new(),
        };
        CsvReportAdapter::new()
            .write_batch_summary(&report, &path)
            .unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.get(0), Some("symbol"));
        assert_eq!(headers.len(), 10);

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(0), Some("600000"));
        assert_eq!(rows[0].get(1), Some("1"));
        assert_eq!(rows[0].get(4), Some("0.1200"));
        assert_eq!(rows[0].get(8), Some("2"));
        assert_eq!(rows[1].get(4), Some("-0.0300"));
    }
}
