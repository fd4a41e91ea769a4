#![allow(dead_code)]

use ashare_backtest::domain::backtest::{BacktestConfig, PositionSizing};
use ashare_backtest::domain::cost::CostModel;
use ashare_backtest::domain::error::BacktestError;
pub use ashare_backtest::domain::ohlcv::Bar;
use ashare_backtest::domain::signal::Signal;
use ashare_backtest::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub signals: HashMap<String, Vec<(NaiveDate, Signal)>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            signals: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_signals(mut self, code: &str, signals: &[Signal]) -> Self {
        let dated = self
            .data
            .get(code)
            .map(|bars| bars.iter().map(|b| b.date).zip(signals.iter().copied()).collect())
            .unwrap_or_default();
        self.signals.insert(code.to_string(), dated);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    fn check_error(&self, code: &str) -> Result<(), BacktestError> {
        match self.errors.get(code) {
            Some(reason) => Err(BacktestError::Data {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, code: &str) -> Result<Vec<Bar>, BacktestError> {
        self.check_error(code)?;
        Ok(self.data.get(code).cloned().unwrap_or_default())
    }

    fn fetch_signals(&self, code: &str) -> Result<Vec<(NaiveDate, Signal)>, BacktestError> {
        self.check_error(code)?;
        Ok(self.signals.get(code).cloned().unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let mut codes: Vec<String> = self.data.keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(code: &str, date: &str, close: f64) -> Bar {
    Bar {
        code: code.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 100_000,
        prev_close: None,
    }
}

/// Consecutive calendar-day bars with the given closes.
pub fn bars_from_closes(code: &str, start_date: &str, closes: &[f64]) -> Vec<Bar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            code: code.to_string(),
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100_000,
            prev_close: None,
        })
        .collect()
}

/// Commission 0.1%, stamp tax 0.1%, 5.00 minimum, no transfer fee.
pub fn scenario_costs() -> CostModel {
    CostModel {
        commission_rate: 0.001,
        minimum_fee: 5.0,
        tax_rate: 0.001,
        transfer_fee_rate: 0.0,
    }
}

pub fn scenario_config() -> BacktestConfig {
    BacktestConfig {
        initial_capital: 100_000.0,
        costs: scenario_costs(),
        ..Default::default()
    }
}

pub fn fixed_config(shares: u64) -> BacktestConfig {
    BacktestConfig {
        sizing: PositionSizing::Fixed(shares),
        ..scenario_config()
    }
}
