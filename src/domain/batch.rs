//! Batch runner: one independent backtest per symbol on a rayon pool.
//!
//! A symbol that fails to load or replay is recorded as a [`BatchFailure`]
//! and the rest of the batch carries on.

use std::fmt;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::domain::error::BacktestError;
use crate::domain::indicator::macd::{calculate_macd, DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::signal::{align_signals, macd_crossover_signals, Signal};
use crate::ports::data_port::DataPort;

/// Enough bars for the slow EMA and signal line to settle.
pub const DEFAULT_MIN_BARS: usize = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    /// MACD golden/death crosses computed from the closes.
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    /// The `signal` column supplied with the bars.
    Column,
}

impl Default for SignalSource {
    fn default() -> Self {
        SignalSource::Macd {
            fast: DEFAULT_FAST,
            slow: DEFAULT_SLOW,
            signal: DEFAULT_SIGNAL,
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            SignalSource::Column => write!(f, "signal column"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub backtest: BacktestConfig,
    pub signal_source: SignalSource,
    pub min_bars: usize,
    /// Worker threads; `None` uses rayon's global pool.
    pub threads: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            backtest: BacktestConfig::default(),
            signal_source: SignalSource::default(),
            min_bars: DEFAULT_MIN_BARS,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    /// Sorted by total return, best first; ties by code.
    pub results: Vec<BacktestResult>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn symbol_count(&self) -> usize {
        self.results.len()
    }

    pub fn total_trades(&self) -> usize {
        self.results.iter().map(|r| r.summary.trade_count).sum()
    }

    pub fn mean_total_return(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results
            .iter()
            .map(|r| r.summary.total_return)
            .sum::<f64>()
            / self.results.len() as f64
    }

    /// Share of symbols that finished with more equity than they started.
    pub fn profitable_fraction(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let profitable = self
            .results
            .iter()
            .filter(|r| r.summary.total_return > 0.0)
            .count();
        profitable as f64 / self.results.len() as f64
    }
}

/// Load one symbol, build its signals and replay it.
pub fn run_symbol(
    data: &dyn DataPort,
    code: &str,
    config: &BatchConfig,
) -> Result<BacktestResult, BacktestError> {
    let bars = data.fetch_bars(code)?;
    if bars.is_empty() {
        return Err(BacktestError::NoData {
            code: code.to_string(),
        });
    }
    if bars.len() < config.min_bars {
        return Err(BacktestError::InsufficientData {
            code: code.to_string(),
            bars: bars.len(),
            minimum: config.min_bars,
        });
    }

    let signals: Vec<Signal> = match config.signal_source {
        SignalSource::Macd { fast, slow, signal } => {
            macd_crossover_signals(&calculate_macd(&bars, fast, slow, signal))
        }
        SignalSource::Column => align_signals(&bars, &data.fetch_signals(code)?)?,
    };

    debug!(code, bars = bars.len(), source = %config.signal_source, "running backtest");
    run_backtest(code, &bars, &signals, &config.backtest)
}

/// Run every code and merge the outcomes. Only a bad thread-pool setting
/// fails the whole batch.
pub fn run_batch(
    data: &(dyn DataPort + Sync),
    codes: &[String],
    config: &BatchConfig,
) -> Result<BatchReport, BacktestError> {
    let run_all = || -> Vec<(String, Result<BacktestResult, BacktestError>)> {
        codes
            .par_iter()
            .map(|code| (code.clone(), run_symbol(data, code, config)))
            .collect()
    };

    let outcomes = match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| BacktestError::ConfigInvalid {
                section: "batch".into(),
                key: "threads".into(),
                reason: e.to_string(),
            })?
            .install(run_all),
        None => run_all(),
    };

    let mut report = BatchReport::default();
    for (code, outcome) in outcomes {
        match outcome {
            Ok(result) => report.results.push(result),
            Err(e) => {
                warn!(code = %code, error = %e, "symbol skipped");
                report.failures.push(BatchFailure {
                    code,
                    reason: e.to_string(),
                });
            }
        }
    }

    report.results.sort_by(|a, b| {
        b.summary
            .total_return
            .total_cmp(&a.summary.total_return)
            .then_with(|| a.code.cmp(&b.code))
    });
    report.failures.sort_by(|a, b| a.code.cmp(&b.code));

    info!(
        symbols = report.results.len(),
        failures = report.failures.len(),
        trades = report.total_trades(),
        "batch complete"
    );
    Ok(report)
}
