//! Backtest engine: a single-position FLAT/LONG state machine replayed over
//! a bar series and its aligned signal series.
//!
//! Per bar, in date order:
//! 1. FLAT + BUY: check the buy side; if allowed, size and open at the close.
//!    A blocked or unaffordable buy is dropped, never queued.
//! 2. LONG + SELL: check the sell side; if allowed, close at the close.
//!    A blocked sell is dropped; only a later SELL bar retries the exit.
//! 3. Everything else is a no-op.
//!
//! A position still open after the last bar is reported as a mark-to-market
//! valuation, separate from the closed trades.

use std::fmt;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::cost::CostModel;
use crate::domain::error::{BacktestError, InputError};
use crate::domain::execution::{can_execute, ExecutionDecision, LimitSchedule, Side};
use crate::domain::ledger::{Ledger, MarkToMarket, TradeRecord};
use crate::domain::metrics::Summary;
use crate::domain::ohlcv::{previous_close, Bar};
use crate::domain::signal::Signal;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_LOT_SIZE: u64 = 100;
pub const DEFAULT_CASH_BUFFER: f64 = 0.002;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionSizing {
    /// Spend all available cash (less the buffer) in whole lots.
    AllIn,
    /// Buy a fixed number of shares, rounded down to whole lots.
    Fixed(u64),
}

impl fmt::Display for PositionSizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSizing::AllIn => write!(f, "all-in"),
            PositionSizing::Fixed(shares) => write!(f, "fixed({})", shares),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub costs: CostModel,
    pub limits: LimitSchedule,
    pub sizing: PositionSizing,
    pub lot_size: u64,
    /// Fraction of cash held back from all-in sizing.
    pub cash_buffer: f64,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            costs: CostModel::default(),
            limits: LimitSchedule::default(),
            sizing: PositionSizing::AllIn,
            lot_size: DEFAULT_LOT_SIZE,
            cash_buffer: DEFAULT_CASH_BUFFER,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LimitUp,
    LimitDown,
    Suspended,
    InsufficientCapital,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::LimitUp => "limit-up",
            SkipReason::LimitDown => "limit-down",
            SkipReason::Suspended => "suspended",
            SkipReason::InsufficientCapital => "insufficient capital",
        };
        f.write_str(text)
    }
}

/// A BUY or SELL signal that could not be acted on.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSignal {
    pub date: NaiveDate,
    pub side: Side,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub code: String,
    pub trades: Vec<TradeRecord>,
    pub open_position: Option<MarkToMarket>,
    pub skipped: Vec<SkippedSignal>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_cash: f64,
    pub summary: Summary,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.final_cash, |p| p.equity)
    }
}

/// Reject input the engine cannot replay faithfully.
pub fn validate_inputs(bars: &[Bar], signals: &[Signal]) -> Result<(), InputError> {
    if bars.len() != signals.len() {
        return Err(InputError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        });
    }
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].date <= pair[0].date {
            return Err(InputError::NonMonotonicDates {
                index: i + 1,
                previous: pair[0].date,
                current: pair[1].date,
            });
        }
    }
    Ok(())
}

/// Shares to buy at `price`, or 0 when not even one lot is affordable.
pub fn size_order(cash: f64, price: f64, config: &BacktestConfig) -> u64 {
    if price <= 0.0 || cash <= 0.0 {
        return 0;
    }
    let lot = config.lot_size.max(1);

    let mut shares = match config.sizing {
        PositionSizing::AllIn => {
            let budget = cash * (1.0 - config.cash_buffer);
            ((budget / price / lot as f64).floor() as u64) * lot
        }
        PositionSizing::Fixed(n) => (n / lot) * lot,
    };

    // Step down a lot at a time until notional plus buy costs fit in cash.
    while shares > 0 && config.costs.net_cost(shares as f64 * price) > cash {
        shares -= lot;
    }

    // A fixed order is all or nothing.
    if let PositionSizing::Fixed(n) = config.sizing {
        if shares != (n / lot) * lot {
            return 0;
        }
    }
    shares
}

pub fn run_backtest(
    code: &str,
    bars: &[Bar],
    signals: &[Signal],
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    validate_inputs(bars, signals)?;

    let rule = config.limits.rule_for(code);
    let mut ledger = Ledger::new(config.initial_capital, config.costs);
    let mut trades = Vec::new();
    let mut skipped = Vec::new();
    let mut equity_curve = Vec::with_capacity(bars.len());

    for (i, (bar, &signal)) in bars.iter().zip(signals).enumerate() {
        let side = match (signal, ledger.is_long()) {
            (Signal::Buy, false) => Some(Side::Buy),
            (Signal::Sell, true) => Some(Side::Sell),
            _ => None,
        };

        if let Some(side) = side {
            let decision = can_execute(bar, previous_close(bars, i), side, &rule);
            let blocked = match decision {
                ExecutionDecision::Allowed => None,
                ExecutionDecision::BlockedLimitUp => Some(SkipReason::LimitUp),
                ExecutionDecision::BlockedLimitDown => Some(SkipReason::LimitDown),
                ExecutionDecision::BlockedSuspended => Some(SkipReason::Suspended),
            };

            let outcome = match (blocked, side) {
                (Some(reason), _) => Some(reason),
                (None, Side::Buy) => {
                    let shares = size_order(ledger.cash(), bar.close, config);
                    if shares == 0 {
                        Some(SkipReason::InsufficientCapital)
                    } else {
                        ledger.open(bar.date, bar.close, shares)?;
                        debug!(code, date = %bar.date, price = bar.close, shares, "opened position");
                        None
                    }
                }
                (None, Side::Sell) => {
                    let trade = ledger.close(bar.date, bar.close)?;
                    debug!(
                        code,
                        date = %bar.date,
                        price = bar.close,
                        net_return = trade.net_return_pct,
                        "closed position"
                    );
                    trades.push(trade);
                    None
                }
            };

            if let Some(reason) = outcome {
                debug!(code, date = %bar.date, %side, %reason, "signal skipped");
                skipped.push(SkippedSignal {
                    date: bar.date,
                    side,
                    reason,
                });
            }
        }

        equity_curve.push(EquityPoint {
            date: bar.date,
            equity: ledger.equity(bar.close),
        });
    }

    let open_position = bars
        .last()
        .and_then(|last| ledger.mark_to_market(last.date, last.close));

    let summary = Summary::compute(
        &trades,
        &equity_curve,
        &skipped,
        config.initial_capital,
        config.risk_free_rate,
    );

    Ok(BacktestResult {
        code: code.to_string(),
        trades,
        open_position,
        skipped,
        equity_curve,
        final_cash: ledger.cash(),
        summary,
    })
}
