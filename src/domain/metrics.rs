//! Performance summary over closed trades and the per-bar equity curve.

use crate::domain::backtest::{EquityPoint, SkipReason, SkippedSignal};
use crate::domain::execution::Side;
use crate::domain::ledger::TradeRecord;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub trade_count: usize,
    pub wins: usize,
    /// Fraction of trades with a positive net return; 0 with no trades.
    pub win_rate: f64,
    /// Compounded net return of the closed trades: prod(1 + net) - 1.
    pub aggregate_net_return: f64,
    pub avg_net_return: f64,
    pub avg_holding_days: f64,
    pub final_equity: f64,
    /// Equity based, so an open position counts at its last close.
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub total_fees: f64,
    /// Buys refused by a limit-up or halted bar.
    pub blocked_buys: usize,
    /// Sells refused by a limit-down or halted bar.
    pub blocked_sells: usize,
    pub unaffordable_buys: usize,
}

impl Summary {
    pub fn compute(
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
        skipped: &[SkippedSignal],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        let trade_count = trades.len();
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let win_rate = if trade_count > 0 {
            wins as f64 / trade_count as f64
        } else {
            0.0
        };

        let aggregate_net_return = compound_returns(trades);
        let (avg_net_return, avg_holding_days) = if trade_count > 0 {
            let n = trade_count as f64;
            (
                trades.iter().map(|t| t.net_return_pct).sum::<f64>() / n,
                trades.iter().map(|t| t.holding_days as f64).sum::<f64>() / n,
            )
        } else {
            (0.0, 0.0)
        };

        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);

        let total_fees = trades.iter().map(|t| t.total_costs()).sum();

        let mut blocked_buys = 0;
        let mut blocked_sells = 0;
        let mut unaffordable_buys = 0;
        for event in skipped {
            match (event.reason, event.side) {
                (SkipReason::InsufficientCapital, _) => unaffordable_buys += 1,
                (_, Side::Buy) => blocked_buys += 1,
                (_, Side::Sell) => blocked_sells += 1,
            }
        }

        Summary {
            trade_count,
            wins,
            win_rate,
            aggregate_net_return,
            avg_net_return,
            avg_holding_days,
            final_equity,
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            total_fees,
            blocked_buys,
            blocked_sells,
            unaffordable_buys,
        }
    }
}

/// prod(1 + net_return) - 1 over the trades, 0 for none.
pub fn compound_returns(trades: &[TradeRecord]) -> f64 {
    trades
        .iter()
        .fold(1.0, |acc, t| acc * (1.0 + t.net_return_pct))
        - 1.0
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    if equity_curve.is_empty() {
        return (0.0, 0);
    }

    let mut peak = equity_curve[0].equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            max_dd = max_dd.max(dd);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - daily_rf;

    // Flat curves (never invested) have no volatility; report 0 rather than inf.
    let sharpe = if stddev > 1e-12 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 1e-12 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cost::CostBreakdown;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                date: day(i as i64),
                equity: v,
            })
            .collect()
    }

    fn make_trade(net: f64, days: i64) -> TradeRecord {
        let fee = CostBreakdown {
            commission: 5.0,
            ..Default::default()
        };
        TradeRecord {
            entry_date: day(0),
            entry_price: 10.0,
            exit_date: day(days),
            exit_price: 10.0 * (1.0 + net),
            shares: 100,
            gross_return_pct: net,
            net_return_pct: net,
            holding_days: days,
            entry_costs: fee,
            exit_costs: fee,
            net_pnl: 1_000.0 * net,
        }
    }

    fn skip(side: Side, reason: SkipReason) -> SkippedSignal {
        SkippedSignal {
            date: day(1),
            side,
            reason,
        }
    }

    #[test]
    fn summary_with_no_trades() {
        let s = Summary::compute(&[], &[], &[], 100_000.0, 0.03);
        assert_eq!(s.trade_count, 0);
        assert_eq!(s.win_rate, 0.0);
        assert_eq!(s.aggregate_net_return, 0.0);
        assert_relative_eq!(s.final_equity, 100_000.0);
        assert_eq!(s.total_return, 0.0);
        assert_eq!(s.sharpe_ratio, 0.0);
    }

    #[test]
    fn win_rate_six_of_ten() {
        let trades: Vec<TradeRecord> = (0..10)
            .map(|i| make_trade(if i < 6 { 0.02 } else { -0.01 }, 3))
            .collect();
        let s = Summary::compute(&trades, &[], &[], 100_000.0, 0.03);
        assert_eq!(s.trade_count, 10);
        assert_eq!(s.wins, 6);
        assert_relative_eq!(s.win_rate, 0.6);
    }

    #[test]
    fn breakeven_trade_is_not_a_win() {
        let s = Summary::compute(&[make_trade(0.0, 1)], &[], &[], 100_000.0, 0.03);
        assert_eq!(s.wins, 0);
        assert_eq!(s.win_rate, 0.0);
    }

    #[test]
    fn aggregate_return_compounds() {
        let trades = vec![make_trade(0.10, 2), make_trade(-0.05, 4)];
        let s = Summary::compute(&trades, &[], &[], 100_000.0, 0.03);
        assert_relative_eq!(s.aggregate_net_return, 1.1 * 0.95 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(s.avg_net_return, 0.025, epsilon = 1e-12);
        assert_relative_eq!(s.avg_holding_days, 3.0);
    }

    #[test]
    fn total_fees_sum_both_legs() {
        let trades = vec![make_trade(0.01, 1), make_trade(0.01, 1)];
        let s = Summary::compute(&trades, &[], &[], 100_000.0, 0.03);
        assert_relative_eq!(s.total_fees, 20.0);
    }

    #[test]
    fn total_return_from_equity() {
        let curve = make_equity_curve(&[100_000.0, 110_000.0]);
        let s = Summary::compute(&[], &curve, &[], 100_000.0, 0.03);
        assert_relative_eq!(s.total_return, 0.10, epsilon = 1e-12);
        assert_relative_eq!(s.final_equity, 110_000.0);
    }

    #[test]
    fn annualized_return_of_flat_year_is_zero() {
        let curve = make_equity_curve(&[100_000.0; 252]);
        let s = Summary::compute(&[], &curve, &[], 100_000.0, 0.03);
        assert!(s.annualized_return.abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_peak_to_trough() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let (dd, duration) = compute_drawdown(&curve);
        assert_relative_eq!(dd, 30.0 / 110.0, epsilon = 1e-12);
        assert_eq!(duration, 4);
    }

    #[test]
    fn rising_curve_has_positive_sharpe() {
        let values: Vec<f64> = (0..253)
            .map(|i| 100_000.0 * (1.0 + 0.001 * i as f64 + 0.0005 * (i % 3) as f64))
            .collect();
        let s = Summary::compute(&[], &make_equity_curve(&values), &[], 100_000.0, 0.0);
        assert!(s.sharpe_ratio > 0.0);
        assert!(s.sortino_ratio.is_finite());
    }

    #[test]
    fn flat_curve_has_zero_sharpe() {
        let curve = make_equity_curve(&[100_000.0; 10]);
        let s = Summary::compute(&[], &curve, &[], 100_000.0, 0.03);
        assert_eq!(s.sharpe_ratio, 0.0);
        assert_eq!(s.sortino_ratio, 0.0);
    }

    #[test]
    fn skipped_signals_are_counted_by_side() {
        let skipped = vec![
            skip(Side::Buy, SkipReason::LimitUp),
            skip(Side::Buy, SkipReason::Suspended),
            skip(Side::Sell, SkipReason::LimitDown),
            skip(Side::Buy, SkipReason::InsufficientCapital),
        ];
        let s = Summary::compute(&[], &[], &skipped, 100_000.0, 0.03);
        assert_eq!(s.blocked_buys, 2);
        assert_eq!(s.blocked_sells, 1);
        assert_eq!(s.unaffordable_buys, 1);
    }
}
