//! Position ledger: cash, the single open position and closed-trade records.

use chrono::NaiveDate;

use crate::domain::cost::{CostBreakdown, CostModel};
use crate::domain::error::LedgerError;
use crate::domain::execution::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: u64,
    pub entry_costs: CostBreakdown,
}

impl Position {
    pub fn notional(&self) -> f64 {
        self.shares as f64 * self.entry_price
    }

    /// Notional plus buy-leg costs.
    pub fn cost_basis(&self) -> f64 {
        self.notional() + self.entry_costs.total()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }
}

/// A completed round trip. Returns are fractions (-0.05 is a 5% loss).
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub shares: u64,
    pub gross_return_pct: f64,
    pub net_return_pct: f64,
    pub holding_days: i64,
    pub entry_costs: CostBreakdown,
    pub exit_costs: CostBreakdown,
    pub net_pnl: f64,
}

impl TradeRecord {
    pub fn total_costs(&self) -> f64 {
        self.entry_costs.total() + self.exit_costs.total()
    }

    pub fn is_win(&self) -> bool {
        self.net_return_pct > 0.0
    }
}

/// Valuation of a position still open when the data runs out. Not a trade.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkToMarket {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: u64,
    pub mark_date: NaiveDate,
    pub mark_price: f64,
    pub gross_return_pct: f64,
    /// Return after buy costs and the costs a sell at `mark_price` would incur.
    pub net_return_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    cost_model: CostModel,
    cash: f64,
    position: Option<Position>,
}

impl Ledger {
    pub fn new(initial_capital: f64, cost_model: CostModel) -> Self {
        Ledger {
            cost_model,
            cash: initial_capital,
            position: None,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_long(&self) -> bool {
        self.position.is_some()
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Cash plus the open position valued at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash
            + self
                .position
                .as_ref()
                .map_or(0.0, |pos| pos.market_value(price))
    }

    /// Open a long position, paying notional plus buy costs from cash.
    pub fn open(&mut self, date: NaiveDate, price: f64, shares: u64) -> Result<(), LedgerError> {
        if let Some(pos) = &self.position {
            return Err(LedgerError::AlreadyLong {
                date,
                entry_date: pos.entry_date,
            });
        }
        if shares == 0 {
            return Err(LedgerError::ZeroShares { date });
        }

        let notional = shares as f64 * price;
        let entry_costs = self.cost_model.compute_cost(notional, Side::Buy);
        let required = notional + entry_costs.total();
        if required > self.cash {
            return Err(LedgerError::InsufficientCash {
                date,
                required,
                available: self.cash,
            });
        }

        self.cash -= required;
        self.position = Some(Position {
            entry_date: date,
            entry_price: price,
            shares,
            entry_costs,
        });
        Ok(())
    }

    /// Close the open position at `price` and return the finished trade.
    pub fn close(&mut self, date: NaiveDate, price: f64) -> Result<TradeRecord, LedgerError> {
        let pos = match &self.position {
            Some(pos) => pos,
            None => return Err(LedgerError::AlreadyFlat { date }),
        };
        if date <= pos.entry_date {
            return Err(LedgerError::ExitNotAfterEntry {
                entry_date: pos.entry_date,
                exit_date: date,
            });
        }

        let exit_notional = pos.market_value(price);
        let exit_costs = self.cost_model.compute_cost(exit_notional, Side::Sell);
        let proceeds = exit_notional - exit_costs.total();
        let basis = pos.cost_basis();

        let trade = TradeRecord {
            entry_date: pos.entry_date,
            entry_price: pos.entry_price,
            exit_date: date,
            exit_price: price,
            shares: pos.shares,
            gross_return_pct: price / pos.entry_price - 1.0,
            net_return_pct: proceeds / basis - 1.0,
            holding_days: (date - pos.entry_date).num_days(),
            entry_costs: pos.entry_costs,
            exit_costs,
            net_pnl: proceeds - basis,
        };

        self.cash += proceeds;
        self.position = None;
        Ok(trade)
    }

    /// Value the open position as if sold at `price` on `date`. `None` when flat.
    pub fn mark_to_market(&self, date: NaiveDate, price: f64) -> Option<MarkToMarket> {
        let pos = self.position.as_ref()?;
        let proceeds = self.cost_model.net_proceeds(pos.market_value(price));
        Some(MarkToMarket {
            entry_date: pos.entry_date,
            entry_price: pos.entry_price,
            shares: pos.shares,
            mark_date: date,
            mark_price: price,
            gross_return_pct: price / pos.entry_price - 1.0,
            net_return_pct: proceeds / pos.cost_basis() - 1.0,
        })
    }
}
