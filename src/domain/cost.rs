//! Transaction cost model: commission with a minimum fee, sell-side stamp tax
//! and a two-sided transfer fee.

use crate::domain::execution::Side;

pub const DEFAULT_COMMISSION_RATE: f64 = 0.0001;
pub const DEFAULT_MINIMUM_FEE: f64 = 5.0;
pub const DEFAULT_TAX_RATE: f64 = 0.0005;
pub const DEFAULT_TRANSFER_FEE_RATE: f64 = 0.00001;

/// Fee schedule for one market. All rates are fractions of notional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub commission_rate: f64,
    pub minimum_fee: f64,
    pub tax_rate: f64,
    pub transfer_fee_rate: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            commission_rate: DEFAULT_COMMISSION_RATE,
            minimum_fee: DEFAULT_MINIMUM_FEE,
            tax_rate: DEFAULT_TAX_RATE,
            transfer_fee_rate: DEFAULT_TRANSFER_FEE_RATE,
        }
    }
}

/// Costs charged on one leg of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CostBreakdown {
    pub commission: f64,
    pub tax: f64,
    pub transfer_fee: f64,
    /// The minimum fee, not the rate, set the commission.
    pub fee_floor_applied: bool,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.commission + self.tax + self.transfer_fee
    }
}

impl CostModel {
    /// A schedule with no frictions at all.
    pub fn zero() -> Self {
        CostModel {
            commission_rate: 0.0,
            minimum_fee: 0.0,
            tax_rate: 0.0,
            transfer_fee_rate: 0.0,
        }
    }

    pub fn compute_cost(&self, notional: f64, side: Side) -> CostBreakdown {
        let raw_commission = notional * self.commission_rate;
        let fee_floor_applied = raw_commission < self.minimum_fee;
        let commission = raw_commission.max(self.minimum_fee);

        let tax = match side {
            Side::Sell => notional * self.tax_rate,
            Side::Buy => 0.0,
        };

        CostBreakdown {
            commission,
            tax,
            transfer_fee: notional * self.transfer_fee_rate,
            fee_floor_applied,
        }
    }

    /// Cash leaving the account for a buy: notional plus costs.
    pub fn net_cost(&self, notional: f64) -> f64 {
        notional + self.compute_cost(notional, Side::Buy).total()
    }

    /// Cash received for a sell: notional minus costs.
    pub fn net_proceeds(&self, notional: f64) -> f64 {
        notional - self.compute_cost(notional, Side::Sell).total()
    }
}
