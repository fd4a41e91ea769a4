//! Execution rules: daily price-limit and trading-halt checks.
//!
//! A bar closing at the upper limit is treated as unbuyable (sellers have
//! vanished from the book); a bar closing at the lower limit is unsellable.
//! Fills that pass the check execute at the bar's close.

use std::collections::HashMap;
use std::fmt;

use crate::domain::ohlcv::Bar;

pub const DEFAULT_LIMIT_RATE: f64 = 0.10;
/// Half a price tick.
pub const DEFAULT_LIMIT_TOLERANCE: f64 = 0.005;

const STAR_CHINEXT_LIMIT_RATE: f64 = 0.20;
const BEIJING_LIMIT_RATE: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionDecision {
    Allowed,
    BlockedLimitUp,
    BlockedLimitDown,
    BlockedSuspended,
}

impl ExecutionDecision {
    pub fn is_allowed(self) -> bool {
        self == ExecutionDecision::Allowed
    }
}

/// Price-limit parameters for one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitRule {
    /// Maximum daily move as a fraction of the previous close.
    pub rate: f64,
    /// Absolute price slack when comparing the close with the limit price.
    pub tolerance: f64,
    /// Refuse fills on zero-volume (halted) sessions.
    pub block_suspended: bool,
}

impl LimitRule {
    pub fn new(rate: f64) -> Self {
        LimitRule {
            rate,
            ..Default::default()
        }
    }

    /// Limit-up price, rounded to the cent like exchange-published limits.
    pub fn limit_up_price(&self, prev_close: f64) -> f64 {
        round_to_cent(prev_close * (1.0 + self.rate))
    }

    pub fn limit_down_price(&self, prev_close: f64) -> f64 {
        round_to_cent(prev_close * (1.0 - self.rate))
    }

    pub fn is_limit_up(&self, close: f64, prev_close: f64) -> bool {
        close >= self.limit_up_price(prev_close) - self.tolerance
    }

    pub fn is_limit_down(&self, close: f64, prev_close: f64) -> bool {
        close <= self.limit_down_price(prev_close) + self.tolerance
    }
}

impl Default for LimitRule {
    fn default() -> Self {
        LimitRule {
            rate: DEFAULT_LIMIT_RATE,
            tolerance: DEFAULT_LIMIT_TOLERANCE,
            block_suspended: true,
        }
    }
}

fn round_to_cent(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Decide whether an order on `side` can fill at `bar`'s close.
///
/// Without a usable previous close (first bar of a series) the limit check
/// is skipped.
pub fn can_execute(
    bar: &Bar,
    previous_close: Option<f64>,
    side: Side,
    rule: &LimitRule,
) -> ExecutionDecision {
    if rule.block_suspended && bar.is_suspended() {
        return ExecutionDecision::BlockedSuspended;
    }

    let prev_close = match previous_close {
        Some(pc) if pc > 0.0 => pc,
        _ => return ExecutionDecision::Allowed,
    };

    match side {
        Side::Buy if rule.is_limit_up(bar.close, prev_close) => ExecutionDecision::BlockedLimitUp,
        Side::Sell if rule.is_limit_down(bar.close, prev_close) => {
            ExecutionDecision::BlockedLimitDown
        }
        _ => ExecutionDecision::Allowed,
    }
}

/// Resolves the limit rate for each symbol.
///
/// Lookup order: explicit override, board inferred from the code prefix
/// (when enabled), default rate.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitSchedule {
    pub default_rate: f64,
    pub tolerance: f64,
    pub block_suspended: bool,
    pub infer_board_limits: bool,
    pub overrides: HashMap<String, f64>,
}

impl Default for LimitSchedule {
    fn default() -> Self {
        LimitSchedule {
            default_rate: DEFAULT_LIMIT_RATE,
            tolerance: DEFAULT_LIMIT_TOLERANCE,
            block_suspended: true,
            infer_board_limits: true,
            overrides: HashMap::new(),
        }
    }
}

impl LimitSchedule {
    pub fn rate_for(&self, code: &str) -> f64 {
        if let Some(&rate) = self.overrides.get(code) {
            return rate;
        }
        if self.infer_board_limits {
            if let Some(rate) = board_limit_rate(code) {
                return rate;
            }
        }
        self.default_rate
    }

    pub fn rule_for(&self, code: &str) -> LimitRule {
        LimitRule {
            rate: self.rate_for(code),
            tolerance: self.tolerance,
            block_suspended: self.block_suspended,
        }
    }
}

/// Limit band implied by the listing board, for boards wider than main board.
fn board_limit_rate(code: &str) -> Option<f64> {
    let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 6 {
        return None;
    }
    if digits.starts_with("688")
        || digits.starts_with("689")
        || digits.starts_with("300")
        || digits.starts_with("301")
    {
        Some(STAR_CHINEXT_LIMIT_RATE)
    } else if digits.starts_with('4') || digits.starts_with('8') || digits.starts_with("92") {
        Some(BEIJING_LIMIT_RATE)
    } else {
        None
    }
}
