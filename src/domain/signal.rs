//! Trading signals and their alignment with the bar series.
//!
//! Signals reach the engine as a closed enum. Loosely typed markers from
//! upstream tools (strings, +1/-1 flags, crossover names) are converted here.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::error::InputError;
use crate::domain::indicator::{IndicatorSeries, IndicatorValue};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

impl FromStr for Signal {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "b" | "long" | "1" | "+1" | "golden" | "golden_cross" => Ok(Signal::Buy),
            "sell" | "s" | "exit" | "-1" | "death" | "death_cross" => Ok(Signal::Sell),
            "" | "hold" | "h" | "none" | "0" | "nan" => Ok(Signal::Hold),
            _ => Err(InputError::UnknownSignal(s.to_string())),
        }
    }
}

impl From<i8> for Signal {
    fn from(flag: i8) -> Self {
        match flag.signum() {
            1 => Signal::Buy,
            -1 => Signal::Sell,
            _ => Signal::Hold,
        }
    }
}

/// Pair externally dated signals with the bar series.
///
/// Every bar must have exactly one signal carrying the same date.
pub fn align_signals(
    bars: &[Bar],
    dated: &[(NaiveDate, Signal)],
) -> Result<Vec<Signal>, InputError> {
    if bars.len() != dated.len() {
        return Err(InputError::LengthMismatch {
            bars: bars.len(),
            signals: dated.len(),
        });
    }
    bars.iter()
        .zip(dated)
        .enumerate()
        .map(|(index, (bar, &(signal_date, signal)))| {
            if bar.date == signal_date {
                Ok(signal)
            } else {
                Err(InputError::SignalDateMismatch {
                    index,
                    bar_date: bar.date,
                    signal_date,
                })
            }
        })
        .collect()
}

/// MACD crossover rule: BUY when DIF crosses above DEA, SELL when it crosses
/// below, HOLD otherwise. The first point, and any point whose predecessor is
/// not valid, is HOLD.
pub fn macd_crossover_signals(series: &IndicatorSeries) -> Vec<Signal> {
    let mut signals = Vec::with_capacity(series.values.len());
    let mut prev: Option<(f64, f64)> = None;

    for point in &series.values {
        let current = match point.value {
            IndicatorValue::Macd { line, signal, .. } if point.valid => Some((line, signal)),
            _ => None,
        };

        let sig = match (prev, current) {
            (Some((prev_dif, prev_dea)), Some((dif, dea))) => {
                if prev_dif <= prev_dea && dif > dea {
                    Signal::Buy
                } else if prev_dif >= prev_dea && dif < dea {
                    Signal::Sell
                } else {
                    Signal::Hold
                }
            }
            _ => Signal::Hold,
        };

        signals.push(sig);
        prev = current;
    }

    signals
}
