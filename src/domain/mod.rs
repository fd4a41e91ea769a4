//! Core domain types and logic.

pub mod ohlcv;
pub mod signal;
pub mod indicator;
pub mod execution;
pub mod cost;
pub mod ledger;
pub mod backtest;
pub mod metrics;
pub mod batch;
pub mod config_validation;
pub mod error;
