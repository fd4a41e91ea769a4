//! Configuration validation.
//!
//! Checks every INI value the backtester reads before a run starts. Keys that
//! are absent fall back to market defaults; keys that are present must parse
//! and be in range.

use std::collections::HashMap;

use crate::domain::error::BacktestError;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_backtest_section(config)?;
    validate_costs(config)?;
    validate_limits(config)?;
    validate_signal(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BacktestError {
    BacktestError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// `Ok(None)` when the key is absent; an error when present but not a number.
fn optional_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("{:?} is not a number", raw))),
    }
}

fn optional_i64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("{:?} is not an integer", raw))),
    }
}

fn validate_rate(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), BacktestError> {
    if let Some(value) = optional_f64(config, section, key)? {
        if !(0.0..1.0).contains(&value) {
            return Err(invalid(section, key, format!("{} must be in [0, 1)", key)));
        }
    }
    Ok(())
}

fn validate_backtest_section(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(capital) = optional_f64(config, "backtest", "initial_capital")? {
        if capital <= 0.0 {
            return Err(invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
    }

    if let Some(lot) = optional_i64(config, "backtest", "lot_size")? {
        if lot < 1 {
            return Err(invalid("backtest", "lot_size", "lot_size must be at least 1"));
        }
    }

    validate_rate(config, "backtest", "cash_buffer")?;
    validate_rate(config, "backtest", "risk_free_rate")?;

    if let Some(min_bars) = optional_i64(config, "backtest", "min_bars")? {
        if min_bars < 1 {
            return Err(invalid("backtest", "min_bars", "min_bars must be at least 1"));
        }
    }

    let sizing = config
        .get_string("backtest", "position_sizing")
        .unwrap_or_else(|| "all-in".to_string());
    match sizing.trim().to_lowercase().as_str() {
        "all-in" | "all_in" => Ok(()),
        "fixed" => validate_fixed_shares(config),
        other => Err(invalid(
            "backtest",
            "position_sizing",
            format!("unknown sizing {:?}, expected all-in or fixed", other),
        )),
    }
}

fn validate_fixed_shares(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let shares = optional_i64(config, "backtest", "fixed_shares")?.ok_or_else(|| {
        BacktestError::ConfigMissing {
            section: "backtest".to_string(),
            key: "fixed_shares".to_string(),
        }
    })?;
    let lot = optional_i64(config, "backtest", "lot_size")?.unwrap_or(100);
    if shares < lot {
        return Err(invalid(
            "backtest",
            "fixed_shares",
            format!("fixed_shares must be at least one lot ({})", lot),
        ));
    }
    Ok(())
}

fn validate_costs(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_rate(config, "costs", "commission_rate")?;
    validate_rate(config, "costs", "tax_rate")?;
    validate_rate(config, "costs", "transfer_fee_rate")?;
    if let Some(fee) = optional_f64(config, "costs", "minimum_fee")? {
        if fee < 0.0 {
            return Err(invalid(
                "costs",
                "minimum_fee",
                "minimum_fee must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_limit_rate(section: &str, key: &str, rate: f64) -> Result<(), BacktestError> {
    if rate <= 0.0 || rate >= 1.0 {
        return Err(invalid(
            section,
            key,
            format!("limit rate {} must be in (0, 1)", rate),
        ));
    }
    Ok(())
}

fn validate_limits(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(rate) = optional_f64(config, "limits", "price_limit_rate")? {
        validate_limit_rate("limits", "price_limit_rate", rate)?;
    }
    if let Some(tol) = optional_f64(config, "limits", "limit_tolerance")? {
        if tol < 0.0 {
            return Err(invalid(
                "limits",
                "limit_tolerance",
                "limit_tolerance must be non-negative",
            ));
        }
    }
    if let Some(raw) = config.get_string("limits", "overrides") {
        parse_limit_overrides(&raw)?;
    }
    Ok(())
}

/// Parse `code:rate` pairs separated by commas, e.g. `600000:0.05, 300750:0.2`.
pub fn parse_limit_overrides(raw: &str) -> Result<HashMap<String, f64>, BacktestError> {
    let mut overrides = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (code, rate) = entry.split_once(':').ok_or_else(|| {
            invalid("limits", "overrides", format!("{:?} is not code:rate", entry))
        })?;
        let code = code.trim();
        if code.is_empty() {
            return Err(invalid("limits", "overrides", format!("{:?} has no code", entry)));
        }
        let rate: f64 = rate.trim().parse().map_err(|_| {
            invalid(
                "limits",
                "overrides",
                format!("{:?} has a non-numeric rate", entry),
            )
        })?;
        validate_limit_rate("limits", "overrides", rate)?;
        overrides.insert(code.to_string(), rate);
    }
    Ok(overrides)
}

fn validate_signal(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let source = config
        .get_string("signal", "source")
        .unwrap_or_else(|| "macd".to_string());
    match source.trim().to_lowercase().as_str() {
        "column" => return Ok(()),
        "macd" => {}
        other => {
            return Err(invalid(
                "signal",
                "source",
                format!("unknown signal source {:?}, expected macd or column", other),
            ));
        }
    }

    let fast = optional_i64(config, "signal", "fast")?.unwrap_or(12);
    let slow = optional_i64(config, "signal", "slow")?.unwrap_or(26);
    let signal = optional_i64(config, "signal", "signal")?.unwrap_or(9);
    if fast < 1 || slow < 1 || signal < 1 {
        return Err(invalid("signal", "fast", "MACD periods must be at least 1"));
    }
    if fast >= slow {
        return Err(invalid(
            "signal",
            "slow",
            "slow period must be longer than fast period",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockConfig {
        values: HashMap<(String, String), String>,
    }

    impl MockConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let values = entries
                .iter()
                .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                .collect();
            Self { values }
        }
    }

    impl ConfigPort for MockConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    fn assert_invalid(config: &MockConfig, section: &str, key: &str) {
        match validate_config(config) {
            Err(BacktestError::ConfigInvalid {
                section: s, key: k, ..
            }) => {
                assert_eq!(s, section);
                assert_eq!(k, key);
            }
            other => panic!("expected ConfigInvalid [{}] {}, got {:?}", section, key, other),
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert!(validate_config(&MockConfig::new(&[])).is_ok());
    }

    #[test]
    fn full_config_is_valid() {
        let config = MockConfig::new(&[
            ("backtest", "initial_capital", "100000"),
            ("backtest", "position_sizing", "fixed"),
            ("backtest", "fixed_shares", "1000"),
            ("backtest", "lot_size", "100"),
            ("backtest", "cash_buffer", "0.002"),
            ("backtest", "min_bars", "35"),
            ("costs", "commission_rate", "0.0001"),
            ("costs", "minimum_fee", "5"),
            ("costs", "tax_rate", "0.0005"),
            ("costs", "transfer_fee_rate", "0.00001"),
            ("limits", "price_limit_rate", "0.10"),
            ("limits", "limit_tolerance", "0.005"),
            ("limits", "overrides", "600000:0.05, 300750:0.20"),
            ("signal", "source", "macd"),
            ("signal", "fast", "12"),
            ("signal", "slow", "26"),
            ("signal", "signal", "9"),
        ]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_non_positive_capital() {
        let config = MockConfig::new(&[("backtest", "initial_capital", "0")]);
        assert_invalid(&config, "backtest", "initial_capital");
    }

    #[test]
    fn rejects_non_numeric_capital() {
        let config = MockConfig::new(&[("backtest", "initial_capital", "lots")]);
        assert_invalid(&config, "backtest", "initial_capital");
    }

    #[test]
    fn rejects_unknown_sizing() {
        let config = MockConfig::new(&[("backtest", "position_sizing", "kelly")]);
        assert_invalid(&config, "backtest", "position_sizing");
    }

    #[test]
    fn fixed_sizing_requires_shares() {
        let config = MockConfig::new(&[("backtest", "position_sizing", "fixed")]);
        assert!(matches!(
            validate_config(&config),
            Err(BacktestError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn fixed_shares_below_one_lot() {
        let config = MockConfig::new(&[
            ("backtest", "position_sizing", "fixed"),
            ("backtest", "fixed_shares", "50"),
        ]);
        assert_invalid(&config, "backtest", "fixed_shares");
    }

    #[test]
    fn rejects_zero_lot_size() {
        let config = MockConfig::new(&[("backtest", "lot_size", "0")]);
        assert_invalid(&config, "backtest", "lot_size");
    }

    #[test]
    fn rejects_cash_buffer_of_one() {
        let config = MockConfig::new(&[("backtest", "cash_buffer", "1.0")]);
        assert_invalid(&config, "backtest", "cash_buffer");
    }

    #[test]
    fn rejects_negative_commission() {
        let config = MockConfig::new(&[("costs", "commission_rate", "-0.001")]);
        assert_invalid(&config, "costs", "commission_rate");
    }

    #[test]
    fn rejects_negative_minimum_fee() {
        let config = MockConfig::new(&[("costs", "minimum_fee", "-5")]);
        assert_invalid(&config, "costs", "minimum_fee");
    }

    #[test]
    fn rejects_zero_limit_rate() {
        let config = MockConfig::new(&[("limits", "price_limit_rate", "0")]);
        assert_invalid(&config, "limits", "price_limit_rate");
    }

    #[test]
    fn rejects_malformed_override() {
        let config = MockConfig::new(&[("limits", "overrides", "600000=0.05")]);
        assert_invalid(&config, "limits", "overrides");
    }

    #[test]
    fn rejects_unknown_signal_source() {
        let config = MockConfig::new(&[("signal", "source", "rsi")]);
        assert_invalid(&config, "signal", "source");
    }

    #[test]
    fn rejects_fast_not_below_slow() {
        let config = MockConfig::new(&[("signal", "fast", "26"), ("signal", "slow", "12")]);
        assert_invalid(&config, "signal", "slow");
    }

    #[test]
    fn column_source_ignores_macd_periods() {
        let config = MockConfig::new(&[("signal", "source", "column"), ("signal", "fast", "0")]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn parse_overrides() {
        let map = parse_limit_overrides("600000:0.05, 300750:0.20,").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["600000"], 0.05);
        assert_eq!(map["300750"], 0.20);
        assert!(parse_limit_overrides("").unwrap().is_empty());
    }

    #[test]
    fn parse_overrides_rejects_bad_rate() {
        assert!(parse_limit_overrides("600000:abc").is_err());
        assert!(parse_limit_overrides("600000:1.5").is_err());
        assert!(parse_limit_overrides(":0.1").is_err());
    }
}
