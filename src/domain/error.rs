//! Domain error types.

use chrono::NaiveDate;

/// Bar/signal input that cannot be replayed. Raised before any trade is computed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("bar/signal length mismatch: {bars} bars, {signals} signals")]
    LengthMismatch { bars: usize, signals: usize },

    #[error("dates not strictly increasing at index {index}: {previous} then {current}")]
    NonMonotonicDates {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("signal at index {index} is dated {signal_date}, bar is dated {bar_date}")]
    SignalDateMismatch {
        index: usize,
        bar_date: NaiveDate,
        signal_date: NaiveDate,
    },

    #[error("unrecognized signal value {0:?}")]
    UnknownSignal(String),
}

/// Ledger misuse. The engine's state machine never produces these when wired
/// correctly, so seeing one means a logic defect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("cannot open on {date}: a position is already open since {entry_date}")]
    AlreadyLong {
        date: NaiveDate,
        entry_date: NaiveDate,
    },

    #[error("cannot close on {date}: no open position")]
    AlreadyFlat { date: NaiveDate },

    #[error("cannot open on {date} with zero shares")]
    ZeroShares { date: NaiveDate },

    #[error("cannot open on {date}: cost {required:.2} exceeds cash {available:.2}")]
    InsufficientCash {
        date: NaiveDate,
        required: f64,
        available: f64,
    },

    #[error("exit on {exit_date} is not after entry on {entry_date}")]
    ExitNotAfterEntry {
        entry_date: NaiveDate,
        exit_date: NaiveDate,
    },
}

/// Top-level error type for ashare-backtest.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("invalid ledger state: {0}")]
    InvalidState(#[from] LedgerError),

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) | BacktestError::Report { .. } => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. } => 2,
            BacktestError::Data { .. }
            | BacktestError::NoData { .. }
            | BacktestError::InsufficientData { .. } => 3,
            BacktestError::Input(_) => 4,
            BacktestError::InvalidState(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn input_error_converts_into_top_level() {
        let err: BacktestError = InputError::LengthMismatch { bars: 3, signals: 2 }.into();
        assert!(matches!(err, BacktestError::Input(_)));
        assert_eq!(
            err.to_string(),
            "bar/signal length mismatch: 3 bars, 2 signals"
        );
    }

    #[test]
    fn ledger_error_message_names_dates() {
        let err: BacktestError = LedgerError::AlreadyLong {
            date: d(5),
            entry_date: d(4),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid ledger state: cannot open on 2024-03-05: a position is already open since 2024-03-04"
        );
    }

    #[test]
    fn unknown_signal_quotes_value() {
        let err = InputError::UnknownSignal("maybe".into());
        assert_eq!(err.to_string(), "unrecognized signal value \"maybe\"");
    }

    #[test]
    fn exit_codes_by_category() {
        use std::process::ExitCode;

        let cases: Vec<(BacktestError, ExitCode)> = vec![
            (
                BacktestError::Io(std::io::Error::other("disk")),
                ExitCode::from(1),
            ),
            (
                BacktestError::ConfigMissing {
                    section: "costs".into(),
                    key: "tax_rate".into(),
                },
                ExitCode::from(2),
            ),
            (
                BacktestError::NoData { code: "000001".into() },
                ExitCode::from(3),
            ),
            (
                BacktestError::Input(InputError::UnknownSignal("x".into())),
                ExitCode::from(4),
            ),
            (
                BacktestError::InvalidState(LedgerError::AlreadyFlat { date: d(1) }),
                ExitCode::from(5),
            ),
        ];
        for (err, expected) in &cases {
            assert_eq!(ExitCode::from(err), *expected, "{err}");
        }
    }
}
