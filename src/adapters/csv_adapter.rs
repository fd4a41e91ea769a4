//! CSV file data adapter: one `<code>.csv` per symbol under a base directory.
//!
//! Columns are located by header name, so extra vendor columns are ignored.
//! Required: `date,open,high,low,close,volume`. Optional: `prev_close`,
//! `signal`.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::domain::signal::Signal;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Column positions resolved from the header row.
struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    prev_close: Option<usize>,
    signal: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, BacktestError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| BacktestError::Data {
                reason: format!("missing {} column", name),
            })
        };

        Ok(Columns {
            date: require("date")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: require("volume")?,
            prev_close: find("prev_close"),
            signal: find("signal"),
        })
    }
}

struct Row {
    bar: Bar,
    signal: Option<String>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    /// Parse every row, drop bad price rows and sort by date.
    fn read_rows(&self, code: &str) -> Result<(Vec<Row>, bool), BacktestError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| BacktestError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| BacktestError::Data {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let cols = Columns::from_headers(headers)?;

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| BacktestError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            rows.push(parse_row(code, &record, &cols, line + 2)?);
        }

        rows.retain(|r| r.bar.has_valid_prices());
        rows.sort_by_key(|r| r.bar.date);
        Ok((rows, cols.signal.is_some()))
    }
}

fn field<'a>(
    record: &'a StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'a str, BacktestError> {
    record.get(index).ok_or_else(|| BacktestError::Data {
        reason: format!("line {}: missing {} value", line, name),
    })
}

fn parse_number<T>(raw: &str, name: &str, line: usize) -> Result<T, BacktestError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| BacktestError::Data {
        reason: format!("line {}: invalid {} value {:?}: {}", line, name, raw, e),
    })
}

fn parse_row(
    code: &str,
    record: &StringRecord,
    cols: &Columns,
    line: usize,
) -> Result<Row, BacktestError> {
    let date_str = field(record, cols.date, "date", line)?;
    let date =
        NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| BacktestError::Data {
            reason: format!("line {}: invalid date format: {}", line, e),
        })?;

    // Vendors export volume as a float on some feeds.
    let volume_raw = field(record, cols.volume, "volume", line)?;
    let volume = match volume_raw.parse::<i64>() {
        Ok(v) => v,
        Err(_) => parse_number::<f64>(volume_raw, "volume", line)? as i64,
    };

    let prev_close = match cols.prev_close {
        Some(i) => match record.get(i) {
            Some(raw) if !raw.is_empty() => Some(parse_number(raw, "prev_close", line)?),
            _ => None,
        },
        None => None,
    };

    Ok(Row {
        bar: Bar {
            code: code.to_string(),
            date,
            open: parse_number(field(record, cols.open, "open", line)?, "open", line)?,
            high: parse_number(field(record, cols.high, "high", line)?, "high", line)?,
            low: parse_number(field(record, cols.low, "low", line)?, "low", line)?,
            close: parse_number(field(record, cols.close, "close", line)?, "close", line)?,
            volume,
            prev_close,
        },
        signal: cols
            .signal
            .and_then(|i| record.get(i))
            .map(str::to_string),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, code: &str) -> Result<Vec<Bar>, BacktestError> {
        let (rows, _) = self.read_rows(code)?;
        Ok(rows.into_iter().map(|r| r.bar).collect())
    }

    fn fetch_signals(&self, code: &str) -> Result<Vec<(NaiveDate, Signal)>, BacktestError> {
        let (rows, has_signal) = self.read_rows(code)?;
        if !has_signal {
            return Err(BacktestError::Data {
                reason: format!("{} has no signal column", self.csv_path(code).display()),
            });
        }
        rows.into_iter()
            .map(|r| {
                let signal = r.signal.as_deref().unwrap_or("").parse::<Signal>()?;
                Ok((r.bar.date, signal))
            })
            .collect()
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BacktestError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BacktestError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let path = entry.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            // Trade logs written next to the data are not symbols.
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.ends_with("_trades") {
                    symbols.push(stem.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
