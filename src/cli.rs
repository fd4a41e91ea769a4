//! CLI definition and dispatch.
//!
//! Each subcommand loads and validates the INI config, wires the CSV adapters
//! to the domain and maps any [`BacktestError`] to a process exit code.
//! Progress goes to the log on stderr; result tables go to stdout.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{
    BacktestConfig, BacktestResult, PositionSizing, DEFAULT_CASH_BUFFER, DEFAULT_INITIAL_CAPITAL,
    DEFAULT_LOT_SIZE, DEFAULT_RISK_FREE_RATE,
};
use crate::domain::batch::{
    run_batch, run_symbol, BatchConfig, BatchReport, SignalSource, DEFAULT_MIN_BARS,
};
use crate::domain::config_validation::{parse_limit_overrides, validate_config};
use crate::domain::cost::{
    CostModel, DEFAULT_COMMISSION_RATE, DEFAULT_MINIMUM_FEE, DEFAULT_TAX_RATE,
    DEFAULT_TRANSFER_FEE_RATE,
};
use crate::domain::error::BacktestError;
use crate::domain::execution::{LimitSchedule, DEFAULT_LIMIT_RATE, DEFAULT_LIMIT_TOLERANCE};
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_OUTPUT_DIR: &str = "out";
const BATCH_SUMMARY_FILE: &str = "batch_summary.csv";

#[derive(Parser, Debug)]
#[command(
    name = "ashare-backtest",
    about = "Daily-bar backtester with price-limit execution rules"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a single symbol and write its trade log
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        /// Overrides [data] data_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Overrides [data] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Backtest many symbols in parallel and write a summary table
    Batch {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated codes; defaults to [backtest] codes, then every file in data_dir
        #[arg(long)]
        codes: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker threads (default: one per core)
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            code,
            data_dir,
            output,
        } => run_backtest(&config, &code, data_dir.as_deref(), output.as_deref()),
        Command::Batch {
            config,
            codes,
            data_dir,
            output,
            threads,
        } => run_batch_command(
            &config,
            codes.as_deref(),
            data_dir.as_deref(),
            output.as_deref(),
            threads,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config, data_dir } => {
            run_list_symbols(config.as_deref(), data_dir.as_deref())
        }
    }
}

fn fail(err: &BacktestError) -> ExitCode {
    error!("{err}");
    ExitCode::from(err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    info!("loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| fail(&e))?;
    validate_config(&adapter).map_err(|e| fail(&e))?;
    Ok(adapter)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    let lot_size = adapter
        .get_int("backtest", "lot_size", DEFAULT_LOT_SIZE as i64)
        .max(1) as u64;

    let sizing = match adapter
        .get_string("backtest", "position_sizing")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        None | Some("all-in") | Some("all_in") => PositionSizing::AllIn,
        Some("fixed") => {
            let shares = adapter.get_int("backtest", "fixed_shares", 0);
            if shares <= 0 {
                return Err(BacktestError::ConfigMissing {
                    section: "backtest".into(),
                    key: "fixed_shares".into(),
                });
            }
            PositionSizing::Fixed(shares as u64)
        }
        Some(other) => {
            return Err(BacktestError::ConfigInvalid {
                section: "backtest".into(),
                key: "position_sizing".into(),
                reason: format!("unknown sizing {:?}", other),
            });
        }
    };

    let costs = CostModel {
        commission_rate: adapter.get_double("costs", "commission_rate", DEFAULT_COMMISSION_RATE),
        minimum_fee: adapter.get_double("costs", "minimum_fee", DEFAULT_MINIMUM_FEE),
        tax_rate: adapter.get_double("costs", "tax_rate", DEFAULT_TAX_RATE),
        transfer_fee_rate: adapter.get_double(
            "costs",
            "transfer_fee_rate",
            DEFAULT_TRANSFER_FEE_RATE,
        ),
    };

    let overrides = match adapter.get_string("limits", "overrides") {
        Some(raw) => parse_limit_overrides(&raw)?,
        None => Default::default(),
    };
    let limits = LimitSchedule {
        default_rate: adapter.get_double("limits", "price_limit_rate", DEFAULT_LIMIT_RATE),
        tolerance: adapter.get_double("limits", "limit_tolerance", DEFAULT_LIMIT_TOLERANCE),
        block_suspended: adapter.get_bool("limits", "block_suspended", true),
        infer_board_limits: adapter.get_bool("limits", "infer_board_limits", true),
        overrides,
    };

    Ok(BacktestConfig {
        initial_capital: adapter.get_double(
            "backtest",
            "initial_capital",
            DEFAULT_INITIAL_CAPITAL,
        ),
        costs,
        limits,
        sizing,
        lot_size,
        cash_buffer: adapter.get_double("backtest", "cash_buffer", DEFAULT_CASH_BUFFER),
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE),
    })
}

pub fn build_batch_config(
    adapter: &dyn ConfigPort,
    threads: Option<usize>,
) -> Result<BatchConfig, BacktestError> {
    let signal_source = match adapter
        .get_string("signal", "source")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        None | Some("macd") => SignalSource::Macd {
            fast: adapter.get_int("signal", "fast", DEFAULT_FAST as i64).max(1) as usize,
            slow: adapter.get_int("signal", "slow", DEFAULT_SLOW as i64).max(1) as usize,
            signal: adapter.get_int("signal", "signal", DEFAULT_SIGNAL as i64).max(1) as usize,
        },
        Some("column") => SignalSource::Column,
        Some(other) => {
            return Err(BacktestError::ConfigInvalid {
                section: "signal".into(),
                key: "source".into(),
                reason: format!("unknown signal source {:?}", other),
            });
        }
    };

    Ok(BatchConfig {
        backtest: build_backtest_config(adapter)?,
        signal_source,
        min_bars: adapter
            .get_int("backtest", "min_bars", DEFAULT_MIN_BARS as i64)
            .max(1) as usize,
        threads: threads.filter(|&n| n > 0),
    })
}

fn data_dir(adapter: Option<&dyn ConfigPort>, cli_override: Option<&Path>) -> PathBuf {
    resolve_dir(adapter, cli_override, "data_dir", DEFAULT_DATA_DIR)
}

fn output_dir(adapter: Option<&dyn ConfigPort>, cli_override: Option<&Path>) -> PathBuf {
    resolve_dir(adapter, cli_override, "output_dir", DEFAULT_OUTPUT_DIR)
}

fn resolve_dir(
    adapter: Option<&dyn ConfigPort>,
    cli_override: Option<&Path>,
    key: &str,
    default: &str,
) -> PathBuf {
    if let Some(p) = cli_override {
        return p.to_path_buf();
    }
    adapter
        .and_then(|a| a.get_string("data", key))
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Codes from the command line, else `[backtest] codes`, else every symbol the
/// data port knows.
pub fn resolve_codes(
    code_override: Option<&str>,
    config: &dyn ConfigPort,
    data: &dyn DataPort,
) -> Result<Vec<String>, BacktestError> {
    let split = |s: &str| -> Vec<String> {
        s.split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    };

    if let Some(c) = code_override {
        return Ok(split(c));
    }
    if let Some(codes) = config.get_string("backtest", "codes") {
        let codes = split(&codes);
        if !codes.is_empty() {
            return Ok(codes);
        }
    }
    data.list_symbols()
}

pub fn trade_log_path(output_dir: &Path, code: &str) -> PathBuf {
    output_dir.join(format!("{}_trades.csv", code))
}

/// Run one symbol end to end and write its trade log.
pub fn backtest_symbol(
    adapter: &dyn ConfigPort,
    code: &str,
    data_dir_override: Option<&Path>,
    output_override: Option<&Path>,
) -> Result<BacktestResult, BacktestError> {
    let config = build_batch_config(adapter, None)?;
    let data = CsvAdapter::new(data_dir(Some(adapter), data_dir_override));

    let result = run_symbol(&data, code, &config)?;

    let path = trade_log_path(&output_dir(Some(adapter), output_override), code);
    CsvReportAdapter::new().write_trade_log(&result.trades, &path)?;
    info!("trade log written to {}", path.display());
    Ok(result)
}

/// Run a batch end to end and write the summary plus one trade log per symbol.
pub fn backtest_batch(
    adapter: &dyn ConfigPort,
    codes_override: Option<&str>,
    data_dir_override: Option<&Path>,
    output_override: Option<&Path>,
    threads: Option<usize>,
) -> Result<BatchReport, BacktestError> {
    let config = build_batch_config(adapter, threads)?;
    let data = CsvAdapter::new(data_dir(Some(adapter), data_dir_override));

    let codes = resolve_codes(codes_override, adapter, &data)?;
    if codes.is_empty() {
        return Err(BacktestError::Data {
            reason: "no symbols to backtest".into(),
        });
    }
    info!(
        symbols = codes.len(),
        source = %config.signal_source,
        "running batch"
    );

    let report = run_batch(&data, &codes, &config)?;

    let out = output_dir(Some(adapter), output_override);
    let reporter = CsvReportAdapter::new();
    for result in &report.results {
        reporter.write_trade_log(&result.trades, &trade_log_path(&out, &result.code))?;
    }
    let summary_path = out.join(BATCH_SUMMARY_FILE);
    reporter.write_batch_summary(&report, &summary_path)?;
    info!("batch summary written to {}", summary_path.display());
    Ok(report)
}

fn run_backtest(
    config_path: &Path,
    code: &str,
    data_dir_override: Option<&Path>,
    output_override: Option<&Path>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match backtest_symbol(&adapter, code, data_dir_override, output_override) {
        Ok(result) => {
            print_result(&result);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_batch_command(
    config_path: &Path,
    codes: Option<&str>,
    data_dir_override: Option<&Path>,
    output_override: Option<&Path>,
    threads: Option<usize>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match backtest_batch(&adapter, codes, data_dir_override, output_override, threads) {
        Ok(report) => {
            print_batch(&report);
            if report.results.is_empty() {
                warn!("every symbol failed");
                return ExitCode::from(3);
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match build_batch_config(&adapter, None) {
        Ok(config) => {
            let bt = &config.backtest;
            println!("Configuration is valid.");
            println!("  Initial capital:  {:.2}", bt.initial_capital);
            println!("  Sizing:           {} (lot {})", bt.sizing, bt.lot_size);
            println!(
                "  Costs:            commission {} (min {:.2}), tax {}, transfer {}",
                bt.costs.commission_rate,
                bt.costs.minimum_fee,
                bt.costs.tax_rate,
                bt.costs.transfer_fee_rate
            );
            println!(
                "  Price limit:      {:.0}% (board inference {})",
                bt.limits.default_rate * 100.0,
                if bt.limits.infer_board_limits { "on" } else { "off" }
            );
            println!("  Signals:          {}", config.signal_source);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_list_symbols(config_path: Option<&Path>, data_dir_override: Option<&Path>) -> ExitCode {
    let adapter = match config_path.map(load_config).transpose() {
        Ok(a) => a,
        Err(code) => return code,
    };

    let dir = data_dir(adapter.as_ref().map(|a| a as &dyn ConfigPort), data_dir_override);
    match CsvAdapter::new(dir.clone()).list_symbols() {
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{}", symbol);
            }
            info!("{} symbols found in {}", symbols.len(), dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn print_result(result: &BacktestResult) {
    let s = &result.summary;
    println!("=== {} ===", result.code);
    println!("Trades:           {}", s.trade_count);
    println!("Win Rate:         {:.1}%", s.win_rate * 100.0);
    println!("Aggregate Net:    {:.2}%", s.aggregate_net_return * 100.0);
    println!("Total Return:     {:.2}%", s.total_return * 100.0);
    println!("Annualized:       {:.2}%", s.annualized_return * 100.0);
    println!("Max Drawdown:     -{:.1}%", s.max_drawdown * 100.0);
    println!("Sharpe Ratio:     {:.2}", s.sharpe_ratio);
    println!("Total Fees:       {:.2}", s.total_fees);
    println!(
        "Blocked Signals:  {} buys, {} sells",
        s.blocked_buys, s.blocked_sells
    );

    if !result.trades.is_empty() {
        println!();
        println!(
            "{:<12} {:>9} {:<12} {:>9} {:>8} {:>8} {:>5}",
            "entry", "price", "exit", "price", "gross%", "net%", "days"
        );
        for t in &result.trades {
            println!(
                "{:<12} {:>9.2} {:<12} {:>9.2} {:>8.2} {:>8.2} {:>5}",
                t.entry_date.to_string(),
                t.entry_price,
                t.exit_date.to_string(),
                t.exit_price,
                t.gross_return_pct * 100.0,
                t.net_return_pct * 100.0,
                t.holding_days
            );
        }
    }

    if let Some(open) = &result.open_position {
        println!();
        println!(
            "Open position: {} shares since {} @ {:.2}, marked {:.2} on {} ({:+.2}% net)",
            open.shares,
            open.entry_date,
            open.entry_price,
            open.mark_price,
            open.mark_date,
            open.net_return_pct * 100.0
        );
    }
}

fn print_batch(report: &BatchReport) {
    println!(
        "{:<10} {:>7} {:>8} {:>10} {:>10} {:>8}",
        "symbol", "trades", "win%", "agg net%", "return%", "maxdd%"
    );
    for r in &report.results {
        let s = &r.summary;
        println!(
            "{:<10} {:>7} {:>8.1} {:>10.2} {:>10.2} {:>8.1}",
            r.code,
            s.trade_count,
            s.win_rate * 100.0,
            s.aggregate_net_return * 100.0,
            s.total_return * 100.0,
            s.max_drawdown * 100.0
        );
    }
    for f in &report.failures {
        println!("{:<10} failed: {}", f.code, f.reason);
    }
    println!();
    println!(
        "{} symbols, {} trades, mean return {:.2}%, {:.1}% profitable, {} failed",
        report.symbol_count(),
        report.total_trades(),
        report.mean_total_return() * 100.0,
        report.profitable_fraction() * 100.0,
        report.failures.len()
    );
}
