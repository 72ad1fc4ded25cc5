//! CLI definition and dispatch.

use chrono::{Local, Months, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_store::JsonResultStore;
use crate::domain::allocation::PortfolioParams;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    parse_asset_list, parse_choice, parse_date, parse_periods, validate_backtest_config,
    validate_strategy_config,
};
use crate::domain::error::QuantestError;
use crate::domain::momentum::MomentumParams;
use crate::domain::universe::AssetClasses;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PriceDataPort;
use crate::ports::result_store_port::ResultStorePort;

const DEFAULT_RESULTS_DIR: &str = "./backtest_results";

#[derive(Parser, Debug)]
#[command(name = "quantest", about = "Tactical asset allocation backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and save the result
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Name the result is saved under
        #[arg(short, long)]
        name: Option<String>,
        /// Results directory, overriding [results] directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored data range of every configured ticker
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, conflicts_with = "all")]
        ticker: Option<String>,
        /// Every ticker the price source holds, not just the configured ones
        #[arg(long)]
        all: bool,
    },
    /// List saved results, newest first
    ListResults {
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Compare saved results side by side
    Compare {
        #[arg(short, long)]
        dir: Option<PathBuf>,
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            name,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, name.as_deref(), output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            config,
            ticker,
            all,
        } => run_info(&config, ticker.as_deref(), all),
        Command::ListResults { dir } => run_list_results(&results_dir(dir.as_deref(), None)),
        Command::Compare { dir, ids } => run_compare(&results_dir(dir.as_deref(), None), &ids),
    }
}

fn fail(err: &QuantestError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Validates every section and builds the typed configuration.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, QuantestError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;

    let defaults = PortfolioParams::default();

    Ok(BacktestConfig {
        start_date: parse_date(config, "start_date")?,
        end_date: parse_date(config, "end_date")?,
        initial_capital: config.get_double("backtest", "initial_capital", 0.0),
        monthly_contribution: config.get_double("backtest", "monthly_contribution", 0.0),
        benchmark: config
            .get_trimmed("backtest", "benchmark")
            .map(|b| b.to_uppercase())
            .unwrap_or_default(),
        granularity: parse_choice(config, "backtest", "granularity", "daily")?,
        rebalance_frequency: parse_choice(config, "backtest", "rebalance_frequency", "monthly")?,
        rebalance_day: parse_choice(config, "backtest", "rebalance_day", "last")?,
        transaction_cost: config.get_double("backtest", "transaction_cost", 0.0),
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.0),
        assets: AssetClasses {
            aggressive: parse_asset_list(config, "aggressive")?,
            defensive: parse_asset_list(config, "defensive")?,
            canary: parse_asset_list(config, "canary")?,
        },
        momentum: MomentumParams {
            mode: parse_choice(config, "momentum", "mode", "13612u")?,
            periods: parse_periods(config)?,
        },
        portfolio: PortfolioParams {
            use_canary: config.get_bool("portfolio", "use_canary", defaults.use_canary),
            use_hybrid_protection: config.get_bool(
                "portfolio",
                "use_hybrid_protection",
                defaults.use_hybrid_protection,
            ),
            top_n_aggressive: config.get_int("portfolio", "top_n_aggressive", 1).max(1) as usize,
            top_n_defensive: config.get_int("portfolio", "top_n_defensive", 1).max(1) as usize,
            weighting: parse_choice(config, "portfolio", "weighting", "equal")?,
        },
    })
}

/// Opens the price source named by `[data] source`.
pub fn open_price_port(config: &dyn ConfigPort) -> Result<Box<dyn PriceDataPort>, QuantestError> {
    let source = config
        .get_trimmed("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .to_lowercase();

    match source.as_str() {
        "csv" => {
            let path = config
                .get_trimmed("data", "path")
                .ok_or_else(|| QuantestError::ConfigMissing {
                    section: "data".into(),
                    key: "path".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Box::new(SqliteAdapter::from_config(config)?))
        }
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => Err(QuantestError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "sqlite feature is not enabled".into(),
        }),
        other => Err(QuantestError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unknown source '{other}', expected csv or sqlite"),
        }),
    }
}

/// `--dir`/`--output` wins, then `[results] directory`, then the default.
pub fn results_dir(flag: Option<&Path>, config: Option<&dyn ConfigPort>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| {
            config
                .and_then(|c| c.get_trimmed("results", "directory"))
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR))
}

pub fn run_backtest(config_path: &Path, name: Option<&str>, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let data_port = match open_price_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Running backtest: {} tickers, {} to {}",
        bt_config.tickers().len(),
        bt_config.start_date,
        bt_config.end_date,
    );

    let result = match backtest_engine::run(data_port.as_ref(), &bt_config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!("{}", format_summary(&result));

    let store = JsonResultStore::new(results_dir(output, Some(&adapter)));
    let name = name.map(str::to_string).unwrap_or_else(|| default_name(&bt_config));
    match store.save(&result, &name, Local::now().naive_local()) {
        Ok(id) => {
            eprintln!("\nResult saved as: {id}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn default_name(config: &BacktestConfig) -> String {
    format!("{}_{}", config.momentum.mode, config.rebalance_frequency)
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    eprintln!("Config validated successfully");
    eprintln!("\n{}", format_config(&bt_config));

    if let Err(e) = open_price_port(&adapter) {
        return fail(&e);
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match build_backtest_config(&adapter) {
        Ok(c) => {
            eprintln!("\n{}", format_config(&c));
            eprintln!("\nConfiguration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// The tickers `info` reports on: the one named, everything the source
/// holds, or the configured universe.
pub fn info_tickers(
    config: &dyn ConfigPort,
    data_port: &dyn PriceDataPort,
    ticker: Option<&str>,
    all: bool,
) -> Result<Vec<String>, QuantestError> {
    match ticker {
        Some(t) => Ok(vec![t.trim().to_uppercase()]),
        None if all => data_port.list_tickers(),
        None => Ok(build_backtest_config(config)?.tickers()),
    }
}

fn run_info(config_path: &Path, ticker: Option<&str>, all: bool) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_port = match open_price_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    let tickers = match info_tickers(&adapter, data_port.as_ref(), ticker, all) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };
    if tickers.is_empty() {
        eprintln!("No tickers found");
    }

    for t in &tickers {
        match data_port.get_data_range(t) {
            Ok(Some((first, last, count))) => {
                println!("{t}: {count} rows, {first} to {last}");
            }
            Ok(None) => eprintln!("{t}: no data found"),
            Err(e) => eprintln!("error querying {t}: {e}"),
        }
    }
    ExitCode::SUCCESS
}

fn run_list_results(dir: &Path) -> ExitCode {
    let store = JsonResultStore::new(dir.to_path_buf());
    let saved = match store.list() {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    if saved.is_empty() {
        eprintln!("No saved results in {}", dir.display());
    } else {
        for s in &saved {
            println!("{}\t{}", s.id, s.display_name());
        }
        eprintln!("{} results found", saved.len());
    }
    ExitCode::SUCCESS
}

fn run_compare(dir: &Path, ids: &[String]) -> ExitCode {
    let store = JsonResultStore::new(dir.to_path_buf());
    let mut loaded = Vec::with_capacity(ids.len());
    for id in ids {
        match store.load(id) {
            Ok(r) => loaded.push((id.as_str(), r)),
            Err(e) => return fail(&e),
        }
    }
    info!(results = loaded.len(), "comparing results");

    println!("{}", format_comparison(&loaded));
    ExitCode::SUCCESS
}

pub fn format_config(config: &BacktestConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Period:      {} to {}\n",
        config.start_date, config.end_date
    ));
    out.push_str(&format!(
        "Capital:     {:.0} initial, {:.0} per rebalance\n",
        config.initial_capital, config.monthly_contribution
    ));
    out.push_str(&format!(
        "Rebalance:   {} on {} trading day, {} returns\n",
        config.rebalance_frequency, config.rebalance_day, config.granularity
    ));
    out.push_str(&format!("Benchmark:   {}\n", config.benchmark));
    out.push_str(&format!("Aggressive:  {}\n", config.assets.aggressive.join(", ")));
    out.push_str(&format!("Defensive:   {}\n", config.assets.defensive.join(", ")));
    out.push_str(&format!("Canary:      {}\n", config.assets.canary.join(", ")));
    out.push_str(&format!(
        "Momentum:    {} {:?}\n",
        config.momentum.mode,
        config.momentum.mode.lookbacks(&config.momentum.periods)
    ));
    out.push_str(&format!(
        "Portfolio:   top {} aggressive, top {} defensive, canary {}, hybrid {}",
        config.portfolio.top_n_aggressive,
        config.portfolio.top_n_defensive,
        on_off(config.portfolio.use_canary),
        on_off(config.portfolio.use_hybrid_protection),
    ));
    out
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Console summary of one run.
pub fn format_summary(result: &BacktestResult) -> String {
    let cur = &result.currency_symbol;
    let m = &result.metrics;
    let b = &result.benchmark_metrics;
    let mut out = String::new();

    if !result.diagnostics.failed_tickers.is_empty() {
        out.push_str(&format!(
            "warning: no data for {}\n",
            result.diagnostics.failed_tickers.join(", ")
        ));
    }
    if !result.diagnostics.late_start_tickers.is_empty() {
        out.push_str(&format!(
            "warning: start delayed to {} by {}\n",
            result
                .diagnostics
                .aligned_start
                .map(|d| d.to_string())
                .unwrap_or_default(),
            result.diagnostics.late_start_tickers.join(", ")
        ));
    }

    out.push_str("\n=== Results ===\n");
    if let (Some(first), Some(last)) = (result.first_date(), result.last_date()) {
        out.push_str(&format!("Period:           {first} to {last}\n"));
    }
    out.push_str(&format!("Rebalances:       {}\n", result.calendar.len()));
    out.push_str(&format!(
        "                  {:>12} {:>12}\n",
        "Strategy", result.config.benchmark
    ));
    out.push_str(&format!(
        "CAGR:             {:>11.2}% {:>11.2}%\n",
        m.cagr * 100.0,
        b.cagr * 100.0
    ));
    out.push_str(&format!(
        "Max Drawdown:     {:>11.2}% {:>11.2}%\n",
        m.mdd * 100.0,
        b.mdd * 100.0
    ));
    out.push_str(&format!(
        "Volatility:       {:>11.2}% {:>11.2}%\n",
        m.volatility * 100.0,
        b.volatility * 100.0
    ));
    out.push_str(&format!(
        "Sharpe Ratio:     {:>12.2} {:>12.2}\n",
        m.sharpe_ratio, b.sharpe_ratio
    ));
    out.push_str(&format!(
        "Win Rate:         {:>11.1}% {:>11.1}%\n",
        m.win_rate * 100.0,
        b.win_rate * 100.0
    ));
    out.push_str(&format!(
        "Final Value:      {:>12} {:>12}\n",
        money(cur, m.final_value),
        money(cur, b.final_value)
    ));
    out.push_str(&format!(
        "Contributed:      {:>12}\n",
        money(cur, m.total_contributed)
    ));
    out.push_str(&format!(
        "Profit:           {:>12} {:>12}",
        money(cur, m.total_profit),
        money(cur, b.total_profit)
    ));

    if let (Some(start), Some(end)) = (m.mdd_start, m.mdd_end) {
        out.push_str(&format!("\nWorst drawdown:   {start} to {end}"));
    }

    let recent = recent_holdings(result);
    if !recent.is_empty() {
        out.push_str("\n\nHoldings (last 12 months):");
        for line in &recent {
            out.push_str(&format!("\n  {line}"));
        }
    }

    out
}

/// One line per rebalance within twelve months of the latest one, labelled
/// with the month the target is held into. Empty rows are all cash.
pub fn recent_holdings(result: &BacktestResult) -> Vec<String> {
    let weights = &result.target_weights;
    let Some(&latest) = weights.dates.last() else {
        return Vec::new();
    };
    let cutoff = latest
        .checked_sub_months(Months::new(12))
        .unwrap_or(NaiveDate::MIN);

    weights
        .dates
        .iter()
        .enumerate()
        .filter(|(_, date)| **date > cutoff)
        .map(|(row, date)| {
            let month = date.checked_add_months(Months::new(1)).unwrap_or(*date);
            let held: Vec<String> = weights
                .holdings(row)
                .iter()
                .map(|(t, w)| format!("{t} ({:.0}%)", w * 100.0))
                .collect();
            let held = if held.is_empty() {
                "cash (100%)".to_string()
            } else {
                held.join(", ")
            };
            format!("{}: {held}", month.format("%Y-%m"))
        })
        .collect()
}

fn money(symbol: &str, value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{symbol}{:.0}", value.abs())
}

/// One row per result: period, strategy metrics and the benchmark's CAGR.
pub fn format_comparison(results: &[(&str, BacktestResult)]) -> String {
    let mut out = format!(
        "{:<32} {:>10} {:>10} {:>10} {:>8} {:>14} {:>10}",
        "Result", "CAGR", "MDD", "Vol", "Sharpe", "Final", "Bench CAGR"
    );
    for (id, r) in results {
        let m = &r.metrics;
        out.push_str(&format!(
            "\n{:<32} {:>9.2}% {:>9.2}% {:>9.2}% {:>8.2} {:>14} {:>9.2}%",
            id,
            m.cagr * 100.0,
            m.mdd * 100.0,
            m.volatility * 100.0,
            m.sharpe_ratio,
            money(&r.currency_symbol, m.final_value),
            r.benchmark_metrics.cagr * 100.0,
        ));
    }
    out
}
