//! CLI integration tests for config building and the backtest command.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config) with defaults and errors
//! - Price source selection (open_price_port) and the tickers `info` reports
//! - Dry-run mode with real INI files on disk
//! - Full backtest over CSV files, saved to and reloaded from the JSON store
//! - Console summary, trailing holdings and comparison formatting

mod common;

use common::*;
use quantest::adapters::csv_adapter::CsvAdapter;
use quantest::adapters::file_config_adapter::FileConfigAdapter;
use quantest::adapters::json_store::JsonResultStore;
use quantest::cli;
use quantest::domain::calendar::{RebalanceDay, RebalanceFrequency};
use quantest::domain::error::QuantestError;
use quantest::domain::momentum::MomentumMode;
use quantest::domain::price_table::PricePoint;
use quantest::domain::simulation::Granularity;
use quantest::ports::result_store_port::ResultStorePort;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

const VALID_INI: &str = r#"
[backtest]
start_date = 2010-01-01
end_date = 2024-12-31
initial_capital = 10000
monthly_contribution = 1000
benchmark = spy
granularity = period
rebalance_frequency = quarterly
rebalance_day = first
transaction_cost = 0.001
risk_free_rate = 0.02

[assets]
aggressive = SPY,EFA,EEM,AGG
defensive = LQD,IEF,SHY
canary = EEM,AGG

[momentum]
mode = average
periods = 1,3,6

[portfolio]
use_canary = true
use_hybrid_protection = false
top_n_aggressive = 2
top_n_defensive = 1
weighting = equal

[data]
source = csv
path = ./prices
"#;

mod config_building {
    use super::*;

    #[test]
    fn build_backtest_config_valid_full() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.start_date, date(2010, 1, 1));
        assert_eq!(config.end_date, date(2024, 12, 31));
        assert!((config.initial_capital - 10_000.0).abs() < f64::EPSILON);
        assert!((config.monthly_contribution - 1_000.0).abs() < f64::EPSILON);
        assert_eq!(config.benchmark, "SPY");
        assert_eq!(config.granularity, Granularity::Period);
        assert_eq!(config.rebalance_frequency, RebalanceFrequency::Quarterly);
        assert_eq!(config.rebalance_day, RebalanceDay::First);
        assert!((config.transaction_cost - 0.001).abs() < f64::EPSILON);
        assert!((config.risk_free_rate - 0.02).abs() < f64::EPSILON);
        assert_eq!(config.assets.aggressive, vec!["SPY", "EFA", "EEM", "AGG"]);
        assert_eq!(config.assets.defensive, vec!["LQD", "IEF", "SHY"]);
        assert_eq!(config.assets.canary, vec!["EEM", "AGG"]);
        assert_eq!(config.momentum.mode, MomentumMode::Average);
        assert_eq!(config.momentum.periods, vec![1, 3, 6]);
        assert!(config.portfolio.use_canary);
        assert!(!config.portfolio.use_hybrid_protection);
        assert_eq!(config.portfolio.top_n_aggressive, 2);
        assert_eq!(config.portfolio.top_n_defensive, 1);
    }

    #[test]
    fn build_backtest_config_uses_defaults() {
        let ini = r#"
[backtest]
start_date = 2020-01-01
end_date = 2024-12-31
initial_capital = 5000
benchmark = SPY

[assets]
aggressive = SPY,EFA
"#;
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.granularity, Granularity::Daily);
        assert_eq!(config.rebalance_frequency, RebalanceFrequency::Monthly);
        assert_eq!(config.rebalance_day, RebalanceDay::Last);
        assert_eq!(config.monthly_contribution, 0.0);
        assert_eq!(config.transaction_cost, 0.0);
        assert_eq!(config.momentum.mode, MomentumMode::Fixed13612U);
        assert!(config.momentum.periods.is_empty());
        assert!(config.assets.defensive.is_empty());
        assert!(config.portfolio.use_canary);
        assert!(config.portfolio.use_hybrid_protection);
        assert_eq!(config.portfolio.top_n_aggressive, 1);
    }

    #[test]
    fn inline_comments_are_stripped() {
        let ini = r#"
[backtest]
start_date = 2020-01-01
end_date = 2024-12-31
initial_capital = 5000      ; starting cash
benchmark = SPY
granularity = daily          ; daily | period
rebalance_frequency = quarterly   # monthly | quarterly

[assets]
aggressive = SPY,EFA   ; risk-on
"#;
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert_eq!(config.granularity, Granularity::Daily);
        assert_eq!(config.rebalance_frequency, RebalanceFrequency::Quarterly);
        assert_eq!(config.initial_capital, 5000.0);
        assert_eq!(config.assets.aggressive, vec!["SPY", "EFA"]);
    }

    #[test]
    fn missing_start_date() {
        let ini = "[backtest]\ninitial_capital = 1\nend_date = 2024-12-31\nbenchmark = SPY\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, QuantestError::ConfigMissing { key, .. } if key == "start_date"));
    }

    #[test]
    fn missing_assets() {
        let ini = "[backtest]\ninitial_capital = 1\nstart_date = 2020-01-01\nend_date = 2024-12-31\nbenchmark = SPY\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, QuantestError::ConfigMissing { section, .. } if section == "assets"));
    }

    #[test]
    fn relative_momentum_needs_periods() {
        let ini = VALID_INI.replace("mode = average\nperiods = 1,3,6\n", "mode = relative\n");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, QuantestError::ConfigInvalid { key, .. } if key == "periods"));
    }

    #[test]
    fn unknown_rebalance_frequency() {
        let ini = VALID_INI.replace("rebalance_frequency = quarterly", "rebalance_frequency = weekly");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(
            matches!(err, QuantestError::ConfigInvalid { key, .. } if key == "rebalance_frequency")
        );
    }
}

mod price_source {
    use super::*;

    #[test]
    fn csv_is_the_default_source() {
        let adapter = FileConfigAdapter::from_string("[data]\npath = ./prices\n").unwrap();
        assert!(cli::open_price_port(&adapter).is_ok());
    }

    #[test]
    fn info_all_lists_every_held_ticker() {
        let dir = tempfile::TempDir::new().unwrap();
        for ticker in ["QQQ", "SPY", "TLT"] {
            fs::write(
                dir.path().join(format!("{ticker}.csv")),
                "date,close\n2024-01-02,100\n",
            )
            .unwrap();
        }
        let ini = VALID_INI.replace("path = ./prices", &format!("path = {}", dir.path().display()));
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let port = cli::open_price_port(&adapter).unwrap();

        let all = cli::info_tickers(&adapter, port.as_ref(), None, true).unwrap();
        assert_eq!(all, vec!["QQQ", "SPY", "TLT"]);

        let configured = cli::info_tickers(&adapter, port.as_ref(), None, false).unwrap();
        assert!(configured.contains(&"LQD".to_string()));
        assert!(!configured.contains(&"QQQ".to_string()));

        let one = cli::info_tickers(&adapter, port.as_ref(), Some(" tlt "), false).unwrap();
        assert_eq!(one, vec!["TLT"]);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_source_opens_database_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("prices.db");
        let ini = format!("[data]\nsource = sqlite\npath = {}\n", db.display());
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        assert!(cli::open_price_port(&adapter).is_ok());
    }
}

mod dry_run {
    use super::*;

    #[test]
    fn dry_run_valid_config_succeeds() {
        let file = write_temp_ini(VALID_INI);
        assert!(is_success(cli::run_dry_run(file.path())));
    }

    #[test]
    fn dry_run_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/path/config.ini");
        assert!(!is_success(cli::run_dry_run(&path)));
    }

    #[test]
    fn dry_run_invalid_config_fails() {
        let ini = VALID_INI.replace("initial_capital = 10000", "initial_capital = -5");
        let file = write_temp_ini(&ini);
        assert!(!is_success(cli::run_dry_run(file.path())));
    }
}

mod csv_pipeline {
    use super::*;

    fn write_csv(dir: &Path, ticker: &str, points: &[PricePoint]) {
        let mut content = String::from("date,close\n");
        for p in points {
            content.push_str(&format!("{},{}\n", p.date.format("%Y-%m-%d"), p.close));
        }
        fs::write(dir.join(format!("{ticker}.csv")), content).unwrap();
    }

    fn seed_prices(dir: &Path) {
        let mock = sample_port();
        for (ticker, points) in &mock.data {
            write_csv(dir, ticker, points);
        }
    }

    fn pipeline_ini(prices: &Path, results: &Path) -> String {
        format!(
            r#"
[backtest]
start_date = 2022-01-03
end_date = 2023-12-29
initial_capital = 10000
monthly_contribution = 250
benchmark = SPY
transaction_cost = 0.001

[assets]
aggressive = SPY,EFA
defensive = IEF,SHY
canary = EEM

[data]
source = csv
path = {}

[results]
directory = {}
"#,
            prices.display(),
            results.display()
        )
    }

    #[test]
    fn backtest_saves_a_reloadable_result() {
        let dir = tempfile::TempDir::new().unwrap();
        let prices = dir.path().join("prices");
        let results = dir.path().join("results");
        fs::create_dir_all(&prices).unwrap();
        seed_prices(&prices);

        let ini = write_temp_ini(&pipeline_ini(&prices, &results));
        assert!(is_success(cli::run_backtest(ini.path(), Some("baseline"), None)));

        let store = JsonResultStore::new(results.clone());
        let saved = store.list().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "baseline");

        let loaded = store.load(&saved[0].id).unwrap();
        let adapter = FileConfigAdapter::from_file(ini.path()).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        let fresh = quantest::domain::backtest::run(&CsvAdapter::new(prices), &config).unwrap();

        assert_eq!(loaded, fresh);
        assert_eq!(loaded.contributions_made, 24);
    }

    #[test]
    fn output_flag_overrides_results_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let prices = dir.path().join("prices");
        let configured = dir.path().join("configured");
        let flagged = dir.path().join("flagged");
        fs::create_dir_all(&prices).unwrap();
        seed_prices(&prices);

        let ini = write_temp_ini(&pipeline_ini(&prices, &configured));
        assert!(is_success(cli::run_backtest(ini.path(), None, Some(&flagged))));

        assert!(!configured.exists());
        assert_eq!(JsonResultStore::new(flagged).list().unwrap().len(), 1);
    }

    #[test]
    fn missing_price_directory_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let ini = write_temp_ini(&pipeline_ini(
            &dir.path().join("nowhere"),
            &dir.path().join("results"),
        ));
        assert!(!is_success(cli::run_backtest(ini.path(), None, None)));
        assert!(!dir.path().join("results").exists());
    }
}

mod formatting {
    use super::*;

    #[test]
    fn summary_lists_metrics_and_recent_holdings() {
        let result = quantest::domain::backtest::run(&sample_port(), &sample_config()).unwrap();
        let summary = cli::format_summary(&result);

        assert!(summary.contains("=== Results ==="));
        assert!(summary.contains("CAGR:"));
        assert!(summary.contains("Sharpe Ratio:"));
        assert!(summary.contains("Holdings (last 12 months):"));
        assert!(summary.contains("  2024-01: SPY (100%)"));
        assert!(!summary.contains("warning"));
    }

    #[test]
    fn recent_holdings_cover_the_trailing_year() {
        let result = quantest::domain::backtest::run(&sample_port(), &sample_config()).unwrap();
        let lines = cli::recent_holdings(&result);

        // rebalances from 2022-12-30 to 2023-12-29, each labelled a month on
        assert_eq!(lines.len(), 13);
        assert!(lines[0].starts_with("2023-01: "));
        assert_eq!(lines[12], "2024-01: SPY (100%)");
    }

    #[test]
    fn empty_target_is_shown_as_cash() {
        let days = trading_days(date(2022, 1, 3), date(2023, 12, 29));
        let port = MockPriceDataPort::new()
            .with_prices("SPY", compounding(&days, 400.0, -0.0005))
            .with_prices("EFA", compounding(&days, 70.0, -0.0004));
        let mut config = sample_config();
        config.assets.aggressive = vec!["SPY".into(), "EFA".into()];
        config.assets.defensive = vec![];
        config.assets.canary = vec![];
        config.portfolio.top_n_aggressive = 2;

        let result = quantest::domain::backtest::run(&port, &config).unwrap();
        let lines = cli::recent_holdings(&result);
        assert_eq!(lines.last().map(String::as_str), Some("2024-01: cash (100%)"));
    }

    #[test]
    fn summary_warns_about_failed_tickers() {
        let port = sample_port().with_error("EFA", "boom");
        let result = quantest::domain::backtest::run(&port, &sample_config()).unwrap();
        assert!(cli::format_summary(&result).contains("warning: no data for EFA"));
    }

    #[test]
    fn comparison_has_one_row_per_result() {
        let a = quantest::domain::backtest::run(&sample_port(), &sample_config()).unwrap();
        let mut config = sample_config();
        config.portfolio.use_canary = false;
        let b = quantest::domain::backtest::run(&sample_port(), &config).unwrap();

        let table = cli::format_comparison(&[("with_canary", a), ("without_canary", b)]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("with_canary"));
        assert!(lines[2].starts_with("without_canary"));
    }
}
