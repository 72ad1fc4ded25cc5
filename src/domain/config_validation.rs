//! Configuration validation.
//!
//! Validates every INI section a backtest reads before any price data is
//! loaded, so that mistakes are reported with their section and key.

use crate::domain::allocation::WeightingScheme;
use crate::domain::calendar::{RebalanceDay, RebalanceFrequency};
use crate::domain::error::QuantestError;
use crate::domain::momentum::MomentumMode;
use crate::domain::simulation::Granularity;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    validate_initial_capital(config)?;
    validate_contribution(config)?;
    validate_rate(config, "transaction_cost")?;
    validate_rate(config, "risk_free_rate")?;
    validate_dates(config)?;
    validate_benchmark(config)?;
    parse_choice::<Granularity>(config, "backtest", "granularity", "daily")?;
    parse_choice::<RebalanceFrequency>(config, "backtest", "rebalance_frequency", "monthly")?;
    parse_choice::<RebalanceDay>(config, "backtest", "rebalance_day", "last")?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    validate_assets(config)?;
    validate_momentum(config)?;
    validate_portfolio(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> QuantestError {
    QuantestError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    let value = config.get_double("backtest", "initial_capital", 0.0);
    if value <= 0.0 {
        return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
    }
    Ok(())
}

fn validate_contribution(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    let value = config.get_double("backtest", "monthly_contribution", 0.0);
    if value < 0.0 {
        return Err(invalid(
            "backtest",
            "monthly_contribution",
            "monthly_contribution must be non-negative",
        ));
    }
    Ok(())
}

fn validate_rate(config: &dyn ConfigPort, key: &str) -> Result<(), QuantestError> {
    let value = config.get_double("backtest", key, 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid("backtest", key, format!("{key} must be between 0 and 1")));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    if start_date >= end_date {
        return Err(invalid("backtest", "start_date", "start_date must be before end_date"));
    }
    Ok(())
}

/// Reads a `YYYY-MM-DD` date from the `[backtest]` section.
pub fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, QuantestError> {
    match config.get_trimmed("backtest", key) {
        None => Err(QuantestError::ConfigMissing {
            section: "backtest".to_string(),
            key: key.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
            invalid("backtest", key, format!("invalid {key} format, expected YYYY-MM-DD"))
        }),
    }
}

fn validate_benchmark(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    match config.get_trimmed("backtest", "benchmark") {
        Some(_) => Ok(()),
        None => Err(QuantestError::ConfigMissing {
            section: "backtest".to_string(),
            key: "benchmark".to_string(),
        }),
    }
}

/// Parses an enumerated option, falling back to `default` when absent.
pub fn parse_choice<T: FromStr<Err = String>>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &str,
) -> Result<T, QuantestError> {
    let raw = config
        .get_trimmed(section, key)
        .unwrap_or_else(|| default.to_string());
    raw.parse::<T>().map_err(|reason| invalid(section, key, reason))
}

/// Reads a ticker list from `[assets]`. A missing key is an empty list.
pub fn parse_asset_list(config: &dyn ConfigPort, key: &str) -> Result<Vec<String>, QuantestError> {
    let raw = config.get_string("assets", key).unwrap_or_default();
    parse_tickers(&raw).map_err(|e| invalid("assets", key, e.to_string()))
}

fn validate_assets(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    let aggressive = parse_asset_list(config, "aggressive")?;
    let defensive = parse_asset_list(config, "defensive")?;
    parse_asset_list(config, "canary")?;

    if aggressive.is_empty() && defensive.is_empty() {
        return Err(QuantestError::ConfigMissing {
            section: "assets".to_string(),
            key: "aggressive".to_string(),
        });
    }
    Ok(())
}

/// Parses a comma separated list of lookback months.
pub fn parse_periods(config: &dyn ConfigPort) -> Result<Vec<u32>, QuantestError> {
    let Some(raw) = config.get_trimmed("momentum", "periods") else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(|token| {
            let token = token.trim();
            match token.parse::<u32>() {
                Ok(m) if m > 0 => Ok(m),
                _ => Err(invalid(
                    "momentum",
                    "periods",
                    format!("'{token}' is not a positive number of months"),
                )),
            }
        })
        .collect()
}

fn validate_momentum(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    let mode = parse_choice::<MomentumMode>(config, "momentum", "mode", "13612u")?;
    let periods = parse_periods(config)?;

    if mode == MomentumMode::Relative && periods.is_empty() {
        return Err(invalid(
            "momentum",
            "periods",
            "relative momentum requires at least one lookback period",
        ));
    }
    Ok(())
}

fn validate_portfolio(config: &dyn ConfigPort) -> Result<(), QuantestError> {
    for key in ["top_n_aggressive", "top_n_defensive"] {
        if config.get_int("portfolio", key, 1) < 1 {
            return Err(invalid("portfolio", key, format!("{key} must be at least 1")));
        }
    }
    parse_choice::<WeightingScheme>(config, "portfolio", "weighting", "equal")?;
    Ok(())
}
