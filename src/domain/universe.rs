//! Ticker lists, asset classes and price loading through the data port.

use crate::domain::error::QuantestError;
use crate::domain::price_table::{align_series, LoadDiagnostics, PriceTable};
use crate::ports::price_port::PriceDataPort;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parses a comma separated ticker list. Tickers are upper-cased.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Ticker membership of the three asset classes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetClasses {
    pub aggressive: Vec<String>,
    pub defensive: Vec<String>,
    pub canary: Vec<String>,
}

impl AssetClasses {
    /// Keeps only tickers present in the price table, preserving configured order.
    pub fn restrict_to(&self, table: &PriceTable) -> AssetClasses {
        let keep = |list: &[String]| -> Vec<String> {
            list.iter().filter(|t| table.contains(t)).cloned().collect()
        };
        AssetClasses {
            aggressive: keep(&self.aggressive),
            defensive: keep(&self.defensive),
            canary: keep(&self.canary),
        }
    }

    /// Tickers that can be held: aggressive then defensive, without repeats.
    pub fn holdable(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.aggressive
            .iter()
            .chain(self.defensive.iter())
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect()
    }
}

/// Sorted, de-duplicated list of every ticker a run needs.
pub fn all_tickers(classes: &AssetClasses, benchmark: &str) -> Vec<String> {
    let set: BTreeSet<String> = classes
        .aggressive
        .iter()
        .chain(classes.defensive.iter())
        .chain(classes.canary.iter())
        .cloned()
        .chain(std::iter::once(benchmark.to_string()))
        .filter(|t| !t.is_empty())
        .collect();
    set.into_iter().collect()
}

/// Korean listings are priced in won, everything else in dollars.
pub fn currency_symbol(tickers: &[String]) -> &'static str {
    if tickers.iter().any(|t| t.ends_with(".KS")) {
        "₩"
    } else {
        "$"
    }
}

/// Fetches every ticker from the port and aligns the results. A ticker whose
/// fetch fails is reported as failed rather than aborting the load; the load
/// only fails when no ticker produced data.
pub fn load_prices(
    port: &dyn PriceDataPort,
    tickers: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<(PriceTable, LoadDiagnostics), QuantestError> {
    let mut raw = Vec::with_capacity(tickers.len());

    for ticker in tickers {
        match port.fetch_closes(ticker, start_date, end_date) {
            Ok(points) => {
                if points.is_empty() {
                    warn!(ticker = %ticker, "no price data in range");
                } else {
                    info!(ticker = %ticker, rows = points.len(), "loaded prices");
                }
                raw.push((ticker.clone(), points));
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "skipping ticker");
                raw.push((ticker.clone(), Vec::new()));
            }
        }
    }

    let (table, diagnostics) = align_series(tickers, raw, Some(start_date));

    if table.tickers().is_empty() {
        return Err(QuantestError::DataUnavailable {
            tickers: tickers.to_vec(),
        });
    }
    if table.is_empty() {
        return Err(QuantestError::DataUnavailable {
            tickers: diagnostics.late_start_tickers.clone(),
        });
    }

    if !diagnostics.late_start_tickers.is_empty() {
        warn!(
            tickers = %diagnostics.late_start_tickers.join(","),
            start = ?diagnostics.aligned_start,
            "latest-starting tickers delay the backtest start"
        );
    }

    Ok((table, diagnostics))
}
