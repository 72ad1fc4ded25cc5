//! Aligned closing-price table and load diagnostics.
//!
//! A `PriceTable` only contains dates on which every ticker has a price.
//! Columns are stored per ticker, tickers in sorted order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One adjusted close from a price source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        PricePoint { date, close }
    }

    fn is_usable(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PriceTable {
    /// Builds a table from per-ticker series, keeping only dates every ticker
    /// has a usable close for.
    pub fn align(series: &[(String, Vec<PricePoint>)]) -> Self {
        if series.is_empty() {
            return PriceTable::default();
        }

        let mut by_ticker: BTreeMap<&str, HashMap<NaiveDate, f64>> = BTreeMap::new();
        for (ticker, points) in series {
            let entry = by_ticker.entry(ticker.as_str()).or_default();
            for p in points.iter().filter(|p| p.is_usable()) {
                entry.insert(p.date, p.close);
            }
        }

        let all_dates: BTreeSet<NaiveDate> = by_ticker
            .values()
            .flat_map(|m| m.keys().copied())
            .collect();

        let dates: Vec<NaiveDate> = all_dates
            .into_iter()
            .filter(|d| by_ticker.values().all(|m| m.contains_key(d)))
            .collect();

        let tickers: Vec<String> = by_ticker.keys().map(|t| t.to_string()).collect();
        let columns = by_ticker
            .values()
            .map(|m| dates.iter().map(|d| m[d]).collect())
            .collect();

        PriceTable {
            dates,
            tickers,
            columns,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.ticker_index(ticker).is_some()
    }

    pub fn ticker_index(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.ticker_index(ticker).map(|i| self.columns[i].as_slice())
    }

    pub fn price(&self, row: usize, col: usize) -> f64 {
        self.columns[col][row]
    }

    /// Row index of the trading date closest to `date`. On equal distance the
    /// earlier date wins.
    pub fn nearest_index(&self, date: NaiveDate) -> Option<usize> {
        nearest_date_index(&self.dates, date)
    }

    /// Simple returns of one column at the given rows; the first entry is 0.
    pub fn returns_at(&self, col: usize, rows: &[usize]) -> Vec<f64> {
        let column = &self.columns[col];
        let mut out = Vec::with_capacity(rows.len());
        for (i, &row) in rows.iter().enumerate() {
            if i == 0 {
                out.push(0.0);
            } else {
                out.push(column[row] / column[rows[i - 1]] - 1.0);
            }
        }
        out
    }
}

pub fn nearest_date_index(dates: &[NaiveDate], date: NaiveDate) -> Option<usize> {
    if dates.is_empty() {
        return None;
    }
    match dates.binary_search(&date) {
        Ok(i) => Some(i),
        Err(0) => Some(0),
        Err(pos) if pos >= dates.len() => Some(dates.len() - 1),
        Err(pos) => {
            let before = (date - dates[pos - 1]).num_days();
            let after = (dates[pos] - date).num_days();
            if after < before {
                Some(pos)
            } else {
                Some(pos - 1)
            }
        }
    }
}

/// What happened while loading prices for the requested tickers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadDiagnostics {
    pub requested_start: Option<NaiveDate>,
    /// Tickers that produced no usable data.
    pub failed_tickers: Vec<String>,
    /// Tickers whose late first date pushed the aligned start forward.
    pub late_start_tickers: Vec<String>,
    /// First date present in any fetched series.
    pub first_available: Option<NaiveDate>,
    /// First date of the aligned table.
    pub aligned_start: Option<NaiveDate>,
}

/// Aligns raw per-ticker series and works out which tickers failed and which
/// ones delayed the common start date.
pub fn align_series(
    requested: &[String],
    raw: Vec<(String, Vec<PricePoint>)>,
    requested_start: Option<NaiveDate>,
) -> (PriceTable, LoadDiagnostics) {
    let mut successful: Vec<(String, Vec<PricePoint>)> = Vec::new();
    let mut start_dates: Vec<(String, NaiveDate)> = Vec::new();

    for (ticker, points) in raw {
        let first = points.iter().filter(|p| p.is_usable()).map(|p| p.date).min();
        if let Some(first) = first {
            start_dates.push((ticker.clone(), first));
            successful.push((ticker, points));
        }
    }

    let failed_tickers: Vec<String> = requested
        .iter()
        .filter(|t| !successful.iter().any(|(s, _)| s == *t))
        .cloned()
        .collect();

    let first_available = start_dates.iter().map(|(_, d)| *d).min();
    let latest_start = start_dates.iter().map(|(_, d)| *d).max();

    let late_start_tickers = match (first_available, latest_start) {
        (Some(first), Some(latest)) if latest > first => {
            let mut culprits: Vec<String> = start_dates
                .iter()
                .filter(|(_, d)| *d == latest)
                .map(|(t, _)| t.clone())
                .collect();
            culprits.sort();
            culprits
        }
        _ => Vec::new(),
    };

    let table = PriceTable::align(&successful);
    let aligned_start = table.dates().first().copied();

    (
        table,
        LoadDiagnostics {
            requested_start,
            failed_tickers,
            late_start_tickers,
            first_available,
            aligned_start,
        },
    )
}
