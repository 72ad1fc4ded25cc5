//! Momentum signal scoring.
//!
//! Average modes look back whole calendar months from each rebalance date and
//! match the nearest trading date. Relative mode uses a trading-day window of
//! 21 days per month on the first configured lookback only.

use crate::domain::calendar::RebalanceCalendar;
use crate::domain::error::QuantestError;
use crate::domain::price_table::PriceTable;
use crate::domain::series::TimeSeries;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const TRADING_DAYS_PER_MONTH: usize = 21;

/// Lookbacks of the canonical 13612U score.
pub const FIXED_LOOKBACKS: [u32; 4] = [1, 3, 6, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumMode {
    /// Mean of 1, 3, 6 and 12 month returns, whatever the configured periods.
    #[serde(rename = "13612u")]
    Fixed13612U,
    /// Mean of returns over the configured lookbacks.
    #[serde(rename = "average")]
    Average,
    /// Return over the first configured lookback, in trading days.
    #[serde(rename = "relative")]
    Relative,
}

impl MomentumMode {
    /// Lookback months actually used by this mode.
    pub fn lookbacks(self, configured: &[u32]) -> Vec<u32> {
        match self {
            MomentumMode::Fixed13612U => FIXED_LOOKBACKS.to_vec(),
            MomentumMode::Average | MomentumMode::Relative => configured.to_vec(),
        }
    }
}

impl FromStr for MomentumMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "13612u" => Ok(MomentumMode::Fixed13612U),
            "average" => Ok(MomentumMode::Average),
            "relative" => Ok(MomentumMode::Relative),
            other => Err(format!("expected 13612u, average or relative, got '{other}'")),
        }
    }
}

impl fmt::Display for MomentumMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomentumMode::Fixed13612U => write!(f, "13612u"),
            MomentumMode::Average => write!(f, "average"),
            MomentumMode::Relative => write!(f, "relative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumParams {
    pub mode: MomentumMode,
    pub periods: Vec<u32>,
}

impl Default for MomentumParams {
    fn default() -> Self {
        MomentumParams {
            mode: MomentumMode::Fixed13612U,
            periods: FIXED_LOOKBACKS.to_vec(),
        }
    }
}

/// Scores per date (rows) and ticker (columns, same order as the price table).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MomentumScoreTable {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    pub scores: Vec<Vec<f64>>,
}

impl MomentumScoreTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.scores[row]
    }

    pub fn score(&self, row: usize, ticker: &str) -> Option<f64> {
        let col = self.tickers.iter().position(|t| t == ticker)?;
        self.scores.get(row).map(|r| r[col])
    }

    /// Mean score of `tickers` on every date. Tickers not in the table are
    /// ignored; with none left the mean is 0.
    pub fn mean_series(&self, tickers: &[String]) -> TimeSeries {
        let cols: Vec<usize> = tickers
            .iter()
            .filter_map(|t| self.tickers.iter().position(|x| x == t))
            .collect();

        let values = self
            .scores
            .iter()
            .map(|row| {
                if cols.is_empty() {
                    0.0
                } else {
                    cols.iter().map(|&c| row[c]).sum::<f64>() / cols.len() as f64
                }
            })
            .collect();

        TimeSeries::new(self.dates.clone(), values)
    }
}

/// Scores every ticker of the table on every calendar date.
pub fn compute_momentum(
    table: &PriceTable,
    calendar: &RebalanceCalendar,
    params: &MomentumParams,
) -> Result<MomentumScoreTable, QuantestError> {
    let lookbacks = params.mode.lookbacks(&params.periods);

    let scores = match params.mode {
        MomentumMode::Fixed13612U | MomentumMode::Average => calendar
            .rows
            .iter()
            .map(|&row| average_scores(table, row, &lookbacks))
            .collect(),
        MomentumMode::Relative => {
            let months = *lookbacks.first().ok_or_else(|| QuantestError::Configuration {
                reason: "relative momentum requires at least one lookback period".into(),
            })?;
            let window = months as usize * TRADING_DAYS_PER_MONTH;
            calendar
                .rows
                .iter()
                .map(|&row| window_returns(table, row, window))
                .collect()
        }
    };

    debug!(
        mode = %params.mode,
        dates = calendar.len(),
        lookbacks = ?lookbacks,
        "computed momentum scores"
    );

    Ok(MomentumScoreTable {
        dates: calendar.dates.clone(),
        tickers: table.tickers().to_vec(),
        scores,
    })
}

/// Trading-day momentum on every row of the table, averaged over the mode's
/// lookbacks. Rows without enough history contribute 0 for that lookback.
pub fn full_momentum(table: &PriceTable, params: &MomentumParams) -> MomentumScoreTable {
    let lookbacks = params.mode.lookbacks(&params.periods);
    let width = table.tickers().len();

    let scores = (0..table.len())
        .map(|row| {
            if lookbacks.is_empty() {
                return vec![0.0; width];
            }
            let mut sum = vec![0.0; width];
            for &m in &lookbacks {
                let window = m as usize * TRADING_DAYS_PER_MONTH;
                for (acc, r) in sum.iter_mut().zip(window_returns(table, row, window)) {
                    *acc += r;
                }
            }
            sum.iter().map(|s| s / lookbacks.len() as f64).collect()
        })
        .collect();

    MomentumScoreTable {
        dates: table.dates().to_vec(),
        tickers: table.tickers().to_vec(),
        scores,
    }
}

fn average_scores(table: &PriceTable, row: usize, lookbacks: &[u32]) -> Vec<f64> {
    let width = table.tickers().len();
    if lookbacks.is_empty() {
        return vec![0.0; width];
    }

    let date = table.dates()[row];
    let first = table.dates()[0];
    let mut sum = vec![0.0; width];

    for &m in lookbacks {
        let past = match date.checked_sub_months(Months::new(m)) {
            Some(p) if p >= first => p,
            _ => continue,
        };
        let Some(past_row) = table.nearest_index(past) else {
            continue;
        };
        for (col, acc) in sum.iter_mut().enumerate() {
            *acc += table.price(row, col) / table.price(past_row, col) - 1.0;
        }
    }

    sum.iter().map(|s| s / lookbacks.len() as f64).collect()
}

fn window_returns(table: &PriceTable, row: usize, window: usize) -> Vec<f64> {
    (0..table.tickers().len())
        .map(|col| {
            if window == 0 || row < window {
                0.0
            } else {
                let r = table.price(row, col) / table.price(row - window, col) - 1.0;
                if r.is_finite() { r } else { 0.0 }
            }
        })
        .collect()
}
