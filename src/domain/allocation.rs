//! Portfolio construction: canary risk gate, top-N selection and hybrid
//! protection.

use crate::domain::momentum::MomentumScoreTable;
use crate::domain::universe::AssetClasses;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightingScheme {
    #[default]
    Equal,
}

impl FromStr for WeightingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equal" => Ok(WeightingScheme::Equal),
            other => Err(format!("only equal weighting is supported, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioParams {
    pub use_canary: bool,
    pub use_hybrid_protection: bool,
    pub top_n_aggressive: usize,
    pub top_n_defensive: usize,
    pub weighting: WeightingScheme,
}

impl Default for PortfolioParams {
    fn default() -> Self {
        PortfolioParams {
            use_canary: true,
            use_hybrid_protection: true,
            top_n_aggressive: 1,
            top_n_defensive: 1,
            weighting: WeightingScheme::Equal,
        }
    }
}

/// Which branch of the construction produced a date's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvestmentMode {
    Aggressive,
    Defensive,
}

impl fmt::Display for InvestmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvestmentMode::Aggressive => write!(f, "Aggressive"),
            InvestmentMode::Defensive => write!(f, "Defensive"),
        }
    }
}

/// Target weights per rebalance date (rows) and ticker (columns). A row
/// summing to less than one leaves the remainder in cash.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetWeightTable {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    pub weights: Vec<Vec<f64>>,
}

impl TargetWeightTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.weights[row]
    }

    pub fn row_sum(&self, row: usize) -> f64 {
        self.weights[row].iter().sum()
    }

    pub fn weight(&self, row: usize, ticker: &str) -> Option<f64> {
        let col = self.tickers.iter().position(|t| t == ticker)?;
        self.weights.get(row).map(|r| r[col])
    }

    /// Tickers with a non-zero weight on a date.
    pub fn holdings(&self, row: usize) -> Vec<(&str, f64)> {
        self.tickers
            .iter()
            .zip(&self.weights[row])
            .filter(|(_, w)| **w > 0.0)
            .map(|(t, w)| (t.as_str(), *w))
            .collect()
    }
}

/// Builds target weights and investment modes for every scored date.
/// `classes` must already be restricted to tickers present in `scores`.
pub fn construct_portfolio(
    scores: &MomentumScoreTable,
    classes: &AssetClasses,
    params: &PortfolioParams,
) -> (TargetWeightTable, Vec<InvestmentMode>) {
    let columns = |list: &[String]| -> Vec<usize> {
        list.iter()
            .filter_map(|t| scores.tickers.iter().position(|x| x == t))
            .collect()
    };
    let aggressive = columns(&classes.aggressive);
    let defensive = columns(&classes.defensive);
    let canary = columns(&classes.canary);

    let mut weights = Vec::with_capacity(scores.len());
    let mut modes = Vec::with_capacity(scores.len());

    for (date, row) in scores.dates.iter().zip(&scores.scores) {
        let (weight_row, mode) = allocate_row(row, &aggressive, &defensive, &canary, params);
        debug!(date = %date, mode = %mode, "allocated");
        weights.push(weight_row);
        modes.push(mode);
    }

    (
        TargetWeightTable {
            dates: scores.dates.clone(),
            tickers: scores.tickers.clone(),
            weights,
        },
        modes,
    )
}

fn allocate_row(
    scores: &[f64],
    aggressive: &[usize],
    defensive: &[usize],
    canary: &[usize],
    params: &PortfolioParams,
) -> (Vec<f64>, InvestmentMode) {
    let mut row = vec![0.0; scores.len()];
    let best_defensive = top_n(scores, defensive, params.top_n_defensive);

    let risk_on = if params.use_canary && !canary.is_empty() {
        let mean = canary.iter().map(|&c| scores[c]).sum::<f64>() / canary.len() as f64;
        mean > 0.0
    } else {
        true
    };

    if risk_on {
        let top_aggressive = top_n(scores, aggressive, params.top_n_aggressive);
        if !top_aggressive.is_empty() {
            let share = 1.0 / top_aggressive.len() as f64;
            for &col in &top_aggressive {
                if params.use_hybrid_protection && scores[col] <= 0.0 {
                    // with no defensive substitute the share stays in cash
                    for &def in &best_defensive {
                        row[def] += share / best_defensive.len() as f64;
                    }
                } else {
                    row[col] += share;
                }
            }
            return (row, InvestmentMode::Aggressive);
        }
    }

    for &def in &best_defensive {
        row[def] += 1.0 / best_defensive.len() as f64;
    }
    (row, InvestmentMode::Defensive)
}

/// Highest-scoring columns, descending. Ties keep the candidates' order and
/// non-finite scores are never selected.
fn top_n(scores: &[f64], candidates: &[usize], n: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&c| scores[c].is_finite())
        .collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    ranked.truncate(n);
    ranked
}
