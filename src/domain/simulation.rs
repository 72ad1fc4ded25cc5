//! Return simulation net of turnover costs.

use crate::domain::allocation::TargetWeightTable;
use crate::domain::calendar::{RebalanceCalendar, RebalanceFrequency};
use crate::domain::error::QuantestError;
use crate::domain::price_table::PriceTable;
use crate::domain::series::TimeSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Step size of the simulated return series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One step per rebalance period.
    Period,
    /// One step per trading day.
    Daily,
}

impl Granularity {
    /// Steps per year used to annualise volatility.
    pub fn periods_per_year(self, frequency: RebalanceFrequency) -> f64 {
        match (self, frequency) {
            (Granularity::Daily, _) => TRADING_DAYS_PER_YEAR,
            (Granularity::Period, RebalanceFrequency::Monthly) => 12.0,
            (Granularity::Period, RebalanceFrequency::Quarterly) => 4.0,
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "period" => Ok(Granularity::Period),
            "daily" => Ok(Granularity::Daily),
            other => Err(format!("expected daily or period, got '{other}'")),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Period => write!(f, "period"),
            Granularity::Daily => write!(f, "daily"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub portfolio: TimeSeries,
    pub benchmark: TimeSeries,
    pub turnover: TimeSeries,
    pub costs: TimeSeries,
}

/// Simulates the strategy and the benchmark at the requested granularity.
///
/// The return of step `t` is earned by the weights held after step `t - 1`,
/// minus `turnover(t) * cost_rate`. In daily mode weights are carried forward
/// between rebalance dates and costs are only charged on rebalance dates.
pub fn simulate(
    table: &PriceTable,
    calendar: &RebalanceCalendar,
    weights: &TargetWeightTable,
    cost_rate: f64,
    granularity: Granularity,
    benchmark: &str,
) -> Result<SimulationOutput, QuantestError> {
    let benchmark_col = table
        .ticker_index(benchmark)
        .ok_or_else(|| QuantestError::data_unavailable(benchmark))?;

    let cols = weights
        .tickers
        .iter()
        .map(|t| {
            table
                .ticker_index(t)
                .ok_or_else(|| QuantestError::data_unavailable(t.as_str()))
        })
        .collect::<Result<Vec<usize>, _>>()?;

    let output = match granularity {
        Granularity::Period => simulate_periods(table, calendar, weights, &cols, cost_rate, benchmark_col),
        Granularity::Daily => simulate_daily(table, calendar, weights, &cols, cost_rate, benchmark_col),
    };

    debug!(
        granularity = %granularity,
        steps = output.portfolio.len(),
        total_cost = output.costs.values.iter().sum::<f64>(),
        "simulated returns"
    );

    Ok(output)
}

fn simulate_periods(
    table: &PriceTable,
    calendar: &RebalanceCalendar,
    weights: &TargetWeightTable,
    cols: &[usize],
    cost_rate: f64,
    benchmark_col: usize,
) -> SimulationOutput {
    let rows = &calendar.rows;
    let asset_returns: Vec<Vec<f64>> = cols.iter().map(|&c| table.returns_at(c, rows)).collect();

    let mut portfolio = Vec::with_capacity(rows.len());
    let mut turnover = Vec::with_capacity(rows.len());
    let mut costs = Vec::with_capacity(rows.len());

    for t in 0..rows.len() {
        if t == 0 {
            portfolio.push(0.0);
            turnover.push(0.0);
            costs.push(0.0);
            continue;
        }
        let prev = weights.row(t - 1);
        let step_turnover = turnover_between(prev, weights.row(t));
        let cost = step_turnover * cost_rate;
        let gross: f64 = prev
            .iter()
            .zip(&asset_returns)
            .map(|(w, r)| w * r[t])
            .sum();

        portfolio.push(gross - cost);
        turnover.push(step_turnover);
        costs.push(cost);
    }

    let dates = calendar.dates.clone();
    SimulationOutput {
        portfolio: TimeSeries::new(dates.clone(), portfolio),
        benchmark: TimeSeries::new(dates.clone(), table.returns_at(benchmark_col, rows)),
        turnover: TimeSeries::new(dates.clone(), turnover),
        costs: TimeSeries::new(dates, costs),
    }
}

fn simulate_daily(
    table: &PriceTable,
    calendar: &RebalanceCalendar,
    weights: &TargetWeightTable,
    cols: &[usize],
    cost_rate: f64,
    benchmark_col: usize,
) -> SimulationOutput {
    let n = table.len();
    let all_rows: Vec<usize> = (0..n).collect();
    let asset_returns: Vec<Vec<f64>> = cols
        .iter()
        .map(|&c| table.returns_at(c, &all_rows))
        .collect();

    let zeros = vec![0.0; cols.len()];
    let mut active: Option<usize> = None;
    let mut next = 0;

    let mut portfolio = Vec::with_capacity(n);
    let mut turnover = Vec::with_capacity(n);
    let mut costs = Vec::with_capacity(n);

    for i in 0..n {
        let prev: &[f64] = active.map_or(zeros.as_slice(), |a| weights.row(a));

        let is_rebalance = calendar.rows.get(next) == Some(&i);
        if is_rebalance {
            active = Some(next);
            next += 1;
        }
        let current: &[f64] = active.map_or(zeros.as_slice(), |a| weights.row(a));

        let step_turnover = if i == 0 { 0.0 } else { turnover_between(prev, current) };
        let cost = if is_rebalance { step_turnover * cost_rate } else { 0.0 };
        let gross: f64 = prev
            .iter()
            .zip(&asset_returns)
            .map(|(w, r)| w * r[i])
            .sum();

        portfolio.push(gross - cost);
        turnover.push(step_turnover);
        costs.push(cost);
    }

    let dates = table.dates().to_vec();
    SimulationOutput {
        portfolio: TimeSeries::new(dates.clone(), portfolio),
        benchmark: TimeSeries::new(dates.clone(), table.returns_at(benchmark_col, &all_rows)),
        turnover: TimeSeries::new(dates.clone(), turnover),
        costs: TimeSeries::new(dates, costs),
    }
}

/// Half the L1 distance between two weight rows.
pub fn turnover_between(previous: &[f64], current: &[f64]) -> f64 {
    previous
        .iter()
        .zip(current)
        .map(|(a, b)| (b - a).abs())
        .sum::<f64>()
        / 2.0
}
