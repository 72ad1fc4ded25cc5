//! Performance metrics and statistics.

use crate::domain::allocation::TargetWeightTable;
use crate::domain::calendar::RebalanceCalendar;
use crate::domain::growth::{mdd_details, pure_growth};
use crate::domain::price_table::PriceTable;
use crate::domain::series::TimeSeries;
use crate::domain::simulation::{Granularity, TRADING_DAYS_PER_YEAR};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub cagr: f64,
    pub mdd: f64,
    pub mdd_start: Option<NaiveDate>,
    pub mdd_end: Option<NaiveDate>,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    /// Last value of the contribution-inclusive curve.
    pub final_value: f64,
    pub total_contributed: f64,
    pub total_profit: f64,
}

/// Inputs shared by the strategy and benchmark metric calculations.
#[derive(Debug, Clone, Copy)]
pub struct MetricInputs<'a> {
    pub returns: &'a TimeSeries,
    /// Pure growth curve, free of contributions.
    pub growth: &'a TimeSeries,
    /// Contribution-inclusive value curve.
    pub value: &'a TimeSeries,
    pub initial_capital: f64,
    pub total_contributed: f64,
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

impl PerformanceMetrics {
    /// CAGR, drawdown, volatility, Sharpe and win rate come from the pure
    /// growth curve so contributions do not distort them. All of them are 0
    /// when the curve spans no time.
    pub fn compute(inputs: MetricInputs<'_>) -> Self {
        let final_value = inputs.value.last_value().unwrap_or(inputs.initial_capital);
        let mut metrics = PerformanceMetrics {
            final_value,
            total_contributed: inputs.total_contributed,
            total_profit: final_value - inputs.total_contributed,
            ..PerformanceMetrics::default()
        };

        let years = span_years(inputs.growth);
        if years <= 0.0 {
            return metrics;
        }

        let final_growth = inputs.growth.last_value().unwrap_or(inputs.initial_capital);
        metrics.cagr = cagr(final_growth, inputs.initial_capital, years);

        let mdd = mdd_details(inputs.growth);
        metrics.mdd = mdd.mdd;
        metrics.mdd_start = mdd.start;
        metrics.mdd_end = mdd.end;

        metrics.volatility = sample_std(&inputs.returns.values) * inputs.periods_per_year.sqrt();
        metrics.sharpe_ratio = sharpe(metrics.cagr, inputs.risk_free_rate, metrics.volatility);
        metrics.win_rate = win_rate(&inputs.returns.values);

        metrics
    }
}

fn span_years(series: &TimeSeries) -> f64 {
    match (series.first_date(), series.last_date()) {
        (Some(first), Some(last)) => (last - first).num_days() as f64 / DAYS_PER_YEAR,
        _ => 0.0,
    }
}

fn cagr(final_value: f64, initial_value: f64, years: f64) -> f64 {
    if initial_value <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    let ratio = final_value / initial_value;
    if ratio <= 0.0 {
        return -1.0;
    }
    let value = ratio.powf(1.0 / years) - 1.0;
    if value.is_finite() { value } else { 0.0 }
}

/// Standard deviation with one degree of freedom removed.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

fn sharpe(cagr: f64, risk_free_rate: f64, volatility: f64) -> f64 {
    if volatility > 0.0 {
        (cagr - risk_free_rate) / volatility
    } else {
        0.0
    }
}

fn win_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&r| r > 0.0).count() as f64 / values.len() as f64
}

/// How one holdable asset did over the periods it was held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetContribution {
    pub ticker: String,
    pub held_periods: usize,
    pub mean_return: f64,
    pub win_rate: f64,
}

/// For every ticker, counts the rebalance intervals `(t-1, t]` entered with a
/// positive weight and summarises the asset's own return over them.
pub fn asset_contribution(
    table: &PriceTable,
    calendar: &RebalanceCalendar,
    weights: &TargetWeightTable,
    tickers: &[String],
) -> Vec<AssetContribution> {
    let mut out = Vec::with_capacity(tickers.len());

    for ticker in tickers {
        let (Some(col), Some(wcol)) = (
            table.ticker_index(ticker),
            weights.tickers.iter().position(|t| t == ticker),
        ) else {
            continue;
        };

        let returns = table.returns_at(col, &calendar.rows);
        let held: Vec<f64> = (1..returns.len())
            .filter(|&t| weights.row(t - 1)[wcol] > 0.0)
            .map(|t| returns[t])
            .collect();

        let mean_return = if held.is_empty() {
            0.0
        } else {
            held.iter().sum::<f64>() / held.len() as f64
        };

        out.push(AssetContribution {
            ticker: ticker.clone(),
            held_periods: held.len(),
            mean_return,
            win_rate: win_rate(&held),
        });
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualReturn {
    pub year: i32,
    pub strategy: f64,
    pub benchmark: f64,
}

/// Compounded returns per calendar year for the strategy and the benchmark.
pub fn annual_returns(strategy: &TimeSeries, benchmark: &TimeSeries) -> Vec<AnnualReturn> {
    let compound_by_year = |series: &TimeSeries| -> BTreeMap<i32, f64> {
        let mut years: BTreeMap<i32, f64> = BTreeMap::new();
        for (date, r) in series.iter() {
            *years.entry(date.year()).or_insert(1.0) *= 1.0 + r;
        }
        years
    };

    let strat = compound_by_year(strategy);
    let bench = compound_by_year(benchmark);

    strat
        .iter()
        .map(|(&year, &growth)| AnnualReturn {
            year,
            strategy: growth - 1.0,
            benchmark: bench.get(&year).map_or(0.0, |g| g - 1.0),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    /// 1 for January through 12 for December.
    pub month: u32,
    pub strategy: f64,
}

/// Strategy returns laid out by year and calendar month.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlyReturnTable {
    /// Sorted by year, then month.
    pub entries: Vec<MonthlyReturn>,
    /// Mean over the years that have a value for each month, January first.
    pub averages: [Option<f64>; 12],
}

impl MonthlyReturnTable {
    pub fn get(&self, year: i32, month: u32) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.year == year && e.month == month)
            .map(|e| e.strategy)
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.entries.iter().map(|e| e.year).collect();
        years.dedup();
        years
    }
}

/// Daily returns are compounded within each calendar month. Period returns
/// are already one per rebalance and are keyed by the month they fall in.
pub fn monthly_returns(returns: &TimeSeries, granularity: Granularity) -> MonthlyReturnTable {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    match granularity {
        Granularity::Daily => {
            for (date, r) in returns.iter() {
                *months.entry((date.year(), date.month())).or_insert(1.0) *= 1.0 + r;
            }
            months.values_mut().for_each(|g| *g -= 1.0);
        }
        Granularity::Period => {
            for (date, r) in returns.iter() {
                months.insert((date.year(), date.month()), r);
            }
        }
    }

    let mut sums = [(0.0, 0usize); 12];
    for (&(_, month), &r) in &months {
        let slot = &mut sums[month as usize - 1];
        slot.0 += r;
        slot.1 += 1;
    }
    let averages = sums.map(|(sum, n)| (n > 0).then(|| sum / n as f64));

    MonthlyReturnTable {
        entries: months
            .into_iter()
            .map(|((year, month), strategy)| MonthlyReturn {
                year,
                month,
                strategy,
            })
            .collect(),
        averages,
    }
}

/// Buy-and-hold statistics of a single ticker over daily returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPerformance {
    pub ticker: String,
    pub cagr: f64,
    pub volatility: f64,
    pub mdd: f64,
    pub sharpe_ratio: f64,
}

pub fn asset_performance(table: &PriceTable, risk_free_rate: f64) -> Vec<AssetPerformance> {
    if table.len() < 2 {
        return Vec::new();
    }
    let rows: Vec<usize> = (0..table.len()).collect();

    table
        .tickers()
        .iter()
        .enumerate()
        .map(|(col, ticker)| {
            // the first return is undefined and is left out
            let returns = TimeSeries::new(
                table.dates()[1..].to_vec(),
                table.returns_at(col, &rows)[1..].to_vec(),
            );
            let growth = pure_growth(&returns, 1.0);
            let years = span_years(&growth);

            let mut perf = AssetPerformance {
                ticker: ticker.clone(),
                cagr: 0.0,
                volatility: 0.0,
                mdd: 0.0,
                sharpe_ratio: 0.0,
            };
            if years > 0.0 {
                perf.cagr = cagr(growth.last_value().unwrap_or(1.0), 1.0, years);
                perf.mdd = mdd_details(&growth).mdd;
                perf.volatility = sample_std(&returns.values) * TRADING_DAYS_PER_YEAR.sqrt();
                perf.sharpe_ratio = sharpe(perf.cagr, risk_free_rate, perf.volatility);
            }
            perf
        })
        .collect()
}
