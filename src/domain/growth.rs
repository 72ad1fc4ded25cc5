//! Growth curves and drawdowns.

use crate::domain::series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Compounds returns from `initial_capital` with no external cash.
pub fn pure_growth(returns: &TimeSeries, initial_capital: f64) -> TimeSeries {
    let mut value = initial_capital;
    let values = returns
        .values
        .iter()
        .map(|r| {
            value *= 1.0 + r;
            value
        })
        .collect();
    TimeSeries::new(returns.dates.clone(), values)
}

/// Compounds returns and adds `contribution` after each step dated on a
/// contribution date. Returns the curve and the number of contributions made.
pub fn dca_growth(
    returns: &TimeSeries,
    initial_capital: f64,
    contribution: f64,
    contribution_dates: &[NaiveDate],
) -> (TimeSeries, usize) {
    let on_schedule: HashSet<NaiveDate> = contribution_dates.iter().copied().collect();
    let mut capital = initial_capital;
    let mut contributions = 0;
    let mut values = Vec::with_capacity(returns.len());

    for (date, r) in returns.iter() {
        capital *= 1.0 + r;
        if contribution > 0.0 && on_schedule.contains(&date) {
            capital += contribution;
            contributions += 1;
        }
        values.push(capital);
    }

    (TimeSeries::new(returns.dates.clone(), values), contributions)
}

/// Decline from the running peak at every step, as a non-positive fraction.
pub fn drawdown_series(growth: &TimeSeries) -> TimeSeries {
    let mut peak = f64::NEG_INFINITY;
    let values = growth
        .values
        .iter()
        .map(|&v| {
            peak = peak.max(v);
            if peak > 0.0 { v / peak - 1.0 } else { 0.0 }
        })
        .collect();
    TimeSeries::new(growth.dates.clone(), values)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MddDetails {
    pub mdd: f64,
    /// Peak preceding the trough.
    pub start: Option<NaiveDate>,
    /// Trough.
    pub end: Option<NaiveDate>,
}

/// Maximum drawdown with its peak and trough dates. The trough is the first
/// occurrence of the deepest drawdown; the peak is the first occurrence of
/// the highest value up to the trough.
pub fn mdd_details(growth: &TimeSeries) -> MddDetails {
    let drawdown = drawdown_series(growth);

    let mut trough: Option<usize> = None;
    for (i, &dd) in drawdown.values.iter().enumerate() {
        match trough {
            Some(t) if dd >= drawdown.values[t] => {}
            _ => trough = Some(i),
        }
    }

    let Some(end) = trough else {
        return MddDetails::default();
    };

    let mut peak = 0;
    for i in 1..=end {
        if growth.values[i] > growth.values[peak] {
            peak = i;
        }
    }

    MddDetails {
        mdd: drawdown.values[end],
        start: Some(growth.dates[peak]),
        end: Some(growth.dates[end]),
    }
}
