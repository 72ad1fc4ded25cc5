#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use quantest::domain::allocation::PortfolioParams;
use quantest::domain::backtest::BacktestConfig;
use quantest::domain::calendar::{RebalanceDay, RebalanceFrequency};
use quantest::domain::error::QuantestError;
use quantest::domain::momentum::{MomentumMode, MomentumParams};
use quantest::domain::price_table::PricePoint;
use quantest::domain::simulation::Granularity;
use quantest::domain::universe::AssetClasses;
use quantest::ports::price_port::PriceDataPort;
use std::collections::HashMap;

pub struct MockPriceDataPort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, ticker: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(ticker.to_string(), points);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl PriceDataPort for MockPriceDataPort {
    fn fetch_closes(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, QuantestError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(QuantestError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.date >= start_date && p.date <= end_date)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, QuantestError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, QuantestError> {
        match self.data.get(ticker) {
            Some(points) if !points.is_empty() => {
                let min = points.iter().map(|p| p.date).min().unwrap();
                let max = points.iter().map(|p| p.date).max().unwrap();
                Ok(Some((min, max, points.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Weekdays from `start` to `end` inclusive.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut d = start;
    while d <= end {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(d);
        }
        d += Duration::days(1);
    }
    days
}

/// A price path compounding `daily` per trading day from `start_price`.
pub fn compounding(days: &[NaiveDate], start_price: f64, daily: f64) -> Vec<PricePoint> {
    days.iter()
        .enumerate()
        .map(|(i, &d)| PricePoint::new(d, start_price * (1.0 + daily).powi(i as i32)))
        .collect()
}

/// A price path that alternates between two daily moves, giving both
/// up and down days.
pub fn zigzag(days: &[NaiveDate], start_price: f64, up: f64, down: f64) -> Vec<PricePoint> {
    let mut price = start_price;
    days.iter()
        .enumerate()
        .map(|(i, &d)| {
            if i > 0 {
                price *= if i % 2 == 0 { 1.0 + up } else { 1.0 + down };
            }
            PricePoint::new(d, price)
        })
        .collect()
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        start_date: date(2022, 1, 3),
        end_date: date(2023, 12, 29),
        initial_capital: 10_000.0,
        monthly_contribution: 0.0,
        benchmark: "SPY".into(),
        granularity: Granularity::Daily,
        rebalance_frequency: RebalanceFrequency::Monthly,
        rebalance_day: RebalanceDay::Last,
        transaction_cost: 0.0,
        risk_free_rate: 0.0,
        assets: AssetClasses {
            aggressive: vec!["SPY".into(), "EFA".into()],
            defensive: vec!["IEF".into(), "SHY".into()],
            canary: vec!["EEM".into()],
        },
        momentum: MomentumParams {
            mode: MomentumMode::Fixed13612U,
            periods: vec![1, 3, 6, 12],
        },
        portfolio: PortfolioParams::default(),
    }
}

/// Two years of weekday prices for the sample universe. SPY trends up,
/// EFA zigzags flat, the canary EEM rises and the defensive pair drift.
pub fn sample_port() -> MockPriceDataPort {
    let days = trading_days(date(2022, 1, 3), date(2023, 12, 29));
    MockPriceDataPort::new()
        .with_prices("SPY", compounding(&days, 400.0, 0.0006))
        .with_prices("EFA", zigzag(&days, 70.0, 0.01, -0.0098))
        .with_prices("EEM", compounding(&days, 45.0, 0.0003))
        .with_prices("IEF", compounding(&days, 100.0, 0.0001))
        .with_prices("SHY", compounding(&days, 80.0, 0.00005))
}
