//! Rebalance calendar generation.

use crate::domain::price_table::PriceTable;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceFrequency {
    Monthly,
    Quarterly,
}

impl RebalanceFrequency {
    /// Calendar bucket a date belongs to.
    fn period_key(self, date: NaiveDate) -> (i32, u32) {
        match self {
            RebalanceFrequency::Monthly => (date.year(), date.month()),
            RebalanceFrequency::Quarterly => (date.year(), (date.month() - 1) / 3 + 1),
        }
    }
}

impl FromStr for RebalanceFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(RebalanceFrequency::Monthly),
            "quarterly" => Ok(RebalanceFrequency::Quarterly),
            other => Err(format!("expected monthly or quarterly, got '{other}'")),
        }
    }
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceFrequency::Monthly => write!(f, "monthly"),
            RebalanceFrequency::Quarterly => write!(f, "quarterly"),
        }
    }
}

/// Which trading day of each period the portfolio is rebalanced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceDay {
    First,
    Last,
}

impl FromStr for RebalanceDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(RebalanceDay::First),
            "last" => Ok(RebalanceDay::Last),
            other => Err(format!("expected first or last, got '{other}'")),
        }
    }
}

impl fmt::Display for RebalanceDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceDay::First => write!(f, "first"),
            RebalanceDay::Last => write!(f, "last"),
        }
    }
}

/// Rebalance dates together with their row positions in the price table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RebalanceCalendar {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<usize>,
}

impl RebalanceCalendar {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }
}

/// Picks the first or last trading date of every month or quarter present in
/// the table.
pub fn rebalance_calendar(
    table: &PriceTable,
    frequency: RebalanceFrequency,
    day: RebalanceDay,
) -> RebalanceCalendar {
    let mut calendar = RebalanceCalendar::default();
    let mut current: Option<(i32, u32)> = None;

    for (row, &date) in table.dates().iter().enumerate() {
        let key = frequency.period_key(date);
        let new_period = current != Some(key);
        current = Some(key);

        match day {
            RebalanceDay::First => {
                if new_period {
                    calendar.dates.push(date);
                    calendar.rows.push(row);
                }
            }
            RebalanceDay::Last => {
                if new_period {
                    calendar.dates.push(date);
                    calendar.rows.push(row);
                } else if let (Some(d), Some(r)) =
                    (calendar.dates.last_mut(), calendar.rows.last_mut())
                {
                    *d = date;
                    *r = row;
                }
            }
        }
    }

    calendar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_table::PricePoint;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn table(dates: &[NaiveDate]) -> PriceTable {
        let points = dates
            .iter()
            .enumerate()
            .map(|(i, &date)| PricePoint::new(date, 100.0 + i as f64))
            .collect();
        PriceTable::align(&[("SPY".to_string(), points)])
    }

    fn sample_dates() -> Vec<NaiveDate> {
        vec![
            d(2024, 1, 2),
            d(2024, 1, 31),
            d(2024, 2, 1),
            d(2024, 2, 29),
            d(2024, 3, 28),
            d(2024, 4, 1),
            d(2024, 4, 30),
        ]
    }

    #[test]
    fn monthly_first() {
        let cal = rebalance_calendar(
            &table(&sample_dates()),
            RebalanceFrequency::Monthly,
            RebalanceDay::First,
        );
        assert_eq!(
            cal.dates,
            vec![d(2024, 1, 2), d(2024, 2, 1), d(2024, 3, 28), d(2024, 4, 1)]
        );
        assert_eq!(cal.rows, vec![0, 2, 4, 5]);
    }

    #[test]
    fn monthly_last() {
        let cal = rebalance_calendar(
            &table(&sample_dates()),
            RebalanceFrequency::Monthly,
            RebalanceDay::Last,
        );
        assert_eq!(
            cal.dates,
            vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 28), d(2024, 4, 30)]
        );
        assert_eq!(cal.rows, vec![1, 3, 4, 6]);
    }

    #[test]
    fn quarterly_first_and_last() {
        let t = table(&sample_dates());
        let first = rebalance_calendar(&t, RebalanceFrequency::Quarterly, RebalanceDay::First);
        assert_eq!(first.dates, vec![d(2024, 1, 2), d(2024, 4, 1)]);

        let last = rebalance_calendar(&t, RebalanceFrequency::Quarterly, RebalanceDay::Last);
        assert_eq!(last.dates, vec![d(2024, 3, 28), d(2024, 4, 30)]);
        assert_eq!(last.rows, vec![4, 6]);
    }

    #[test]
    fn same_month_in_different_years_are_separate_periods() {
        let t = table(&[d(2023, 1, 5), d(2024, 1, 5)]);
        let cal = rebalance_calendar(&t, RebalanceFrequency::Monthly, RebalanceDay::Last);
        assert_eq!(cal.len(), 2);
    }

    #[test]
    fn empty_table_gives_empty_calendar() {
        let cal = rebalance_calendar(
            &PriceTable::default(),
            RebalanceFrequency::Monthly,
            RebalanceDay::First,
        );
        assert!(cal.is_empty());
    }

    #[test]
    fn parse_options() {
        assert_eq!(
            "Quarterly".parse::<RebalanceFrequency>(),
            Ok(RebalanceFrequency::Quarterly)
        );
        assert_eq!(" last ".parse::<RebalanceDay>(), Ok(RebalanceDay::Last));
        assert!("weekly".parse::<RebalanceFrequency>().is_err());
        assert!("middle".parse::<RebalanceDay>().is_err());
    }
}
