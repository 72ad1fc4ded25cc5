//! Price provider port trait.

use crate::domain::error::QuantestError;
use crate::domain::price_table::PricePoint;
use chrono::NaiveDate;

/// Source of daily adjusted closing prices.
pub trait PriceDataPort {
    /// Closes for `ticker` within `[start_date, end_date]`, sorted by date.
    fn fetch_closes(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, QuantestError>;

    fn list_tickers(&self) -> Result<Vec<String>, QuantestError>;

    /// First date, last date and row count of everything stored for `ticker`.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, QuantestError>;
}
