//! CSV price adapter: one `<TICKER>.csv` file of daily closes per ticker.
//!
//! Files need a header with a `date` column (`YYYY-MM-DD`) and either an
//! `adj_close` or a `close` column; the adjusted close wins when both exist.

use crate::domain::error::QuantestError;
use crate::domain::price_table::PricePoint;
use crate::ports::price_port::PriceDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    fn read_all(&self, ticker: &str) -> Result<Vec<PricePoint>, QuantestError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| QuantestError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| QuantestError::Data {
                reason: format!("{ticker}: CSV header error: {e}"),
            })?
            .clone();

        let column = |names: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim().to_lowercase();
                names.iter().any(|n| *n == h)
            })
        };
        let date_col = column(&["date"]).ok_or_else(|| QuantestError::Data {
            reason: format!("{ticker}: missing date column"),
        })?;
        let close_col = column(&["adj_close", "adj close", "adjclose"])
            .or_else(|| column(&["close"]))
            .ok_or_else(|| QuantestError::Data {
                reason: format!("{ticker}: missing close column"),
            })?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| QuantestError::Data {
                reason: format!("{ticker}: CSV parse error: {e}"),
            })?;

            let date_str = record.get(date_col).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                QuantestError::Data {
                    reason: format!("{ticker}: invalid date '{date_str}': {e}"),
                }
            })?;

            // blank closes are gaps, not errors
            let close_str = record.get(close_col).unwrap_or_default().trim();
            if close_str.is_empty() {
                continue;
            }
            let close: f64 = close_str.parse().map_err(|e| QuantestError::Data {
                reason: format!("{ticker}: invalid close '{close_str}': {e}"),
            })?;

            points.push(PricePoint::new(date, close));
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

impl PriceDataPort for CsvAdapter {
    fn fetch_closes(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, QuantestError> {
        let mut points = self.read_all(ticker)?;
        points.retain(|p| p.date >= start_date && p.date <= end_date);
        Ok(points)
    }

    fn list_tickers(&self) -> Result<Vec<String>, QuantestError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| QuantestError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QuantestError::Data {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            if let Some(ticker) = name.to_string_lossy().strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, QuantestError> {
        if !self.csv_path(ticker).exists() {
            return Ok(None);
        }
        let points = self.read_all(ticker)?;
        Ok(match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, points.len())),
            _ => None,
        })
    }
}
