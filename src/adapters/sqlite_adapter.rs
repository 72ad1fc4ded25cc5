//! SQLite price adapter backed by a `prices(ticker, date, close)` table.

use crate::domain::error::QuantestError;
use crate::domain::price_table::PricePoint;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PriceDataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_error(e: rusqlite::Error) -> QuantestError {
    QuantestError::Data {
        reason: format!("sqlite: {e}"),
    }
}

impl SqliteAdapter {
    /// Opens the database named by `[data] path`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuantestError> {
        let db_path = config
            .get_trimmed("data", "path")
            .ok_or_else(|| QuantestError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?;
        let pool_size = config.get_int("data", "pool_size", 4).max(1) as u32;

        Self::build(SqliteConnectionManager::file(&db_path), pool_size)
    }

    pub fn in_memory() -> Result<Self, QuantestError> {
        Self::build(SqliteConnectionManager::memory(), 1)
    }

    fn build(manager: SqliteConnectionManager, size: u32) -> Result<Self, QuantestError> {
        let pool = Pool::builder()
            .max_size(size)
            .build(manager)
            .map_err(|e: r2d2::Error| QuantestError::Data {
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, QuantestError> {
        self.pool.get().map_err(|e: r2d2::Error| QuantestError::Data {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), QuantestError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS prices (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    close REAL NOT NULL,
                    PRIMARY KEY (ticker, date)
                );
                CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);",
            )
            .map_err(query_error)
    }

    /// Upserts closes for one ticker in a single transaction.
    pub fn insert_prices(&self, ticker: &str, points: &[PricePoint]) -> Result<(), QuantestError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for p in points {
            tx.execute(
                "INSERT OR REPLACE INTO prices (ticker, date, close) VALUES (?1, ?2, ?3)",
                params![ticker, p.date.format(DATE_FORMAT).to_string(), p.close],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, QuantestError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| QuantestError::Data {
        reason: format!("sqlite: invalid date '{s}': {e}"),
    })
}

impl PriceDataPort for SqliteAdapter {
    fn fetch_closes(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, QuantestError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, close FROM prices
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    ticker,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )
            .map_err(query_error)?;

        let mut points = Vec::new();
        for row in rows {
            let (date, close) = row.map_err(query_error)?;
            points.push(PricePoint::new(parse_date(&date)?, close));
        }
        Ok(points)
    }

    fn list_tickers(&self) -> Result<Vec<String>, QuantestError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM prices ORDER BY ticker")
            .map_err(query_error)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_error)?;

        let mut tickers = Vec::new();
        for row in rows {
            tickers.push(row.map_err(query_error)?);
        }
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, QuantestError> {
        let result: (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM prices WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
