//! Result store port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::QuantestError;
use chrono::NaiveDateTime;

/// A stored result as shown in listings.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedResult {
    pub id: String,
    pub name: String,
    pub saved_at: NaiveDateTime,
}

impl SavedResult {
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.saved_at.format("%Y-%m-%d"))
    }
}

/// Persists complete result bundles.
pub trait ResultStorePort {
    /// Stores `result` under `name` and returns the id it can be loaded by.
    fn save(
        &self,
        result: &BacktestResult,
        name: &str,
        saved_at: NaiveDateTime,
    ) -> Result<String, QuantestError>;

    fn load(&self, id: &str) -> Result<BacktestResult, QuantestError>;

    /// Saved results, newest first.
    fn list(&self) -> Result<Vec<SavedResult>, QuantestError>;
}
