//! JSON file result store.
//!
//! Each result is one file `<YYYYMMDDHHMMSS>_<name>.json` in the store
//! directory; the file stem is the result id.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::QuantestError;
use crate::ports::result_store_port::{ResultStorePort, SavedResult};
use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub struct JsonResultStore {
    directory: PathBuf,
}

impl JsonResultStore {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }
}

fn store_error(context: &str, e: impl std::fmt::Display) -> QuantestError {
    QuantestError::Store {
        reason: format!("{context}: {e}"),
    }
}

/// Keeps names usable as file names.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "backtest".to_string()
    } else {
        cleaned
    }
}

/// Splits an id into its timestamp and name, if it has both.
fn parse_id(id: &str) -> Option<SavedResult> {
    let (stamp, name) = id.split_once('_')?;
    let saved_at = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    if name.is_empty() {
        return None;
    }
    Some(SavedResult {
        id: id.to_string(),
        name: name.to_string(),
        saved_at,
    })
}

impl ResultStorePort for JsonResultStore {
    fn save(
        &self,
        result: &BacktestResult,
        name: &str,
        saved_at: NaiveDateTime,
    ) -> Result<String, QuantestError> {
        fs::create_dir_all(&self.directory)
            .map_err(|e| store_error(&self.directory.display().to_string(), e))?;

        let id = format!("{}_{}", saved_at.format(STAMP_FORMAT), sanitize(name));
        let path = self.path_for(&id);
        let json = serde_json::to_string(result).map_err(|e| store_error("serialize", e))?;
        fs::write(&path, json).map_err(|e| store_error(&path.display().to_string(), e))?;

        info!(id = %id, path = %path.display(), "saved result");
        Ok(id)
    }

    fn load(&self, id: &str) -> Result<BacktestResult, QuantestError> {
        let path = self.path_for(id);
        let content =
            fs::read_to_string(&path).map_err(|e| store_error(&path.display().to_string(), e))?;
        serde_json::from_str(&content).map_err(|e| store_error(id, e))
    }

    fn list(&self) -> Result<Vec<SavedResult>, QuantestError> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.directory)
            .map_err(|e| store_error(&self.directory.display().to_string(), e))?;

        let mut saved = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| store_error("directory entry", e))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(id) = file_name.strip_suffix(".json") else {
                continue;
            };
            match parse_id(id) {
                Some(result) => saved.push(result),
                None => debug!(file = %file_name, "skipping unrecognised file"),
            }
        }

        saved.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| a.name.cmp(&b.name)));
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
    }

    #[test]
    fn sanitize_replaces_path_characters() {
        assert_eq!(sanitize("my run/v2"), "my_run_v2");
        assert_eq!(sanitize("   "), "backtest");
        assert_eq!(sanitize("VAA-aggressive"), "VAA-aggressive");
    }

    #[test]
    fn parse_id_requires_stamp_and_name() {
        let parsed = parse_id("20240501093000_baseline").unwrap();
        assert_eq!(parsed.name, "baseline");
        assert_eq!(parsed.saved_at, at(1, 9));
        assert_eq!(parsed.display_name(), "baseline (2024-05-01)");

        assert!(parse_id("baseline").is_none());
        assert!(parse_id("2024_baseline").is_none());
        assert!(parse_id("20240501093000_").is_none());
    }

    #[test]
    fn list_is_newest_first_and_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = JsonResultStore::new(dir.path().to_path_buf());

        fs::write(dir.path().join("20240501093000_first.json"), "{}").unwrap();
        fs::write(dir.path().join("20240503093000_third.json"), "{}").unwrap();
        fs::write(dir.path().join("20240502093000_second.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();
        fs::write(dir.path().join("20240504093000_other.txt"), "").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[test]
    fn list_of_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonResultStore::new(dir.path().join("nothing-here"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn load_missing_id_is_store_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonResultStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load("20240501093000_missing"),
            Err(QuantestError::Store { .. })
        ));
    }

    #[test]
    fn load_garbage_is_store_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20240501093000_bad.json"), "{not json").unwrap();
        let store = JsonResultStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load("20240501093000_bad"),
            Err(QuantestError::Store { .. })
        ));
    }
}
