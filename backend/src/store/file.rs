//! Tabular store backed by a local JSON file.
//!
//! The file holds the grid as an array of rows, e.g. `[["url","price"],["a.com",10]]`.
//! A missing file is an empty grid.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{apply_deletions, overlay, RangeSpec, TabularStore};
use crate::budget::BatchUpdate;
use crate::error::StoreResult;
use crate::models::Row;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<Vec<Row>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, grid: &[Row]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(grid)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl TabularStore for JsonFileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn read_rows(&self, _range: &RangeSpec) -> StoreResult<Option<Vec<Row>>> {
        let _guard = self.lock.lock().await;
        let grid = self.load().await?;
        Ok((!grid.is_empty()).then_some(grid))
    }

    async fn write_rows(&self, _range: &RangeSpec, rows: &[Row]) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut grid = self.load().await?;
        overlay(&mut grid, rows);
        self.save(&grid).await
    }

    async fn apply_batch(&self, _spreadsheet_id: &str, batch: &BatchUpdate) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut grid = self.load().await?;
        apply_deletions(&mut grid, batch);
        self.save(&grid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{trim_requests, TrimInstruction};
    use crate::error::StoreError;
    use crate::models::Cell;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("sheet.json"));
        let range = RangeSpec::new("local", "Sheet1");
        assert!(store.read_rows(&range).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_trim_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("sheet.json");
        let store = JsonFileStore::new(&path);
        let range = RangeSpec::new("local", "Sheet1");

        let rows: Vec<Row> = vec![
            vec![Cell::from("url"), Cell::from("price")],
            vec![Cell::from("a.com"), Cell::from(10)],
            vec![Cell::from("b.com"), Cell::from(20)],
        ];
        store.write_rows(&range, &rows).await.unwrap();

        let trim = TrimInstruction {
            target_row_count: Some(2),
            target_column_count: None,
        };
        store.apply_batch("local", &trim_requests(&trim, 0)).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        let grid = reopened.read_rows(&range).await.unwrap().unwrap();
        assert_eq!(grid, rows[..2].to_vec());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path);
        let err = store.read_rows(&RangeSpec::new("x", "y")).await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
