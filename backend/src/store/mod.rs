//! Tabular stores the pipeline reads from and writes to.
//!
//! - [`MemoryStore`] - in-process grid, used by tests and dry runs
//! - [`JsonFileStore`] - a grid kept as a JSON array of rows on disk
//! - [`SheetsClient`] - Google Sheets v4 over HTTP
//!
//! Every store speaks plain request/response: read a range, overwrite it
//! from its top-left cell, apply a batch of dimension deletions.

pub mod file;
pub mod memory;
pub mod sheets;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::budget::{BatchRequest, BatchUpdate, Dimension};
use crate::error::StoreResult;
use crate::models::{Cell, Row};

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sheets::SheetsClient;

/// A range inside a spreadsheet, e.g. `Sheet1` or `Sheet1!A1:F`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSpec {
    pub spreadsheet_id: String,
    pub range: String,
}

impl RangeSpec {
    pub fn new(spreadsheet_id: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
        }
    }
}

/// Remote grid the pipeline syncs into.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Current rows of the range, or `None` when it holds no data.
    async fn read_rows(&self, range: &RangeSpec) -> StoreResult<Option<Vec<Row>>>;

    /// Overwrite the range starting at its top-left cell. Cells outside the
    /// written block are left untouched.
    async fn write_rows(&self, range: &RangeSpec, rows: &[Row]) -> StoreResult<()>;

    /// Apply dimension deletions to the spreadsheet.
    async fn apply_batch(&self, spreadsheet_id: &str, batch: &BatchUpdate) -> StoreResult<()>;
}

/// Write `rows` over `grid` from the top-left corner.
pub(crate) fn overlay(grid: &mut Vec<Row>, rows: &[Row]) {
    for (i, row) in rows.iter().enumerate() {
        if i >= grid.len() {
            grid.push(Vec::new());
        }
        let target = &mut grid[i];
        if target.len() < row.len() {
            target.resize(row.len(), Cell::Empty);
        }
        for (j, cell) in row.iter().enumerate() {
            target[j] = cell.clone();
        }
    }
}

/// Apply open-ended deletions to a local grid.
pub(crate) fn apply_deletions(grid: &mut Vec<Row>, batch: &BatchUpdate) {
    for request in &batch.requests {
        let BatchRequest::DeleteDimension { range } = request;
        match range.dimension {
            Dimension::Rows => grid.truncate(range.start_index),
            Dimension::Columns => {
                for row in grid.iter_mut() {
                    row.truncate(range.start_index);
                }
            }
        }
    }
}
