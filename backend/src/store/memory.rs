//! In-memory tabular store.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{apply_deletions, overlay, RangeSpec, TabularStore};
use crate::budget::BatchUpdate;
use crate::error::{StoreError, StoreResult, UNAVAILABLE_SIGNAL};
use crate::models::Row;

/// A single grid held in memory. Range and spreadsheet ids are ignored.
#[derive(Debug, Default)]
pub struct MemoryStore {
    grid: RwLock<Vec<Row>>,
    /// Number of upcoming calls that fail as "service unavailable".
    outages: AtomicU32,
    calls: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            grid: RwLock::new(rows),
            ..Self::default()
        }
    }

    /// Make the next `count` calls fail with a transient outage.
    pub fn with_outages(self, count: u32) -> Self {
        self.outages.store(count, Ordering::SeqCst);
        self
    }

    /// Snapshot of the grid.
    pub async fn rows(&self) -> Vec<Row> {
        self.grid.read().await.clone()
    }

    /// Names of the calls received so far, failed ones included.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    async fn record(&self, call: &str) -> StoreResult<()> {
        self.calls.write().await.push(call.to_string());
        let remaining = self.outages.load(Ordering::SeqCst);
        if remaining > 0 {
            self.outages.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Status {
                status: 503,
                message: UNAVAILABLE_SIGNAL.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_rows(&self, _range: &RangeSpec) -> StoreResult<Option<Vec<Row>>> {
        self.record("read").await?;
        let grid = self.grid.read().await;
        Ok((!grid.is_empty()).then(|| grid.clone()))
    }

    async fn write_rows(&self, _range: &RangeSpec, rows: &[Row]) -> StoreResult<()> {
        self.record("write").await?;
        overlay(&mut *self.grid.write().await, rows);
        Ok(())
    }

    async fn apply_batch(&self, _spreadsheet_id: &str, batch: &BatchUpdate) -> StoreResult<()> {
        self.record("batch").await?;
        apply_deletions(&mut *self.grid.write().await, batch);
        Ok(())
    }
}
