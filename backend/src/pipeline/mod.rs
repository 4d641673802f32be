//! High-level pipeline API.
//!
//! [`reconcile`] is the pure core: sheet rows and new records in, rows to
//! write and a trim instruction out. [`run`] wires it to a dataset source, a
//! tabular store and an optional backup sink, phase by phase:
//!
//! ```text
//! load dataset → read sheet → reconcile → backup → budget check → write → trim
//! ```
//!
//! Write and trim are separate remote calls. A failure after a successful
//! write leaves the sheet written but untrimmed.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetsync::pipeline::{run, RunOptions};
//! use sheetsync::store::{MemoryStore, RangeSpec};
//! use sheetsync::source::InlineSource;
//!
//! let store = MemoryStore::new();
//! let options = RunOptions::new(RangeSpec::new("local", "Sheet1"), merge_config);
//! let summary = run(&options, &InlineSource::new(records), &store, None).await?;
//! println!("{} rows written", summary.rows_written);
//! ```

use serde::Serialize;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::backup::{BackupSink, StoredBackup};
use crate::budget::{check_budget, compute_trim, trim_requests, TrimInstruction, DEFAULT_MAX_CELLS};
use crate::codec::{to_records, to_rows, RowShape};
use crate::error::PipelineResult;
use crate::models::{RecordSet, Row};
use crate::reconcile::{merge, MergeConfig, MergeReport};
use crate::retry::{execute, RetryPolicy};
use crate::source::DatasetSource;
use crate::store::{RangeSpec, TabularStore};

// =============================================================================
// Pure core
// =============================================================================

/// Input of one reconciliation.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub new_records: RecordSet,
    /// Current sheet content, header first. `None` for an empty sheet.
    pub old_rows: Option<Vec<Row>>,
    pub merge_config: MergeConfig,
    pub max_cells: usize,
    pub row_shape: RowShape,
}

impl PipelineInput {
    pub fn new(new_records: RecordSet, old_rows: Option<Vec<Row>>, merge_config: MergeConfig) -> Self {
        Self {
            new_records,
            old_rows,
            merge_config,
            max_cells: DEFAULT_MAX_CELLS,
            row_shape: RowShape::default(),
        }
    }

    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    pub fn with_row_shape(mut self, row_shape: RowShape) -> Self {
        self.row_shape = row_shape;
        self
    }
}

/// Counts of one reconciliation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileStats {
    #[serde(flatten)]
    pub merge: MergeReport,
    /// Rows to write, header included
    pub rows: usize,
    pub cells: usize,
}

/// Result of [`reconcile`]
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub rows_to_write: Vec<Row>,
    pub trim: TrimInstruction,
    pub stats: ReconcileStats,
}

/// Merge the new batch into the sheet content and size-check the result.
pub fn reconcile(input: &PipelineInput) -> PipelineResult<PipelineOutput> {
    let old_rows = input.old_rows.as_deref();
    let old_records = to_records(old_rows.unwrap_or_default(), input.row_shape)?;

    let merged = merge(&old_records, &input.new_records, &input.merge_config)?;
    let rows_to_write = to_rows(&merged.records)?;
    let cells = check_budget(&rows_to_write, input.max_cells)?;
    let trim = compute_trim(old_rows, &rows_to_write);

    Ok(PipelineOutput {
        stats: ReconcileStats {
            merge: merged.report,
            rows: rows_to_write.len(),
            cells,
        },
        rows_to_write,
        trim,
    })
}

// =============================================================================
// Orchestration
// =============================================================================

/// Settings of a full run against a store.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub range: RangeSpec,
    /// Numeric id of the target sheet, for trim requests
    pub sheet_id: i64,
    pub merge_config: MergeConfig,
    pub max_cells: usize,
    pub row_shape: RowShape,
    pub create_backup: bool,
    /// Reconcile and report without writing anything
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

impl RunOptions {
    pub fn new(range: RangeSpec, merge_config: MergeConfig) -> Self {
        Self {
            range,
            sheet_id: 0,
            merge_config,
            max_cells: DEFAULT_MAX_CELLS,
            row_shape: RowShape::default(),
            create_backup: false,
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_sheet_id(mut self, sheet_id: i64) -> Self {
        self.sheet_id = sheet_id;
        self
    }

    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    pub fn with_row_shape(mut self, row_shape: RowShape) -> Self {
        self.row_shape = row_shape;
        self
    }

    pub fn with_backup(mut self, create_backup: bool) -> Self {
        self.create_backup = create_backup;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn backup_key(&self) -> String {
        format!("{}/{}", self.range.spreadsheet_id, self.range.range)
    }
}

/// Outcome of [`run`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub stats: ReconcileStats,
    pub trim: TrimInstruction,
    pub rows_written: usize,
    pub backup_id: Option<String>,
    pub dry_run: bool,
}

/// Run the whole pipeline. Every failure aborts the run.
pub async fn run(
    options: &RunOptions,
    source: &dyn DatasetSource,
    store: &dyn TabularStore,
    backup: Option<&dyn BackupSink>,
) -> PipelineResult<RunSummary> {
    log_info("PHASE - LOADING DATASET");
    log_info_indent(format!("Source: {}", source.describe()), 1);
    let new_records = source.load_records()?;
    log_success(format!("{} records loaded from the dataset", new_records.len()));

    log_info("PHASE - LOADING DATA FROM SPREADSHEET");
    log_info_indent(format!("Store: {}, range: {}", store.name(), options.range.range), 1);
    let old_rows = execute("Reading existing rows", &options.retry, || store.read_rows(&options.range)).await?;
    log_success(format!(
        "{} rows loaded from spreadsheet",
        old_rows.as_ref().map_or(0, Vec::len)
    ));

    log_info("PHASE - PROCESSING DATA");
    log_info_indent(format!("Mode: {:?}", options.merge_config.effective_strategy()), 1);
    let input = PipelineInput {
        new_records,
        old_rows,
        merge_config: options.merge_config.clone(),
        max_cells: options.max_cells,
        row_shape: options.row_shape,
    };
    let output = reconcile(&input)?;
    let merge_stats = &output.stats.merge;
    log_success(format!(
        "Merged {} old and {} new records into {} ({} duplicates dropped)",
        merge_stats.old_records, merge_stats.new_records, merge_stats.result_records, merge_stats.duplicates_dropped
    ));

    let backup_id = if options.create_backup {
        log_info("PHASE - SAVING BACKUP");
        save_backup(backup, &options.backup_key(), input.old_rows.as_deref())
    } else {
        None
    };

    log_info("PHASE - UPLOADING TO SPREADSHEET");
    let rows_written = if options.dry_run {
        log_warning("Dry run, nothing is written");
        0
    } else {
        upload(store, options, &output.rows_to_write, &output.trim).await?
    };

    log_success("Data uploaded...");
    Ok(RunSummary {
        stats: output.stats,
        trim: output.trim,
        rows_written,
        backup_id,
        dry_run: options.dry_run,
    })
}

/// Write a backup's rows back to the store, trimming what lies beyond them.
pub async fn restore(
    options: &RunOptions,
    backup: &StoredBackup,
    store: &dyn TabularStore,
) -> PipelineResult<TrimInstruction> {
    log_info(format!("PHASE - RESTORING BACKUP {}", backup.id));
    check_budget(&backup.rows, options.max_cells)?;

    let current = execute("Reading existing rows", &options.retry, || store.read_rows(&options.range)).await?;
    let trim = compute_trim(current.as_deref(), &backup.rows);
    if options.dry_run {
        log_warning("Dry run, nothing is written");
    } else {
        upload(store, options, &backup.rows, &trim).await?;
    }
    Ok(trim)
}

/// Best-effort: failures are logged, never fatal.
fn save_backup(sink: Option<&dyn BackupSink>, key: &str, rows: Option<&[Row]>) -> Option<String> {
    let Some(sink) = sink else {
        log_warning("Backup requested but no backup location is configured");
        return None;
    };
    let Some(rows) = rows else {
        log_info("There are currently no rows in the spreadsheet so we will not save backup...");
        return None;
    };

    match sink.save(key, rows) {
        Ok(id) => {
            log_success(format!("Backup saved as {}", id));
            Some(id)
        }
        Err(e) => {
            log_warning(format!("Saving backup failed: {}", e));
            None
        }
    }
}

/// Budget check, write, then trim. Returns the number of rows written.
async fn upload(
    store: &dyn TabularStore,
    options: &RunOptions,
    rows: &[Row],
    trim: &TrimInstruction,
) -> PipelineResult<usize> {
    let cells = check_budget(rows, options.max_cells)?;
    log_info(format!("Total rows: {}, total cells: {}", rows.len(), cells));

    if rows.is_empty() {
        log_warning("Nothing to write, the sheet is left untouched");
        return Ok(0);
    }

    log_info("Inserting new cells");
    execute("Inserting new rows", &options.retry, || store.write_rows(&options.range, rows)).await?;
    log_success("Items inserted...");

    log_info("Maybe deleting unused cells");
    if trim.is_empty() {
        log_info_indent("No need to delete any rows or columns", 1);
        return Ok(rows.len());
    }
    if let Some(row_count) = trim.target_row_count {
        log_info_indent(format!("Will delete unused rows from row {}", row_count + 1), 1);
    }
    if let Some(column_count) = trim.target_column_count {
        log_info_indent(format!("Will delete unused columns from column {}", column_count + 1), 1);
    }

    let batch = trim_requests(trim, options.sheet_id);
    execute("Trimming excessive cells", &options.retry, || {
        store.apply_batch(&options.range.spreadsheet_id, &batch)
    })
    .await?;
    log_success("Unused cells deleted");

    Ok(rows.len())
}
