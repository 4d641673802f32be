//! # Sheetsync - record reconciliation and upload for spreadsheet stores
//!
//! Sheetsync merges a new batch of keyed records into the rows already held by
//! a grid store (a Google Sheets range, a local JSON file, or memory), then
//! writes the result back and trims whatever the new grid no longer covers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Sheet rows │────▶│    Codec    │────▶│  Reconcile  │────▶│ Budget+Trim │
//! │ (header+N)  │     │ rows↔records│     │ merge/dedup │     │ write, trim │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ▲
//!                                  new batch ────┘ (JSON / CSV / inline)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetsync::{reconcile, MergeConfig, PipelineInput, Strategy};
//!
//! let config = MergeConfig::new(Strategy::Append).with_unique_field("url");
//! let output = reconcile(&PipelineInput::new(new_records, Some(sheet_rows), config))?;
//! println!("{} rows to write", output.rows_to_write.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, rows and records
//! - [`codec`] - Row/record conversion
//! - [`schema`] - Key unions and normalization
//! - [`reconcile`] - Merge strategies and deduplication
//! - [`transform`] - User transform programs
//! - [`budget`] - Cell budget and trim requests
//! - [`retry`] - Backoff around remote calls
//! - [`store`] - Tabular stores (Sheets, file, memory)
//! - [`source`] - Dataset loading
//! - [`backup`] - Pre-write backups
//! - [`config`] - Run configuration
//! - [`pipeline`] - Reconcile core and full runs
//! - [`api`] - HTTP API server and logs

// Core modules
pub mod error;
pub mod models;

// Rows and records
pub mod codec;
pub mod schema;

// Merging
pub mod reconcile;
pub mod transform;

// Upload
pub mod budget;
pub mod retry;
pub mod store;

// Inputs and safety nets
pub mod backup;
pub mod config;
pub mod source;

// Orchestration
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BackupError, BudgetError, CodecError, ConfigError, PipelineError, RemoteCallError,
    ServerError, SourceError, StoreError, TransformCompileError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Record, RecordSet, Row};

// =============================================================================
// Re-exports - Codec & schema
// =============================================================================

pub use codec::{to_records, to_rows, RowShape};
pub use schema::{compare_keys, normalize, union_keys};

// =============================================================================
// Re-exports - Reconcile
// =============================================================================

pub use reconcile::{merge, MergeConfig, MergeReport, Merged, Strategy, UniqueBy};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    compile, example_program, operations_description, TransformFn, TransformInput,
    TransformProgram,
};

// =============================================================================
// Re-exports - Budget & retry
// =============================================================================

pub use budget::{check_budget, compute_trim, trim_requests, TrimInstruction, DEFAULT_MAX_CELLS};
pub use retry::RetryPolicy;

// =============================================================================
// Re-exports - Stores, sources, backups
// =============================================================================

pub use backup::{BackupSink, DirectoryBackup, StoredBackup};
pub use source::{DatasetSource, FileSource, InlineSource};
pub use store::{JsonFileStore, MemoryStore, RangeSpec, SheetsClient, TabularStore};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::{MergeOptions, RunConfig};
pub use pipeline::{
    reconcile, restore, run, PipelineInput, PipelineOutput, ReconcileStats, RunOptions,
    RunSummary,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, ReconcileRequest, ReconcileResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
