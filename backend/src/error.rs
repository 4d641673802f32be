//! Error types for the sheetsync reconciliation pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - Invalid or contradictory merge configuration
//! - [`TransformCompileError`] - User transform program could not be compiled
//! - [`CodecError`] - Malformed row or record shapes
//! - [`BudgetError`] - Result exceeds the cell budget
//! - [`StoreError`] - A single remote store call failed
//! - [`RemoteCallError`] - A remote call failed after its retry budget
//! - [`SourceError`] - Dataset loading errors
//! - [`BackupError`] - Backup sink errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid or missing merge configuration. Always raised before any I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Dedup was requested but no rule is available.
    #[error("No uniqueness strategy configured")]
    NoUniquenessStrategy,

    /// Both a dedup field and dedup-by-equality were requested.
    #[error("Only one of deduplicateByField and deduplicateByEquality can be set")]
    ConflictingUniqueness,

    /// Unknown merge mode name.
    #[error("Unknown mode '{0}', expected 'append' or 'replace'")]
    UnknownMode(String),

    /// Custom transform strategy selected without a transform.
    #[error("Custom transform strategy requires a transform program")]
    MissingTransform,

    /// Any other invalid setting.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Transform Errors
// =============================================================================

/// The user supplied transform program is not usable.
#[derive(Debug, Error)]
pub enum TransformCompileError {
    /// Source text is not valid JSON.
    #[error("Evaluation of the transform program failed: {0}")]
    Parse(String),

    /// Source text evaluates to something that is not a program.
    #[error("Transform has to be a program object or empty (got {0})")]
    NotAProgram(&'static str),

    /// Program is structurally valid JSON but semantically wrong.
    #[error("Invalid transform program: {0}")]
    Invalid(String),
}

// =============================================================================
// Codec Errors
// =============================================================================

/// Errors converting between rows and records.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A data row is wider than the header.
    #[error("Row {row} has {cells} cells but the header only has {header}")]
    Shape {
        row: usize,
        cells: usize,
        header: usize,
    },

    /// Two header cells carry the same field name.
    #[error("Header column {column} repeats the field name '{name}'")]
    DuplicateHeader { column: usize, name: String },

    /// A record does not share the first record's key set.
    #[error("Record {record} does not match the header schema: {detail}")]
    Schema { record: usize, detail: String },
}

// =============================================================================
// Budget Errors
// =============================================================================

/// The merged sheet would not fit the cell budget.
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("You reached the max limit of {max} cells ({cells} requested). Try inserting less rows.")]
    Exceeded { cells: usize, max: usize },
}

// =============================================================================
// Remote Errors
// =============================================================================

/// Message the remote store uses to signal a transient outage.
pub const UNAVAILABLE_SIGNAL: &str = "The service is currently unavailable";

/// A single call to a tabular store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport level failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Store answered with an error status.
    #[error("Store returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Store answered but the payload is unusable.
    #[error("Invalid store response: {0}")]
    InvalidResponse(String),

    /// Local store IO error.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local store JSON error.
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the store signalled a transient outage worth retrying.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Status { status: 503, .. } => true,
            StoreError::Status { message, .. } | StoreError::Http(message) => {
                message.contains(UNAVAILABLE_SIGNAL)
            }
            _ => false,
        }
    }
}

/// A remote call failed after exhausting its retries, or failed permanently.
#[derive(Debug, Error)]
#[error("{action} failed after {attempts} attempt(s): {message}")]
pub struct RemoteCallError {
    /// Name of the pipeline action that issued the call.
    pub action: String,
    pub attempts: u32,
    pub message: String,
}

// =============================================================================
// Dataset Source Errors
// =============================================================================

/// Errors loading the new batch of records.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON dataset: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV dataset: {0}")]
    Csv(String),

    /// JSON dataset is not an array of objects.
    #[error("Dataset item {0} is not an object")]
    NotARecord(usize),

    #[error("Dataset is empty")]
    Empty,
}

// =============================================================================
// Backup Errors
// =============================================================================

/// Errors from the backup sink.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Backup IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformCompileError),

    #[error("Shape error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Budget(#[from] BudgetError),

    #[error("Fail in the crucial request: {0}")]
    Remote(#[from] RemoteCallError),

    #[error("Dataset error: {0}")]
    Source(#[from] SourceError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type CodecResult<T> = Result<T, CodecError>;

pub type StoreResult<T> = Result<T, StoreError>;

pub type SourceResult<T> = Result<T, SourceError>;

pub type BackupResult<T> = Result<T, BackupError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let codec_err = CodecError::Shape {
            row: 3,
            cells: 5,
            header: 4,
        };
        let pipeline_err: PipelineError = codec_err.into();
        assert!(pipeline_err.to_string().contains("Row 3"));

        let budget_err = BudgetError::Exceeded { cells: 12, max: 10 };
        let pipeline_err: PipelineError = budget_err.into();
        assert!(pipeline_err.to_string().contains("max limit of 10 cells"));
    }

    #[test]
    fn test_remote_call_error_carries_action() {
        let err = RemoteCallError {
            action: "Inserting new rows".into(),
            attempts: 6,
            message: "boom".into(),
        };
        let pipeline_err: PipelineError = err.into();
        let msg = pipeline_err.to_string();
        assert!(msg.contains("Inserting new rows"));
        assert!(msg.contains("6 attempt"));
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(StoreError::Status {
            status: 503,
            message: "oops".into()
        }
        .is_unavailable());
        assert!(StoreError::Http(format!("{}.", UNAVAILABLE_SIGNAL)).is_unavailable());
        assert!(!StoreError::Status {
            status: 400,
            message: "bad range".into()
        }
        .is_unavailable());
        assert!(!StoreError::InvalidResponse(UNAVAILABLE_SIGNAL.into()).is_unavailable());
    }
}
