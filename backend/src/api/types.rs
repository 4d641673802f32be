//! REST API request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::budget::{TrimInstruction, DEFAULT_MAX_CELLS};
use crate::codec::RowShape;
use crate::config::MergeOptions;
use crate::error::{PipelineResult, SourceError};
use crate::models::{Record, Row};
use crate::pipeline::{PipelineInput, PipelineOutput, ReconcileStats};

fn default_max_cells() -> usize {
    DEFAULT_MAX_CELLS
}

/// Body of `POST /api/reconcile`.
///
/// Merge options sit at the top level, next to the data:
///
/// ```json
/// {
///   "oldRows": [["url", "visits"], ["a.com", 10]],
///   "newRecords": [{"url": "b.com", "visits": 12}],
///   "mode": "append",
///   "deduplicateByField": "url"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    #[serde(default)]
    pub new_records: Vec<Value>,
    /// Current sheet content, header first
    #[serde(default)]
    pub old_rows: Option<Vec<Row>>,
    #[serde(flatten)]
    pub merge: MergeOptions,
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
    #[serde(default)]
    pub row_shape: RowShape,
}

impl ReconcileRequest {
    /// Validate the request and turn it into a pipeline input.
    pub fn into_input(self) -> PipelineResult<PipelineInput> {
        let merge_config = self.merge.to_merge_config()?;
        let new_records = self
            .new_records
            .iter()
            .enumerate()
            .map(|(i, v)| Record::from_json(v).ok_or(SourceError::NotARecord(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PipelineInput::new(new_records, self.old_rows, merge_config)
            .with_max_cells(self.max_cells)
            .with_row_shape(self.row_shape))
    }
}

/// Response to `POST /api/reconcile`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub job_id: String,
    /// Always "ready" for a successful reconciliation
    pub status: String,
    pub rows_to_write: Vec<Row>,
    pub trim: TrimInstruction,
    pub stats: ReconcileStats,
}

impl From<PipelineOutput> for ReconcileResponse {
    fn from(output: PipelineOutput) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: "ready".to_string(),
            rows_to_write: output.rows_to_write,
            trim: output.trim,
            stats: output.stats,
        }
    }
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "rowsToWrite": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::reconcile;
    use crate::reconcile::Strategy;

    #[test]
    fn test_request_defaults() {
        let request: ReconcileRequest = serde_json::from_value(json!({
            "newRecords": [{"url": "a.com"}]
        }))
        .unwrap();
        assert_eq!(request.max_cells, DEFAULT_MAX_CELLS);
        assert!(request.old_rows.is_none());

        let input = request.into_input().unwrap();
        assert_eq!(input.merge_config.strategy, Strategy::Append);
        assert_eq!(input.new_records.len(), 1);
    }

    #[test]
    fn test_request_rejects_non_object_records() {
        let request: ReconcileRequest = serde_json::from_value(json!({
            "newRecords": [{"url": "a.com"}, "b.com"]
        }))
        .unwrap();
        assert!(matches!(
            request.into_input(),
            Err(PipelineError::Source(SourceError::NotARecord(1)))
        ));
    }

    #[test]
    fn test_response_shape() {
        let request: ReconcileRequest = serde_json::from_value(json!({
            "oldRows": [["url", "visits"], ["a.com", 10], ["b.com", 11]],
            "newRecords": [{"url": "c.com", "visits": 12}],
            "mode": "replace"
        }))
        .unwrap();
        let output = reconcile(&request.into_input().unwrap()).unwrap();
        let response = serde_json::to_value(ReconcileResponse::from(output)).unwrap();

        assert_eq!(response["status"], "ready");
        assert_eq!(response["rowsToWrite"], json!([["url", "visits"], ["c.com", 12]]));
        assert_eq!(response["trim"], json!({"targetRowCount": 2}));
        assert_eq!(response["stats"]["strategy"], "replace");
        assert_eq!(response["stats"]["rows"], 2);
        assert_eq!(response["stats"]["cells"], 4);
    }
}
