//! Cell budget enforcement and sheet trimming.
//!
//! A sheet has a hard ceiling on its total number of cells. Results above the
//! ceiling are rejected before anything is written. When the new grid is
//! smaller than the current one, the unused rows and columns are deleted by a
//! follow-up batch request.

use serde::{Deserialize, Serialize};

use crate::error::BudgetError;
use crate::models::Row;

/// Default cell ceiling of a sheet.
pub const DEFAULT_MAX_CELLS: usize = 2_000_000;

/// `rows × width of the first row`.
///
/// Ragged grids are measured by their first row only. Grids produced by
/// [`crate::codec::to_rows`] are always rectangular.
pub fn count_cells(rows: &[Row]) -> usize {
    rows.first().map_or(0, |first| first.len() * rows.len())
}

/// Widest row of the grid.
pub fn max_width(rows: &[Row]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}

/// Reject grids above `max_cells`. Returns the cell count otherwise.
pub fn check_budget(rows: &[Row], max_cells: usize) -> Result<usize, BudgetError> {
    let cells = count_cells(rows);
    if cells > max_cells {
        return Err(BudgetError::Exceeded { cells, max: max_cells });
    }
    Ok(cells)
}

/// Target dimensions after writing. `None` leaves a dimension as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimInstruction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_row_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_column_count: Option<usize>,
}

impl TrimInstruction {
    /// Nothing to delete.
    pub fn is_empty(&self) -> bool {
        self.target_row_count.is_none() && self.target_column_count.is_none()
    }
}

/// Decide which rows and columns become unused once `new_rows` replace `existing`.
pub fn compute_trim(existing: Option<&[Row]>, new_rows: &[Row]) -> TrimInstruction {
    let Some(existing) = existing else {
        return TrimInstruction::default();
    };

    let new_width = max_width(new_rows);
    TrimInstruction {
        target_row_count: (existing.len() > new_rows.len()).then_some(new_rows.len()),
        target_column_count: (max_width(existing) > new_width).then_some(new_width),
    }
}

// =============================================================================
// Batch update payload
// =============================================================================

/// Body of a spreadsheet `batchUpdate` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub requests: Vec<BatchRequest>,
}

impl BatchUpdate {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchRequest {
    DeleteDimension { range: DimensionRange },
}

/// Open-ended, 0-based range of rows or columns starting at `start_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: i64,
    pub dimension: Dimension,
    pub start_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    Rows,
    Columns,
}

/// Build the delete requests for `trim`: rows first, then columns.
pub fn trim_requests(trim: &TrimInstruction, sheet_id: i64) -> BatchUpdate {
    let targets = [
        (Dimension::Rows, trim.target_row_count),
        (Dimension::Columns, trim.target_column_count),
    ];

    BatchUpdate {
        requests: targets
            .into_iter()
            .filter_map(|(dimension, target)| {
                target.map(|start_index| BatchRequest::DeleteDimension {
                    range: DimensionRange {
                        sheet_id,
                        dimension,
                        start_index,
                    },
                })
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use serde_json::json;

    fn grid(rows: usize, cols: usize) -> Vec<Row> {
        (0..rows)
            .map(|r| (0..cols).map(|c| Cell::from(r * cols + c)).collect())
            .collect()
    }

    #[test]
    fn test_count_cells_uses_first_row() {
        assert_eq!(count_cells(&[]), 0);
        assert_eq!(count_cells(&grid(4, 3)), 12);

        let ragged = vec![vec![Cell::from(1)], vec![Cell::from(1), Cell::from(2), Cell::from(3)]];
        assert_eq!(count_cells(&ragged), 2);
        assert_eq!(max_width(&ragged), 3);
    }

    #[test]
    fn test_count_cells_is_monotonic() {
        for rows in 1..6 {
            for cols in 1..6 {
                let base = count_cells(&grid(rows, cols));
                assert!(count_cells(&grid(rows + 1, cols)) >= base);
                assert!(count_cells(&grid(rows, cols + 1)) >= base);
            }
        }
    }

    #[test]
    fn test_budget_exceeded() {
        let err = check_budget(&grid(4, 3), 10).unwrap_err();
        assert!(matches!(err, BudgetError::Exceeded { cells: 12, max: 10 }));
        assert_eq!(check_budget(&grid(4, 3), 12).unwrap(), 12);
    }

    #[test]
    fn test_trim_when_new_is_smaller() {
        let existing = grid(2, 2);
        let new_rows = grid(1, 2);
        let trim = compute_trim(Some(&existing), &new_rows);
        assert_eq!(trim.target_row_count, Some(1));
        assert_eq!(trim.target_column_count, None);

        let trim = compute_trim(Some(&grid(3, 5)), &grid(3, 2));
        assert_eq!(trim.target_row_count, None);
        assert_eq!(trim.target_column_count, Some(2));

        let trim = compute_trim(Some(&grid(6, 6)), &grid(2, 3));
        assert_eq!(
            trim,
            TrimInstruction {
                target_row_count: Some(2),
                target_column_count: Some(3)
            }
        );
    }

    #[test]
    fn test_no_trim_when_new_is_not_smaller() {
        assert!(compute_trim(None, &grid(1, 1)).is_empty());
        for (rows, cols) in [(2, 2), (3, 2), (2, 3), (5, 5)] {
            assert!(compute_trim(Some(&grid(2, 2)), &grid(rows, cols)).is_empty());
        }
    }

    #[test]
    fn test_trim_requests_payload() {
        let trim = TrimInstruction {
            target_row_count: Some(4),
            target_column_count: Some(2),
        };
        let payload = serde_json::to_value(trim_requests(&trim, 7)).unwrap();
        assert_eq!(
            payload,
            json!({
                "requests": [
                    {"deleteDimension": {"range": {"sheetId": 7, "dimension": "ROWS", "startIndex": 4}}},
                    {"deleteDimension": {"range": {"sheetId": 7, "dimension": "COLUMNS", "startIndex": 2}}}
                ]
            })
        );
        assert!(trim_requests(&TrimInstruction::default(), 7).is_empty());
    }

    #[test]
    fn test_trim_instruction_serialization() {
        let trim = TrimInstruction {
            target_row_count: Some(1),
            target_column_count: None,
        };
        assert_eq!(serde_json::to_value(trim).unwrap(), json!({"targetRowCount": 1}));
    }
}
