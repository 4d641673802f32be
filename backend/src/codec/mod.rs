//! Row <-> record conversion.
//!
//! A sheet is a list of rows whose first row is the header. Records are keyed
//! by header cells. No sheet-specific logic lives here.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{CodecError, CodecResult};
use crate::models::{Cell, Record, RecordSet, Row};

/// What to do with data rows wider than the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowShape {
    /// Reject with [`CodecError::Shape`].
    #[default]
    Strict,
    /// Drop the cells past the header width.
    Truncate,
}

/// Convert rows (header first) into records.
///
/// Short rows are padded with `""`: the store omits trailing empty cells.
pub fn to_records(rows: &[Row], shape: RowShape) -> CodecResult<RecordSet> {
    let Some((header, data)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let fields: Vec<String> = header.iter().map(Cell::as_text).collect();
    check_header(&fields)?;

    data.iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() > fields.len() && shape == RowShape::Strict {
                return Err(CodecError::Shape {
                    row: i + 1,
                    cells: row.len(),
                    header: fields.len(),
                });
            }

            Ok(fields
                .iter()
                .enumerate()
                .map(|(col, field)| {
                    let value = row.get(col).cloned().unwrap_or_else(Cell::blank);
                    (field.clone(), value)
                })
                .collect())
        })
        .collect()
}

/// Each header cell must name a distinct field, blanks included.
fn check_header(fields: &[String]) -> CodecResult<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for (column, name) in fields.iter().enumerate() {
        if !seen.insert(name.as_str()) {
            return Err(CodecError::DuplicateHeader {
                column,
                name: name.clone(),
            });
        }
    }
    Ok(())
}

/// Convert records into rows, header first.
///
/// The header is the first record's key order. Every record must carry the
/// same key set; unify schemas before calling this.
pub fn to_rows(records: &[Record]) -> CodecResult<Vec<Row>> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };

    let header: Vec<String> = first.keys().cloned().collect();
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(header.iter().map(|k| Cell::Text(k.clone())).collect());

    for (i, record) in records.iter().enumerate() {
        if !record.same_keys(first) {
            return Err(CodecError::Schema {
                record: i,
                detail: schema_diff(first, record),
            });
        }
        rows.push(
            header
                .iter()
                .map(|k| record.get(k).cloned().unwrap_or_default())
                .collect(),
        );
    }

    Ok(rows)
}

fn schema_diff(expected: &Record, actual: &Record) -> String {
    let missing: Vec<&str> = expected
        .keys()
        .filter(|k| !actual.contains_key(k))
        .map(String::as_str)
        .collect();
    let extra: Vec<&str> = actual
        .keys()
        .filter(|k| !expected.contains_key(k))
        .map(String::as_str)
        .collect();
    format!("missing [{}], unexpected [{}]", missing.join(", "), extra.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<Row> {
        vec![
            vec!["a".into(), "b".into(), "c".into()],
            vec![2.into(), 2.into(), 4.into()],
            vec![3.into(), 2.into(), 5.into()],
            vec![4.into(), 2.into(), 5.into()],
        ]
    }

    fn sample_records() -> RecordSet {
        vec![
            Record::from_pairs([("a", 2), ("b", 2), ("c", 4)]),
            Record::from_pairs([("a", 3), ("b", 2), ("c", 5)]),
            Record::from_pairs([("a", 4), ("b", 2), ("c", 5)]),
        ]
    }

    #[test]
    fn test_to_records() {
        let records = to_records(&sample_rows(), RowShape::Strict).unwrap();
        assert_eq!(records, sample_records());
    }

    #[test]
    fn test_to_rows() {
        let rows = to_rows(&sample_records()).unwrap();
        assert_eq!(rows, sample_rows());
    }

    #[test]
    fn test_roundtrip_keeps_key_order() {
        let records = vec![
            Record::from_pairs([("z", "1"), ("a", "2")]),
            Record::from_pairs([("z", "3"), ("a", "4")]),
        ];
        let back = to_records(&to_rows(&records).unwrap(), RowShape::Strict).unwrap();
        assert_eq!(back, records);
        let keys: Vec<&String> = back[1].keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(to_records(&[], RowShape::Strict).unwrap().is_empty());
        assert!(to_rows(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_header_only_sheet_has_no_records() {
        let rows = vec![vec![Cell::from("a"), Cell::from("b")]];
        assert!(to_records(&rows, RowShape::Strict).unwrap().is_empty());
    }

    #[test]
    fn test_short_rows_are_padded() {
        let rows = vec![vec!["a".into(), "b".into(), "c".into()], vec![1.into()]];
        let records = to_records(&rows, RowShape::Strict).unwrap();
        assert_eq!(records[0].get("b"), Some(&Cell::blank()));
        assert_eq!(records[0].get("c"), Some(&Cell::blank()));
    }

    #[test]
    fn test_wide_row_rejected_when_strict() {
        let rows = vec![
            vec!["a".into(), "b".into()],
            vec![1.into(), 2.into()],
            vec![1.into(), 2.into(), 3.into()],
        ];
        let err = to_records(&rows, RowShape::Strict).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Shape {
                row: 2,
                cells: 3,
                header: 2
            }
        ));
    }

    #[test]
    fn test_wide_row_truncated_when_lenient() {
        let rows = vec![
            vec!["a".into(), "b".into()],
            vec![1.into(), 2.into(), 3.into()],
        ];
        let records = to_records(&rows, RowShape::Truncate).unwrap();
        assert_eq!(records, vec![Record::from_pairs([("a", 1), ("b", 2)])]);
    }

    #[test]
    fn test_numeric_header_becomes_text_field() {
        let rows = vec![vec![Cell::from(2024)], vec![Cell::from("x")]];
        let records = to_records(&rows, RowShape::Strict).unwrap();
        assert_eq!(records[0].get("2024"), Some(&Cell::from("x")));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let rows = vec![
            vec!["id".into(), "note".into(), "id".into()],
            vec!["1".into(), "keep me".into(), "X-1".into()],
        ];
        let err = to_records(&rows, RowShape::Truncate).unwrap_err();
        assert!(matches!(
            err,
            CodecError::DuplicateHeader { column: 2, ref name } if name == "id"
        ));
    }

    #[test]
    fn test_blank_headers_collide() {
        let rows = vec![vec!["a".into(), "".into(), Cell::Empty], vec![1.into()]];
        assert!(matches!(
            to_records(&rows, RowShape::Strict),
            Err(CodecError::DuplicateHeader { column: 2, .. })
        ));
    }

    #[test]
    fn test_to_rows_rejects_mixed_schema() {
        let records = vec![
            Record::from_pairs([("a", 1), ("b", 2)]),
            Record::from_pairs([("a", 1), ("c", 2)]),
        ];
        let err = to_rows(&records).unwrap_err();
        match err {
            CodecError::Schema { record, detail } => {
                assert_eq!(record, 1);
                assert!(detail.contains("missing [b]"));
                assert!(detail.contains("unexpected [c]"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
