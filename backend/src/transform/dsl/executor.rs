//! DSL Executor
//!
//! Runs a transform program over the new and old record sets.

use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

use super::program::{Condition, InputSelection, KeepPolicy, Step, TransformProgram};
use crate::models::{Cell, Record, RecordSet};
use crate::reconcile::uniqueness::{dedup_keep_first, dedup_keep_last, UniqueBy};

/// Result of running a program
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Records produced by the last step
    pub records: RecordSet,
    /// Record count after each step, in step order
    pub counts: Vec<(usize, usize)>,
}

impl ExecutionResult {
    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Transformed into {} records over {} steps",
            self.records.len(),
            self.counts.len()
        )
    }
}

/// Execute a program on the two record sets
///
/// # Arguments
/// * `program` - A validated program
/// * `new_records` - Records of the incoming batch
/// * `old_records` - Records currently in the sheet
pub fn execute(program: &TransformProgram, new_records: &[Record], old_records: &[Record]) -> ExecutionResult {
    let mut records: RecordSet = match program.input {
        InputSelection::New => new_records.to_vec(),
        InputSelection::Old => old_records.to_vec(),
        InputSelection::OldThenNew => old_records.iter().chain(new_records).cloned().collect(),
        InputSelection::NewThenOld => new_records.iter().chain(old_records).cloned().collect(),
    };

    let mut result = ExecutionResult::default();
    for (i, step) in program.steps.iter().enumerate() {
        records = apply_step(step, records, old_records);
        result.counts.push((i, records.len()));
    }
    result.records = records;
    result
}

fn apply_step(step: &Step, records: RecordSet, old_records: &[Record]) -> RecordSet {
    match step {
        Step::Filter { field, condition } => filter(records, field, condition, old_records),

        Step::Map { field, operations } => records
            .into_iter()
            .map(|mut record| {
                if let Some(current) = record.get(field) {
                    let value = operations.iter().fold(current.clone(), |v, op| op.apply(&v));
                    record.insert(field.clone(), value);
                }
                record
            })
            .collect(),

        Step::Set { field, value } => records
            .into_iter()
            .map(|mut record| {
                record.insert(field.clone(), value.clone());
                record
            })
            .collect(),

        Step::Rename { from, to } => records.into_iter().map(|r| rename(r, from, to)).collect(),

        Step::Drop { fields } => records
            .into_iter()
            .map(|mut record| {
                for field in fields {
                    record.remove(field);
                }
                record
            })
            .collect(),

        Step::Keep { fields } => records
            .into_iter()
            .map(|record| {
                fields
                    .iter()
                    .filter_map(|f| record.get(f).map(|v| (f.clone(), v.clone())))
                    .collect()
            })
            .collect(),

        Step::Dedup { fields, keep } => {
            let rule = UniqueBy::Fields(fields.clone());
            let (kept, _) = match keep {
                KeepPolicy::First => dedup_keep_first(records, &rule),
                KeepPolicy::Last => dedup_keep_last(records, &rule),
            };
            kept
        }

        Step::Sort { field, descending } => {
            let mut sorted = records;
            sorted.sort_by(|a, b| {
                let ord = compare_cells(a.get(field), b.get(field));
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
            sorted
        }

        Step::Skip { count } => records.into_iter().skip(*count).collect(),

        Step::Take { count } => records.into_iter().take(*count).collect(),
    }
}

fn filter(records: RecordSet, field: &str, condition: &Condition, old_records: &[Record]) -> RecordSet {
    let text_of = |record: &Record| record.get(field).map(Cell::as_text).unwrap_or_default();

    match condition {
        Condition::NonEmpty => records
            .into_iter()
            .filter(|r| !r.get(field).map_or(true, Cell::is_blank))
            .collect(),
        Condition::Empty => records
            .into_iter()
            .filter(|r| r.get(field).map_or(true, Cell::is_blank))
            .collect(),
        Condition::Equals { value } => records.into_iter().filter(|r| text_of(r) == *value).collect(),
        Condition::NotEquals { value } => records.into_iter().filter(|r| text_of(r) != *value).collect(),
        Condition::Matches { pattern } => match Regex::new(pattern) {
            Ok(re) => records.into_iter().filter(|r| re.is_match(&text_of(r))).collect(),
            // Validated at compile time; an invalid pattern matches nothing
            Err(_) => Vec::new(),
        },
        Condition::NotInOld => {
            let known: HashSet<String> = old_records.iter().map(|r| text_of(r)).collect();
            records.into_iter().filter(|r| !known.contains(&text_of(r))).collect()
        }
    }
}

fn rename(record: Record, from: &str, to: &str) -> Record {
    if !record.contains_key(from) {
        return record;
    }
    record
        .into_iter()
        .filter(|(k, _)| k != to || from == to)
        .map(|(k, v)| if k == from { (to.to_string(), v) } else { (k, v) })
        .collect()
}

/// Sort key of a cell: missing first, then numbers, then text.
enum SortKey {
    Missing,
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(cell: Option<&Cell>) -> Self {
        let Some(cell) = cell else {
            return SortKey::Missing;
        };
        let number = match cell {
            Cell::Number(n) => n.as_f64(),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        // "NaN" and "inf" parse as floats but sort as text
        match number.filter(|n| n.is_finite()) {
            Some(n) => SortKey::Number(n),
            None => SortKey::Text(cell.as_text()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Number(_) => 1,
            SortKey::Text(_) => 2,
        }
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Total order over cells: missing, then numbers numerically, then text.
fn compare_cells(a: Option<&Cell>, b: Option<&Cell>) -> Ordering {
    SortKey::of(a).total_cmp(&SortKey::of(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::operations::Operation;
    use crate::transform::dsl::program::example_program;

    fn old() -> RecordSet {
        vec![
            Record::from_pairs([("url", "a.com"), ("price", "10")]),
            Record::from_pairs([("url", "b.com"), ("price", "20")]),
        ]
    }

    fn new() -> RecordSet {
        vec![
            Record::from_pairs([("url", " A.com "), ("price", "15")]),
            Record::from_pairs([("url", "c.com"), ("price", "5")]),
            Record::from_pairs([("url", ""), ("price", "99")]),
        ]
    }

    #[test]
    fn test_execute_example_program() {
        let result = execute(&example_program(), &new(), &old());
        let urls: Vec<String> = result.records.iter().map(|r| r.get("url").unwrap().as_text()).collect();
        assert_eq!(urls, vec!["b.com", "a.com", "c.com"]);
        assert_eq!(result.records[1].get("price"), Some(&Cell::from(15)));
        assert_eq!(result.counts.len(), 5);
    }

    #[test]
    fn test_input_selection() {
        let program = TransformProgram::new().with_input(InputSelection::NewThenOld);
        let result = execute(&program, &new(), &old());
        assert_eq!(result.records.len(), 5);
        assert_eq!(result.records[0].get("price"), Some(&Cell::from("15")));

        let program = TransformProgram::new().with_input(InputSelection::Old);
        assert_eq!(execute(&program, &new(), &old()).records, old());
    }

    #[test]
    fn test_not_in_old_filter() {
        let program = TransformProgram::new().with_step(Step::Filter {
            field: "url".into(),
            condition: Condition::NotInOld,
        });
        let batch = vec![
            Record::from_pairs([("url", "a.com")]),
            Record::from_pairs([("url", "z.com")]),
        ];
        let result = execute(&program, &batch, &old());
        assert_eq!(result.records, vec![Record::from_pairs([("url", "z.com")])]);
    }

    #[test]
    fn test_rename_keeps_position() {
        let program = TransformProgram::new().with_step(Step::Rename {
            from: "url".into(),
            to: "link".into(),
        });
        let result = execute(&program, &old(), &[]);
        let keys: Vec<&String> = result.records[0].keys().collect();
        assert_eq!(keys, vec!["link", "price"]);
    }

    #[test]
    fn test_keep_drop_set_take_skip() {
        let program = TransformProgram::new()
            .with_step(Step::Set { field: "source".into(), value: Cell::from("feed") })
            .with_step(Step::Drop { fields: vec!["price".into()] })
            .with_step(Step::Keep { fields: vec!["source".into(), "url".into()] })
            .with_step(Step::Skip { count: 1 })
            .with_step(Step::Take { count: 1 });
        let result = execute(&program, &new(), &[]);
        assert_eq!(result.records, vec![Record::from_pairs([("source", "feed"), ("url", "c.com")])]);
        let keys: Vec<&String> = result.records[0].keys().collect();
        assert_eq!(keys, vec!["source", "url"]);
    }

    #[test]
    fn test_map_skips_missing_fields() {
        let program = TransformProgram::new().with_step(Step::Map {
            field: "missing".into(),
            operations: vec![Operation::Uppercase],
        });
        let result = execute(&program, &old(), &[]);
        assert_eq!(result.records, old());
    }

    #[test]
    fn test_sort_numeric_and_missing() {
        let records = vec![
            Record::from_pairs([("n", "10")]),
            Record::from_pairs([("other", "x")]),
            Record::from_pairs([("n", "9")]),
        ];
        let program = TransformProgram::new().with_step(Step::Sort { field: "n".into(), descending: false });
        let result = execute(&program, &records, &[]);
        assert!(result.records[0].get("n").is_none());
        assert_eq!(result.records[1].get("n"), Some(&Cell::from("9")));
    }

    #[test]
    fn test_sort_mixed_column_is_total() {
        let values = ["1a", "10", "NaN", "9", "b", "-2.5"];
        let records: RecordSet = values.iter().map(|v| Record::from_pairs([("n", *v)])).collect();

        for (x, y) in [("9", "10"), ("10", "1a"), ("9", "1a"), ("-2.5", "NaN")] {
            let (x, y) = (Cell::from(x), Cell::from(y));
            assert_eq!(compare_cells(Some(&x), Some(&y)), Ordering::Less);
            assert_eq!(compare_cells(Some(&y), Some(&x)), Ordering::Greater);
        }

        let program = TransformProgram::new().with_step(Step::Sort { field: "n".into(), descending: false });
        let sorted: Vec<String> = execute(&program, &records, &[])
            .records
            .iter()
            .map(|r| r.get("n").map(Cell::as_text).unwrap_or_default())
            .collect();
        assert_eq!(sorted, vec!["-2.5", "9", "10", "1a", "NaN", "b"]);
    }
}
