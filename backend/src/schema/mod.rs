//! Schema unification across heterogeneous record sets.
//!
//! Records read from the sheet and records coming from the dataset rarely share
//! the same fields. Before rows can be written, every record is widened to the
//! union of both schemas and its fields are put in a deterministic order.

use std::cmp::Ordering;

use crate::models::{Cell, Record, RecordSet};

/// Keys of `a[0]` followed by the keys of `b[0]` not already seen.
///
/// Only the first record of each set defines its schema; an empty set
/// contributes nothing.
pub fn union_keys(a: &[Record], b: &[Record]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for first in [a.first(), b.first()].into_iter().flatten() {
        for key in first.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

/// Extend `keys` with every field seen on any record of `records`, in
/// first-seen order.
pub fn extend_keys(keys: &mut Vec<String>, records: &[Record]) {
    for record in records {
        for key in record.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
}

/// Widen every record to `keys` and reorder its fields.
///
/// Missing keys and empty (`null`) values are materialized as `""`. Fields listed in `columns_order`
/// come first, in that order; the rest follow sorted with [`compare_keys`].
/// Fields a record carries outside `keys` are kept and sorted with the rest.
pub fn normalize(records: &[Record], keys: &[String], columns_order: &[String]) -> RecordSet {
    records
        .iter()
        .map(|record| normalize_record(record, keys, columns_order))
        .collect()
}

fn normalize_record(record: &Record, keys: &[String], columns_order: &[String]) -> Record {
    let mut widened: Record = record
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Cell::Empty => Cell::blank(),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect();
    for key in keys {
        if !widened.contains_key(key) {
            widened.insert(key.clone(), Cell::blank());
        }
    }

    let mut ordered = Record::new();
    for key in columns_order {
        if keys.contains(key) {
            if let Some(value) = widened.remove(key) {
                ordered.insert(key.clone(), value);
            }
        }
    }

    let mut rest: Vec<(String, Cell)> = widened.into_iter().collect();
    rest.sort_by(|(a, _), (b, _)| compare_keys(a, b));
    for (key, value) in rest {
        ordered.insert(key, value);
    }
    ordered
}

/// Locale-style ordering for field names.
///
/// Case-insensitive first, lowercase before uppercase on ties, then plain
/// byte order so the result is total.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    let folded = a.to_lowercase().cmp(&b.to_lowercase());
    if folded != Ordering::Equal {
        return folded;
    }
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            return match (ca.is_lowercase(), cb.is_lowercase()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => ca.cmp(&cb),
            };
        }
    }
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_of(record: &Record) -> Vec<&str> {
        record.keys().map(String::as_str).collect()
    }

    fn owned(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_union_keys_first_seen_order() {
        let a = vec![Record::from_pairs([("a", 1), ("b", 2), ("c", 4)])];
        let b = vec![Record::from_pairs([("d", 4), ("b", 2), ("c", 5)])];
        assert_eq!(union_keys(&a, &b), owned(&["a", "b", "c", "d"]));
    }

    #[test]
    fn test_union_keys_empty_sets() {
        let a = vec![Record::from_pairs([("x", 1)])];
        assert_eq!(union_keys(&a, &[]), owned(&["x"]));
        assert_eq!(union_keys(&[], &a), owned(&["x"]));
        assert!(union_keys(&[], &[]).is_empty());
    }

    #[test]
    fn test_union_keys_uses_first_record_only() {
        let a = vec![
            Record::from_pairs([("a", 1)]),
            Record::from_pairs([("a", 1), ("late", 2)]),
        ];
        assert_eq!(union_keys(&a, &[]), owned(&["a"]));
    }

    #[test]
    fn test_extend_keys_sees_later_records() {
        let records = vec![
            Record::from_pairs([("a", 1)]),
            Record::from_pairs([("b", 1), ("a", 2)]),
        ];
        let mut keys = owned(&["z"]);
        extend_keys(&mut keys, &records);
        assert_eq!(keys, owned(&["z", "a", "b"]));
    }

    #[test]
    fn test_normalize_fills_blanks_and_sorts() {
        let records = vec![Record::from_pairs([("d", 4), ("b", 2)])];
        let keys = owned(&["a", "b", "c", "d"]);
        let normalized = normalize(&records, &keys, &[]);

        assert_eq!(keys_of(&normalized[0]), vec!["a", "b", "c", "d"]);
        assert_eq!(normalized[0].get("a"), Some(&Cell::blank()));
        assert_eq!(normalized[0].get("c"), Some(&Cell::blank()));
        assert_eq!(normalized[0].get("d"), Some(&Cell::from(4)));
    }

    #[test]
    fn test_normalize_columns_order_first() {
        let records = vec![Record::from_pairs([("a", 1), ("b", 2), ("c", 3)])];
        let keys = owned(&["a", "b", "c"]);
        let order = owned(&["c", "missing", "a"]);
        let normalized = normalize(&records, &keys, &order);
        assert_eq!(keys_of(&normalized[0]), vec!["c", "a", "b"]);
        assert!(!normalized[0].contains_key("missing"));
    }

    #[test]
    fn test_normalize_never_drops_keys() {
        let records = vec![
            Record::from_pairs([("a", 1)]),
            Record::from_pairs([("a", 2), ("extra", 3)]),
        ];
        let keys = owned(&["a", "b"]);
        let normalized = normalize(&records, &keys, &[]);

        for (before, after) in records.iter().zip(&normalized) {
            assert!(before.keys().all(|k| after.contains_key(k)));
            assert!(keys.iter().all(|k| after.contains_key(k)));
            assert!(after.values().all(|v| *v != Cell::Empty));
        }
        assert_eq!(normalized[1].get("extra"), Some(&Cell::from(3)));
    }

    #[test]
    fn test_normalize_blanks_null_values() {
        let record = Record::from_json(&serde_json::json!({"a": "1", "b": null})).unwrap();
        assert_eq!(record.get("b"), Some(&Cell::Empty));

        let normalized = normalize(&[record], &owned(&["a", "b"]), &[]);
        assert_eq!(normalized[0].get("b"), Some(&Cell::blank()));
    }

    #[test]
    fn test_normalize_does_not_touch_input() {
        let records = vec![Record::from_pairs([("b", 1)])];
        let _ = normalize(&records, &owned(&["a", "b"]), &[]);
        assert_eq!(records[0].len(), 1);
    }

    #[test]
    fn test_compare_keys_locale_like() {
        let mut keys = vec!["b", "B", "a", "C", "_id", "A"];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(keys, vec!["_id", "a", "A", "b", "B", "C"]);
    }
}
