//! Dedup keys for records.
//!
//! A key is derived from a named field, from a composite of several fields, or
//! from a hash of the record content. Cells are compared by their text form so
//! `1` read back from the sheet as `"1"` still collides with a numeric `1`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{Record, RecordSet};

/// How to tell two records apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UniqueBy {
    /// Value of a single field.
    Field(String),
    /// Values of several fields, in the given order.
    Fields(Vec<String>),
    /// Hash over all values in the record's current field order.
    Equality,
}

impl UniqueBy {
    /// Build the rule from the two user-facing options.
    ///
    /// Setting both is a configuration error; setting neither yields `None`.
    pub fn from_options(field: Option<&str>, equality: bool) -> ConfigResult<Option<Self>> {
        match (field, equality) {
            (Some(_), true) => Err(ConfigError::ConflictingUniqueness),
            (Some(f), false) if f.trim().is_empty() => {
                Err(ConfigError::Invalid("deduplicateByField is empty".into()))
            }
            (Some(f), false) => Ok(Some(UniqueBy::Field(f.to_string()))),
            (None, true) => Ok(Some(UniqueBy::Equality)),
            (None, false) => Ok(None),
        }
    }
}

/// Derive the dedup key of `record`.
///
/// Missing fields count as `""`. Fails when no rule is configured.
pub fn key_of(record: &Record, rule: Option<&UniqueBy>) -> ConfigResult<String> {
    match rule {
        Some(UniqueBy::Field(field)) => Ok(field_text(record, field)),
        Some(UniqueBy::Fields(fields)) => Ok(hash_values(fields.iter().map(|f| field_text(record, f)))),
        Some(UniqueBy::Equality) => Ok(content_hash(record)),
        None => Err(ConfigError::NoUniquenessStrategy),
    }
}

/// SHA-256 over the record's values in current key order. Key names are ignored.
pub fn content_hash(record: &Record) -> String {
    hash_values(record.values().map(|v| v.as_text()))
}

fn field_text(record: &Record, field: &str) -> String {
    record.get(field).map(|v| v.as_text()).unwrap_or_default()
}

fn hash_values(values: impl Iterator<Item = String>) -> String {
    let mut hasher = Sha256::new();
    for value in values {
        // Length prefix keeps ["ab", "c"] apart from ["a", "bc"].
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Keep the first record seen for each key. Returns the survivors and the
/// number of records dropped.
pub fn dedup_keep_first(records: RecordSet, rule: &UniqueBy) -> (RecordSet, usize) {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);
    let kept: RecordSet = records
        .into_iter()
        .filter(|record| seen.insert(key_of(record, Some(rule)).unwrap_or_default()))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

/// Keep the last record seen for each key, at the position of that last
/// occurrence.
pub fn dedup_keep_last(records: RecordSet, rule: &UniqueBy) -> (RecordSet, usize) {
    let mut reversed = records;
    reversed.reverse();
    let (mut kept, dropped) = dedup_keep_first(reversed, rule);
    kept.reverse();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    #[test]
    fn test_key_of_field_coerces_to_text() {
        let numeric = Record::from_pairs([("id", 7)]);
        let text = Record::from_pairs([("id", "7")]);
        let rule = UniqueBy::Field("id".into());
        assert_eq!(key_of(&numeric, Some(&rule)).unwrap(), "7");
        assert_eq!(key_of(&numeric, Some(&rule)).unwrap(), key_of(&text, Some(&rule)).unwrap());
    }

    #[test]
    fn test_key_of_missing_field_is_blank() {
        let record = Record::from_pairs([("a", 1)]);
        let rule = UniqueBy::Field("b".into());
        assert_eq!(key_of(&record, Some(&rule)).unwrap(), "");
    }

    #[test]
    fn test_key_of_without_rule_fails() {
        let record = Record::from_pairs([("a", 1)]);
        assert!(matches!(
            key_of(&record, None),
            Err(ConfigError::NoUniquenessStrategy)
        ));
    }

    #[test]
    fn test_content_hash_ignores_key_names() {
        let a = Record::from_pairs([("x", 1), ("y", 2)]);
        let b = Record::from_pairs([("p", 1), ("q", 2)]);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_is_order_sensitive() {
        let a = Record::from_pairs([("x", 1), ("y", 2)]);
        let b = Record::from_pairs([("y", 2), ("x", 1)]);
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_is_boundary_safe() {
        let a = Record::from_pairs([("x", "ab"), ("y", "c")]);
        let b = Record::from_pairs([("x", "a"), ("y", "bc")]);
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_treats_empty_as_blank() {
        let a = Record::from_pairs([("x", Cell::Empty)]);
        let b = Record::from_pairs([("x", Cell::blank())]);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_from_options() {
        assert_eq!(UniqueBy::from_options(None, false).unwrap(), None);
        assert_eq!(
            UniqueBy::from_options(Some("url"), false).unwrap(),
            Some(UniqueBy::Field("url".into()))
        );
        assert_eq!(UniqueBy::from_options(None, true).unwrap(), Some(UniqueBy::Equality));
        assert!(matches!(
            UniqueBy::from_options(Some("url"), true),
            Err(ConfigError::ConflictingUniqueness)
        ));
        assert!(UniqueBy::from_options(Some(" "), false).is_err());
    }

    #[test]
    fn test_dedup_keep_first_and_last() {
        let records = vec![
            Record::from_pairs([("k", "a"), ("v", "1")]),
            Record::from_pairs([("k", "b"), ("v", "2")]),
            Record::from_pairs([("k", "a"), ("v", "3")]),
        ];
        let rule = UniqueBy::Field("k".into());

        let (first, dropped) = dedup_keep_first(records.clone(), &rule);
        assert_eq!(dropped, 1);
        assert_eq!(first[0].get("v"), Some(&Cell::from("1")));

        let (last, dropped) = dedup_keep_last(records, &rule);
        assert_eq!(dropped, 1);
        assert_eq!(last[0].get("k"), Some(&Cell::from("b")));
        assert_eq!(last[1].get("v"), Some(&Cell::from("3")));
    }

    #[test]
    fn test_composite_key() {
        let rule = UniqueBy::Fields(vec!["a".into(), "b".into()]);
        let x = Record::from_pairs([("a", "1"), ("b", "2"), ("c", "x")]);
        let y = Record::from_pairs([("b", "2"), ("a", "1"), ("c", "y")]);
        let z = Record::from_pairs([("a", "1"), ("b", "3")]);
        assert_eq!(key_of(&x, Some(&rule)).unwrap(), key_of(&y, Some(&rule)).unwrap());
        assert_ne!(key_of(&x, Some(&rule)).unwrap(), key_of(&z, Some(&rule)).unwrap());
    }
}
