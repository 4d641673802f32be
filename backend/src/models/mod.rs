//! Domain models for the sheetsync reconciliation pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Cell`] - A scalar grid value (empty, boolean, number or text)
//! - [`Row`] - An ordered sequence of cells
//! - [`Record`] - An ordered field name to cell mapping
//! - [`RecordSet`] - An ordered sequence of records

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

// =============================================================================
// Cell
// =============================================================================

/// A single scalar value of the grid.
///
/// Serialized as plain JSON: `null`, a boolean, a number or a string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// No value at all.
    #[default]
    Empty,
    Bool(bool),
    Number(Number),
    Text(String),
}

impl Cell {
    /// The empty-string cell used to materialize missing values.
    pub fn blank() -> Self {
        Cell::Text(String::new())
    }

    /// Render the cell as text, the way the grid displays it.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    /// True for `Empty` and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Convert back to a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Number(n) => Value::Number(n.clone()),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<Value> for Cell {
    /// Nested arrays and objects are kept as their compact JSON text.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(b),
            Value::Number(n) => Cell::Number(n),
            Value::String(s) => Cell::Text(s),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n.into())
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Number(n.into())
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Number(n.into())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Cell::Number).unwrap_or(Cell::Empty)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

// =============================================================================
// Row / Record
// =============================================================================

/// One grid row. Row 0 of a sheet is its header.
pub type Row = Vec<Cell>;

/// Ordered collection of records.
pub type RecordSet = Vec<Record>;

/// A keyed record with an explicit, ordered key enumeration.
///
/// Equality compares fields as a map and ignores key order; use
/// [`Record::keys`] when order matters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, Cell>);

impl Record {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Build a record from `(field, value)` pairs, keeping their order.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Cell>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect()
    }

    /// Build a record from a JSON object. Returns `None` for any other value.
    pub fn from_json(value: &Value) -> Option<Self> {
        value.as_object().map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), Cell::from(v.clone())))
                .collect()
        })
    }

    /// Convert to a JSON object (field order preserved when serialized).
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.0.get(field)
    }

    /// Insert or overwrite a field. New fields are appended at the end.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Cell>) {
        self.0.insert(field.into(), value.into());
    }

    /// Remove a field, keeping the order of the others.
    pub fn remove(&mut self, field: &str) -> Option<Cell> {
        self.0.shift_remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Cell> {
        self.0.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Cell)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same key set as `other`, ignoring order.
    pub fn same_keys(&self, other: &Record) -> bool {
        self.len() == other.len() && self.keys().all(|k| other.contains_key(k))
    }
}

impl<K: Into<String>> FromIterator<(K, Cell)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Cell)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Cell);
    type IntoIter = indexmap::map::IntoIter<String, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_from_json() {
        assert_eq!(Cell::from(json!(null)), Cell::Empty);
        assert_eq!(Cell::from(json!(3)), Cell::from(3));
        assert_eq!(Cell::from(json!("x")), Cell::from("x"));
        assert_eq!(Cell::from(json!([1, 2])), Cell::from("[1,2]"));
    }

    #[test]
    fn test_cell_as_text() {
        assert_eq!(Cell::Empty.as_text(), "");
        assert_eq!(Cell::from(42).as_text(), "42");
        assert_eq!(Cell::from(true).as_text(), "true");
        assert!(Cell::from("  ").is_blank());
        assert!(!Cell::from(0).is_blank());
    }

    #[test]
    fn test_record_keeps_insertion_order() {
        let record = Record::from_pairs([("b", 1), ("a", 2)]);
        let keys: Vec<&String> = record.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_record_json_roundtrip() {
        let value = json!({"z": 1, "a": "x", "m": null});
        let record = Record::from_json(&value).unwrap();
        let serialized = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.get("m"), Some(&Cell::Empty));
        assert!(Record::from_json(&json!([1])).is_none());
    }

    #[test]
    fn test_same_keys_ignores_order() {
        let a = Record::from_pairs([("a", 1), ("b", 2)]);
        let b = Record::from_pairs([("b", 3), ("a", 4)]);
        let c = Record::from_pairs([("a", 1)]);
        assert!(a.same_keys(&b));
        assert!(!a.same_keys(&c));
    }
}
