//! DSL Operations for cell transformation
//!
//! Operations a transform program can apply to a single cell value.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::Cell;

/// All available cell operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Pad string at start to reach target length
    PadStart {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Pad string at end to reach target length
    PadEnd {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Extract year (4 digits) from a date string
    ExtractYear,

    /// Ensure string starts with given prefix
    EnsurePrefix {
        value: String,
    },

    /// Ensure string ends with given suffix
    EnsureSuffix {
        value: String,
    },

    /// Map values using a lookup table
    Map {
        mapping: HashMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value to use when no mapping match found (null = keep the value)
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Convert to boolean
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Convert to number
    ToNumber,

    /// Take `length` characters starting at `start`
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    /// Remove all non-alphanumeric characters
    Alphanumeric,

    /// Remove all non-digit characters
    DigitsOnly,
}

fn default_pad_char() -> String {
    " ".to_string()
}

fn default_true_values() -> Vec<String> {
    vec![
        "true".to_string(),
        "1".to_string(),
        "yes".to_string(),
        "y".to_string(),
        "x".to_string(),
    ]
}

impl Operation {
    /// Check the operation can run, e.g. that its regex compiles.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Operation::Replace { pattern, .. } => Regex::new(pattern)
                .map(|_| ())
                .map_err(|e| format!("invalid pattern '{}': {}", pattern, e)),
            Operation::PadStart { char, .. } | Operation::PadEnd { char, .. } if char.is_empty() => {
                Err("pad char must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Apply this operation to a cell
    pub fn apply(&self, value: &Cell) -> Cell {
        match self {
            Operation::Trim => Self::map_text(value, |s| s.trim().to_string()),
            Operation::Uppercase => Self::map_text(value, |s| s.to_uppercase()),
            Operation::Lowercase => Self::map_text(value, |s| s.to_lowercase()),
            Operation::Replace { pattern, value: replacement } => {
                self.apply_replace(value, pattern, replacement)
            }
            Operation::PadStart { length, char } => Self::map_text(value, |s| pad(s, *length, char, true)),
            Operation::PadEnd { length, char } => Self::map_text(value, |s| pad(s, *length, char, false)),
            Operation::ExtractYear => self.apply_extract_year(value),
            Operation::EnsurePrefix { value: prefix } => Self::map_text(value, |s| {
                if s.starts_with(prefix.as_str()) {
                    s.to_string()
                } else {
                    format!("{}{}", prefix, s)
                }
            }),
            Operation::EnsureSuffix { value: suffix } => Self::map_text(value, |s| {
                if s.ends_with(suffix.as_str()) {
                    s.to_string()
                } else {
                    format!("{}{}", s, suffix)
                }
            }),
            Operation::Map { mapping, case_insensitive, default_unmapped } => {
                self.apply_map(value, mapping, *case_insensitive, default_unmapped.as_deref())
            }
            Operation::ToBoolean { true_values } => self.apply_to_boolean(value, true_values),
            Operation::ToNumber => self.apply_to_number(value),
            Operation::Substring { start, length } => Self::map_text(value, |s| {
                let chars: Vec<char> = s.chars().collect();
                let from = (*start).min(chars.len());
                let end = length.map(|l| from + l).unwrap_or(chars.len()).min(chars.len());
                chars[from..end].iter().collect()
            }),
            Operation::Alphanumeric => {
                Self::map_text(value, |s| s.chars().filter(|c| c.is_alphanumeric()).collect())
            }
            Operation::DigitsOnly => {
                Self::map_text(value, |s| s.chars().filter(|c| c.is_ascii_digit()).collect())
            }
        }
    }

    /// Apply a text function; `Empty` stays `Empty`.
    fn map_text(value: &Cell, f: impl FnOnce(&str) -> String) -> Cell {
        match value {
            Cell::Empty => Cell::Empty,
            other => Cell::Text(f(&other.as_text())),
        }
    }

    fn apply_replace(&self, value: &Cell, pattern: &str, replacement: &str) -> Cell {
        match Regex::new(pattern) {
            Ok(re) => Self::map_text(value, |s| re.replace_all(s, replacement).to_string()),
            Err(_) => value.clone(),
        }
    }

    fn apply_extract_year(&self, value: &Cell) -> Cell {
        let text = value.as_text();
        Regex::new(r"\d{4}")
            .ok()
            .and_then(|re| re.find(&text).map(|m| m.as_str().to_string()))
            .and_then(|year| year.parse::<i64>().ok())
            .map(Cell::from)
            .unwrap_or(Cell::Empty)
    }

    fn apply_map(
        &self,
        value: &Cell,
        mapping: &HashMap<String, String>,
        case_insensitive: bool,
        default_unmapped: Option<&str>,
    ) -> Cell {
        let text = value.as_text();
        let found = if case_insensitive {
            let key = text.to_lowercase();
            mapping.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v)
        } else {
            mapping.get(&text)
        };

        match (found, default_unmapped) {
            (Some(v), _) => Cell::Text(v.clone()),
            (None, Some(d)) => Cell::Text(d.to_string()),
            (None, None) => value.clone(),
        }
    }

    fn apply_to_boolean(&self, value: &Cell, true_values: &[String]) -> Cell {
        match value {
            Cell::Bool(b) => Cell::Bool(*b),
            Cell::Empty => Cell::Bool(false),
            other => {
                let lower = other.as_text().trim().to_lowercase();
                Cell::Bool(true_values.iter().any(|tv| tv.to_lowercase() == lower))
            }
        }
    }

    fn apply_to_number(&self, value: &Cell) -> Cell {
        match value {
            Cell::Number(_) => value.clone(),
            Cell::Bool(b) => Cell::from(i64::from(*b)),
            other => {
                let text = other.as_text();
                let trimmed = text.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    return Cell::from(n);
                }
                if let Ok(f) = trimmed.replace(',', ".").parse::<f64>() {
                    return Cell::from(f);
                }
                // Fall back to the digits, keeping a leading minus
                let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    return Cell::Empty;
                }
                let signed = if trimmed.starts_with('-') {
                    format!("-{}", digits)
                } else {
                    digits
                };
                signed.parse::<i64>().map(Cell::from).unwrap_or(Cell::Empty)
            }
        }
    }
}

fn pad(s: &str, length: usize, pad_char: &str, at_start: bool) -> String {
    let current = s.chars().count();
    if current >= length {
        return s.to_string();
    }
    let fill = pad_char.chars().next().unwrap_or(' ');
    let padding: String = std::iter::repeat(fill).take(length - current).collect();
    if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    r#"Available cell operations (used by "map" steps):

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| pad_start | Pad string at start | length: target length, char: pad character (default " ") |
| pad_end | Pad string at end | length: target length, char: pad character (default " ") |
| extract_year | Extract 4-digit year from date | - |
| ensure_prefix | Add prefix if not present | value: prefix string |
| ensure_suffix | Add suffix if not present | value: suffix string |
| map | Map values using lookup table | mapping: {source: target}, case_insensitive: bool, default_unmapped: string |
| to_boolean | Convert to boolean | true_values: list of truthy strings |
| to_number | Convert to number | - |
| substring | Extract substring | start: start index, length: optional length |
| alphanumeric | Keep only alphanumeric chars | - |
| digits_only | Keep only digits | - |

Available steps:

| Step | Description | Parameters |
|------|-------------|------------|
| filter | Keep records matching a condition | field, condition: non_empty, empty, equals{value}, not_equals{value}, matches{pattern}, not_in_old |
| map | Apply operations to a field | field, operations: [operation] |
| set | Set a field to a constant | field, value |
| rename | Rename a field | from, to |
| drop | Remove fields | fields |
| keep | Keep only the listed fields | fields |
| dedup | Drop duplicates by fields | fields, keep: first or last |
| sort | Stable sort by a field | field, descending: bool |
| skip | Drop the first N records | count |
| take | Keep the first N records | count |

Example program:
{
  "input": "old_then_new",
  "steps": [
    {"type": "map", "field": "url", "operations": [{"type": "trim"}, {"type": "lowercase"}]},
    {"type": "dedup", "fields": ["url"], "keep": "last"},
    {"type": "sort", "field": "price", "descending": true}
  ]
}"#.to_string()
}
