//! Transform program definition
//!
//! A program selects its input from the new and old record sets and runs an
//! ordered list of steps over it. Programs are plain data: they can only see
//! the two record sets handed to them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::operations::Operation;
use crate::models::Cell;

/// A complete transform program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformProgram {
    /// Version of the program format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Which records the steps start from
    #[serde(default)]
    pub input: InputSelection,

    /// Steps applied in order
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Starting record set of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSelection {
    /// Only the new batch
    #[default]
    New,
    /// Only the records already in the sheet
    Old,
    /// Sheet records followed by the new batch
    OldThenNew,
    /// New batch followed by the sheet records
    NewThenOld,
}

/// One program step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Keep records whose field satisfies the condition
    Filter { field: String, condition: Condition },

    /// Apply cell operations to a field (missing fields are left alone)
    Map {
        field: String,
        operations: Vec<Operation>,
    },

    /// Set a field to a constant on every record
    Set { field: String, value: Cell },

    /// Rename a field, keeping its position
    Rename { from: String, to: String },

    /// Remove fields
    Drop { fields: Vec<String> },

    /// Keep only the listed fields, in the listed order
    Keep { fields: Vec<String> },

    /// Drop duplicates by the listed fields
    Dedup {
        fields: Vec<String>,
        #[serde(default)]
        keep: KeepPolicy,
    },

    /// Stable sort by a field
    Sort {
        field: String,
        #[serde(default)]
        descending: bool,
    },

    /// Drop the first N records
    Skip { count: usize },

    /// Keep the first N records
    Take { count: usize },
}

/// Which duplicate survives a dedup step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    #[default]
    First,
    Last,
}

/// Filter condition on a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    NonEmpty,
    Empty,
    Equals { value: String },
    NotEquals { value: String },
    /// Regex match on the text form of the field
    Matches { pattern: String },
    /// Field value does not occur on any old record
    NotInOld,
}

impl TransformProgram {
    /// Create an empty program reading the new batch
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            input: InputSelection::default(),
            steps: Vec::new(),
        }
    }

    /// Parse a program from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Add a step to the chain
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Select the input record set
    pub fn with_input(mut self, input: InputSelection) -> Self {
        self.input = input;
        self
    }

    /// Check every step can run. Returns one message per problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Filter {
                    condition: Condition::Matches { pattern },
                    ..
                } => {
                    if let Err(e) = Regex::new(pattern) {
                        problems.push(format!("step {}: invalid pattern '{}': {}", i, pattern, e));
                    }
                }
                Step::Map { operations, .. } => {
                    for op in operations {
                        if let Err(e) = op.validate() {
                            problems.push(format!("step {}: {}", i, e));
                        }
                    }
                }
                Step::Dedup { fields, .. } | Step::Keep { fields } if fields.is_empty() => {
                    problems.push(format!("step {}: fields must not be empty", i));
                }
                Step::Rename { from, to } if from.is_empty() || to.is_empty() => {
                    problems.push(format!("step {}: rename needs both 'from' and 'to'", i));
                }
                _ => {}
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Count steps by type, for logging
    pub fn step_summary(&self) -> HashMap<&'static str, usize> {
        let mut summary = HashMap::new();
        for step in &self.steps {
            *summary.entry(step.name()).or_insert(0) += 1;
        }
        summary
    }
}

impl Default for TransformProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl Step {
    /// Short name of the step type
    pub fn name(&self) -> &'static str {
        match self {
            Step::Filter { .. } => "filter",
            Step::Map { .. } => "map",
            Step::Set { .. } => "set",
            Step::Rename { .. } => "rename",
            Step::Drop { .. } => "drop",
            Step::Keep { .. } => "keep",
            Step::Dedup { .. } => "dedup",
            Step::Sort { .. } => "sort",
            Step::Skip { .. } => "skip",
            Step::Take { .. } => "take",
        }
    }
}

/// Generate an example program for documentation
pub fn example_program() -> TransformProgram {
    TransformProgram {
        version: "1.0".to_string(),
        description: "Merge old and new rows, newest price wins, most expensive first".to_string(),
        input: InputSelection::OldThenNew,
        steps: vec![
            Step::Map {
                field: "url".to_string(),
                operations: vec![Operation::Trim, Operation::Lowercase],
            },
            Step::Filter {
                field: "url".to_string(),
                condition: Condition::NonEmpty,
            },
            Step::Map {
                field: "price".to_string(),
                operations: vec![Operation::ToNumber],
            },
            Step::Dedup {
                fields: vec!["url".to_string()],
                keep: KeepPolicy::Last,
            },
            Step::Sort {
                field: "price".to_string(),
                descending: true,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_serialization() {
        let program = example_program();
        let json = program.to_json().unwrap();
        let parsed = TransformProgram::from_json(&json).unwrap();
        assert_eq!(parsed.version, program.version);
        assert_eq!(parsed.steps.len(), program.steps.len());
        assert_eq!(parsed.input, InputSelection::OldThenNew);
    }

    #[test]
    fn test_defaults() {
        let parsed = TransformProgram::from_json("{}").unwrap();
        assert_eq!(parsed.input, InputSelection::New);
        assert!(parsed.steps.is_empty());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let program = TransformProgram::new()
            .with_step(Step::Filter {
                field: "a".into(),
                condition: Condition::Matches { pattern: "[".into() },
            })
            .with_step(Step::Dedup {
                fields: vec![],
                keep: KeepPolicy::First,
            });
        let problems = program.validate().unwrap_err();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].starts_with("step 0"));
        assert!(problems[1].starts_with("step 1"));
        assert!(example_program().validate().is_ok());
    }

    #[test]
    fn test_step_summary() {
        let summary = example_program().step_summary();
        assert_eq!(summary.get("map"), Some(&2));
        assert_eq!(summary.get("sort"), Some(&1));
    }
}
