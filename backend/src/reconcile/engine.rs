//! Merge strategies.
//!
//! The engine combines the records already in the sheet with the new batch and
//! always finishes by widening the result to a uniform schema, so the codec can
//! turn it into rows.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::uniqueness::{dedup_keep_first, UniqueBy};
use crate::api::logs::log_warning;
use crate::error::{ConfigError, ConfigResult};
use crate::models::{Record, RecordSet};
use crate::schema::{extend_keys, normalize, union_keys};
use crate::transform::{TransformFn, TransformInput};

/// How old and new records are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Old records followed by new ones, optionally deduplicated.
    #[default]
    Append,
    /// New records only.
    Replace,
    /// A user transform decides the whole result.
    CustomTransform,
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(Strategy::Append),
            "replace" => Ok(Strategy::Replace),
            "custom" | "custom_transform" | "transform" => Ok(Strategy::CustomTransform),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Merge settings for one run.
#[derive(Debug, Clone, Default)]
pub struct MergeConfig {
    pub strategy: Strategy,
    pub unique_by_field: Option<String>,
    pub unique_by_equality: bool,
    pub transform: Option<TransformFn>,
    /// Fields written first, in this order.
    pub columns_order: Vec<String>,
}

impl MergeConfig {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_unique_field(mut self, field: impl Into<String>) -> Self {
        self.unique_by_field = Some(field.into());
        self
    }

    pub fn with_unique_equality(mut self) -> Self {
        self.unique_by_equality = true;
        self
    }

    pub fn with_transform(mut self, transform: TransformFn) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_columns_order<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns_order = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Strategy actually applied: a transform always takes over.
    pub fn effective_strategy(&self) -> Strategy {
        if self.transform.is_some() {
            Strategy::CustomTransform
        } else {
            self.strategy
        }
    }

    /// Check the settings and derive the dedup rule.
    pub fn validate(&self) -> ConfigResult<Option<UniqueBy>> {
        let rule = UniqueBy::from_options(self.unique_by_field.as_deref(), self.unique_by_equality)?;
        if self.strategy == Strategy::CustomTransform && self.transform.is_none() {
            return Err(ConfigError::MissingTransform);
        }
        Ok(rule)
    }
}

/// Counts describing one merge, for logging and API stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub strategy: Strategy,
    pub old_records: usize,
    pub new_records: usize,
    pub result_records: usize,
    pub duplicates_dropped: usize,
}

/// Merge output: records with a uniform schema plus counts.
#[derive(Debug, Clone)]
pub struct Merged {
    pub records: RecordSet,
    pub report: MergeReport,
}

/// Combine `old` and `new` according to `config`.
pub fn merge(old: &[Record], new: &[Record], config: &MergeConfig) -> ConfigResult<Merged> {
    let rule = config.validate()?;
    let strategy = config.effective_strategy();

    let mut dropped = 0;
    let result = match strategy {
        Strategy::Append => {
            // Both sides share one schema before hashing, so absent and
            // empty values collide.
            let keys = all_keys(old, new);
            let combined: RecordSet = old.iter().chain(new).cloned().collect();
            let combined = normalize(&combined, &keys, &config.columns_order);
            match &rule {
                Some(rule) => {
                    let (kept, n) = dedup_keep_first(combined, rule);
                    dropped = n;
                    kept
                }
                None => combined,
            }
        }
        Strategy::Replace => {
            let keys = all_keys(new, &[]);
            let batch = normalize(new, &keys, &config.columns_order);
            match &rule {
                Some(rule) => {
                    let (kept, n) = dedup_keep_first(batch, rule);
                    dropped = n;
                    kept
                }
                None => batch,
            }
        }
        Strategy::CustomTransform => {
            let transform = config.transform.as_ref().ok_or(ConfigError::MissingTransform)?;
            if rule.is_some() {
                log_warning("Custom transform is set, deduplication options are ignored");
            }
            transform.call(TransformInput {
                new_records: new,
                old_records: old,
            })
        }
    };

    let mut keys = union_keys(old, &result);
    extend_keys(&mut keys, &result);
    let records = normalize(&result, &keys, &config.columns_order);

    Ok(Merged {
        report: MergeReport {
            strategy,
            old_records: old.len(),
            new_records: new.len(),
            result_records: records.len(),
            duplicates_dropped: dropped,
        },
        records,
    })
}

fn all_keys(a: &[Record], b: &[Record]) -> Vec<String> {
    let mut keys = union_keys(a, b);
    extend_keys(&mut keys, a);
    extend_keys(&mut keys, b);
    keys
}
