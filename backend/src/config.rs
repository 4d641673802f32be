//! Run configuration.
//!
//! A run is described by a JSON document using the same camelCase field names
//! as the HTTP API. Pre-flight validation turns it into a [`MergeConfig`]
//! before any I/O happens.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::budget::DEFAULT_MAX_CELLS;
use crate::codec::RowShape;
use crate::error::{ConfigError, PipelineResult};
use crate::reconcile::{MergeConfig, Strategy};
use crate::source::{DatasetSource, FileSource, InlineSource};
use crate::store::RangeSpec;
use crate::transform::compile;

fn default_mode() -> String {
    "append".to_string()
}

fn default_range() -> String {
    "Sheet1".to_string()
}

fn default_max_cells() -> usize {
    DEFAULT_MAX_CELLS
}

/// Merge settings as the user writes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    /// `append` or `replace`
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub deduplicate_by_field: Option<String>,
    #[serde(default)]
    pub deduplicate_by_equality: bool,
    /// Transform program text, may be fully commented out
    #[serde(default)]
    pub transform_function: Option<String>,
    #[serde(default)]
    pub columns_order: Vec<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            deduplicate_by_field: None,
            deduplicate_by_equality: false,
            transform_function: None,
            columns_order: Vec::new(),
        }
    }
}

impl MergeOptions {
    /// Validate the options and compile the transform.
    pub fn to_merge_config(&self) -> PipelineResult<MergeConfig> {
        let strategy: Strategy = self.mode.parse()?;
        let transform = compile(self.transform_function.as_deref())?;

        // Input forms send "" for an unset field.
        let unique_field = self
            .deduplicate_by_field
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());

        let mut config = MergeConfig::new(strategy).with_columns_order(self.columns_order.iter().cloned());
        config.unique_by_field = unique_field.map(str::to_string);
        config.unique_by_equality = self.deduplicate_by_equality;
        config.transform = transform;
        config.validate()?;
        Ok(config)
    }
}

/// Everything a `sync` run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub spreadsheet_id: String,
    /// A1 range or sheet title
    #[serde(default = "default_range")]
    pub range: String,
    /// Numeric id of the target sheet, used by trim requests
    #[serde(default)]
    pub sheet_id: i64,

    #[serde(flatten)]
    pub merge: MergeOptions,

    #[serde(default)]
    pub create_backup: bool,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
    #[serde(default)]
    pub row_shape: RowShape,

    /// Dataset file (JSON array or CSV)
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    /// Inline records, used instead of `dataset` when non-empty
    #[serde(default)]
    pub raw_data: Vec<Value>,
}

impl RunConfig {
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn range_spec(&self) -> RangeSpec {
        RangeSpec::new(&self.spreadsheet_id, &self.range)
    }

    /// Key backups of this run are stored under.
    pub fn backup_key(&self) -> String {
        format!("{}/{}", self.spreadsheet_id, self.range)
    }

    /// Pre-flight checks that need no I/O.
    pub fn validate(&self) -> PipelineResult<MergeConfig> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::Invalid("spreadsheetId is required".into()).into());
        }
        if self.max_cells == 0 {
            return Err(ConfigError::Invalid("maxCells must be positive".into()).into());
        }
        self.merge.to_merge_config()
    }

    /// Inline records win over the dataset file.
    pub fn dataset_source(&self) -> PipelineResult<Box<dyn DatasetSource>> {
        if !self.raw_data.is_empty() {
            return Ok(Box::new(InlineSource::from_values(&self.raw_data)?));
        }
        match &self.dataset {
            Some(path) => Ok(Box::new(
                FileSource::new(path)
                    .with_offset(self.offset)
                    .with_limit(self.limit),
            )),
            None => Err(ConfigError::Invalid("either rawData or dataset is required".into()).into()),
        }
    }
}
