//! Dataset sources producing the new batch of records.
//!
//! Files are either a JSON array of objects or a CSV file. CSV input gets its
//! encoding and delimiter auto-detected. Nested JSON values are stored as their
//! compact JSON text.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{SourceError, SourceResult};
use crate::models::{Cell, Record, RecordSet};

/// Producer of the new batch.
pub trait DatasetSource: Send + Sync {
    /// Human readable origin, for logs.
    fn describe(&self) -> String;

    fn load_records(&self) -> SourceResult<RecordSet>;
}

// =============================================================================
// Inline records
// =============================================================================

/// Records given directly in the run configuration.
#[derive(Debug, Clone, Default)]
pub struct InlineSource {
    records: RecordSet,
}

impl InlineSource {
    pub fn new(records: RecordSet) -> Self {
        Self { records }
    }

    /// Build from JSON values, rejecting anything that is not an object.
    pub fn from_values(values: &[Value]) -> SourceResult<Self> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Record::from_json(v).ok_or(SourceError::NotARecord(i)))
            .collect::<SourceResult<RecordSet>>()
            .map(Self::new)
    }
}

impl DatasetSource for InlineSource {
    fn describe(&self) -> String {
        format!("{} inline records", self.records.len())
    }

    fn load_records(&self) -> SourceResult<RecordSet> {
        Ok(self.records.clone())
    }
}

// =============================================================================
// File source
// =============================================================================

/// JSON or CSV file with an optional offset/limit window.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    offset: usize,
    limit: Option<usize>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            limit: None,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn load_records(&self) -> SourceResult<RecordSet> {
        let bytes = std::fs::read(&self.path)?;
        let records = parse_bytes_auto(&bytes)?;
        Ok(window(records, self.offset, self.limit))
    }
}

/// Skip `offset` records, then keep at most `limit`.
pub fn window(records: RecordSet, offset: usize, limit: Option<usize>) -> RecordSet {
    let skipped = records.into_iter().skip(offset);
    match limit {
        Some(limit) => skipped.take(limit).collect(),
        None => skipped.collect(),
    }
}

/// Parse a dataset of unknown format: JSON when it starts with `[`, CSV otherwise.
pub fn parse_bytes_auto(bytes: &[u8]) -> SourceResult<RecordSet> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let content = content.trim_start_matches('\u{feff}');

    if content.trim_start().starts_with('[') {
        parse_json_records(content)
    } else {
        parse_csv_records(content, detect_delimiter(content))
    }
}

/// Parse a JSON array of objects.
pub fn parse_json_records(content: &str) -> SourceResult<RecordSet> {
    let values: Vec<Value> = serde_json::from_str(content)?;
    Ok(InlineSource::from_values(&values)?.records)
}

/// Parse CSV text whose first line is the header. Every cell becomes text.
pub fn parse_csv_records(content: &str, delimiter: u8) -> SourceResult<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SourceError::Csv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(SourceError::Empty);
    }

    let mut records: RecordSet = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| SourceError::Csv(e.to_string()))?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        records.push(
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), Cell::from(row.get(i).unwrap_or(""))))
                .collect(),
        );
    }
    Ok(records)
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes, falling back to lossy UTF-8 for unknown encodings
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding {
        "iso-8859-1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Pick the separator occurring most often on the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|sep| (sep, first_line.matches(sep as char).count()))
        .fold((b',', 0), |best, candidate| if candidate.1 > best.1 { candidate } else { best })
        .0
}
