//! Google Sheets v4 store.
//!
//! Thin request/response client: one HTTP call per store operation, no
//! retries (the pipeline wraps every call) and no credential handling. The
//! caller passes an already resolved OAuth access token.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use super::{RangeSpec, TabularStore};
use crate::budget::BatchUpdate;
use crate::error::{StoreError, StoreResult};
use crate::models::Row;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Sheets API client
#[derive(Clone)]
pub struct SheetsClient {
    http: Client,
    base_url: String,
    access_token: String,
}

/// `values.get` response
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Option<Vec<Row>>,
}

/// Sheets API error response
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl SheetsClient {
    /// Create a client with an explicit access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Point the client at another endpoint
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| StoreError::Http(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Http(format!("Invalid base URL: {}", self.base_url)))?
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &RangeSpec) -> StoreResult<Url> {
        self.url(&[&range.spreadsheet_id, "values", &range.range])
    }

    fn batch_url(&self, spreadsheet_id: &str) -> StoreResult<Url> {
        self.url(&[&format!("{}:batchUpdate", spreadsheet_id)])
    }

    /// Send a request and return the body of a successful response
    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<String> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(body)
    }
}

/// Pull the message out of a Sheets error body, falling back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect())
}

#[async_trait]
impl TabularStore for SheetsClient {
    fn name(&self) -> &str {
        "google-sheets"
    }

    async fn read_rows(&self, range: &RangeSpec) -> StoreResult<Option<Vec<Row>>> {
        let url = self.values_url(range)?;
        let body = self.send(self.http.get(url)).await?;
        let value_range: ValueRange =
            serde_json::from_str(&body).map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        Ok(value_range.values.filter(|rows| !rows.is_empty()))
    }

    async fn write_rows(&self, range: &RangeSpec, rows: &[Row]) -> StoreResult<()> {
        let mut url = self.values_url(range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "USER_ENTERED");
        let body = json!({
            "range": range.range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.send(self.http.put(url).json(&body)).await?;
        Ok(())
    }

    async fn apply_batch(&self, spreadsheet_id: &str, batch: &BatchUpdate) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let url = self.batch_url(spreadsheet_id)?;
        self.send(self.http.post(url).json(batch)).await?;
        Ok(())
    }
}
