use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use super::{Record, RecordStore, RowRef, StoreError};

const API_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// First data row. Row 1 is the header.
const FIRST_DATA_ROW: u64 = 2;

/// Google Sheets backed record store.
///
/// Column layout: A=url, B=company, C=connected_on, D=first_name,
/// E=last_name, F=recording. Column F is the transcription slot and the
/// processed flag in one.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug)]
pub struct SheetsStore {
    config: SheetsConfig,
    token: String,
    base_url: String,
    client: reqwest::Client,
    /// Serializes claim read-check-write cycles within this process. The
    /// workflow is single-operator; this is the "equivalent check" that
    /// keeps two in-flight claims for one row from both succeeding.
    claim_lock: Mutex<()>,
}

impl SheetsStore {
    pub fn new(config: SheetsConfig, token: impl Into<String>) -> Self {
        Self {
            config,
            token: token.into(),
            base_url: API_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            claim_lock: Mutex::new(()),
        }
    }

    /// Point the adapter at a different API endpoint. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.base_url, self.config.spreadsheet_id, range
        )
    }

    async fn fetch_range(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let response = self
            .client
            .get(self.values_url(range))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "sheets API returned {}",
                response.status()
            )));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(range.values)
    }

    async fn write_cell(&self, row: u64, text: &str) -> Result<(), StoreError> {
        let range = format!("{}!F{}", self.config.sheet_name, row);
        let url = format!("{}?valueInputOption=RAW", self.values_url(&range));

        let body = serde_json::json!({ "values": [[text]] });

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "sheets API returned {} writing F{}",
                response.status(),
                row
            )));
        }

        info!("Wrote transcription cell F{}", row);
        Ok(())
    }

    /// Scan rows starting at `from` for the first one with an empty
    /// transcription cell. Rows with fewer than six columns count as
    /// unprocessed, matching the backing sheet's behavior for rows the
    /// export never touched.
    async fn scan_unprocessed(&self, from: u64) -> Result<Option<Record>, StoreError> {
        let values = self.fetch_range(&self.config.sheet_name).await?;

        for (i, cells) in values.iter().enumerate() {
            let row = i as u64 + 1;
            if row < from {
                continue;
            }

            let cell = |idx: usize| cells.get(idx).cloned().unwrap_or_default();
            if cell(5).trim().is_empty() {
                return Ok(Some(Record {
                    row: RowRef::new(row.to_string()),
                    url: cell(0),
                    company: cell(1),
                    connected_on: cell(2),
                    first_name: cell(3),
                    last_name: cell(4),
                    recording: cell(5),
                }));
            }
        }

        Ok(None)
    }

    fn row_number(row: &RowRef) -> Result<u64, StoreError> {
        row.as_str()
            .parse::<u64>()
            .map_err(|_| StoreError::RowNotFound(row.clone()))
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    async fn first_unprocessed(&self) -> Result<Option<Record>, StoreError> {
        self.scan_unprocessed(FIRST_DATA_ROW).await
    }

    async fn next_unprocessed(&self, after: &RowRef) -> Result<Option<Record>, StoreError> {
        let after = Self::row_number(after)?;
        self.scan_unprocessed(after + 1).await
    }

    async fn claim(&self, row: &RowRef, marker: &str) -> Result<(), StoreError> {
        let row_num = Self::row_number(row)?;
        let _guard = self.claim_lock.lock().await;

        let range = format!("{}!A{}:F{}", self.config.sheet_name, row_num, row_num);
        let values = self.fetch_range(&range).await?;
        let cells = values
            .first()
            .ok_or_else(|| StoreError::RowNotFound(row.clone()))?;

        let current = cells.get(5).map(String::as_str).unwrap_or_default();
        if !current.trim().is_empty() {
            return Err(StoreError::AlreadyProcessed(row.clone()));
        }

        self.write_cell(row_num, marker).await
    }

    async fn write_transcription(&self, row: &RowRef, text: &str) -> Result<(), StoreError> {
        let row_num = Self::row_number(row)?;
        self.write_cell(row_num, text).await
    }
}
