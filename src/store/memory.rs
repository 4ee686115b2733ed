use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use super::{Record, RecordStore, RowRef, StoreError};

/// In-memory record store for tests and local development.
///
/// Rows are keyed by their numeric position so queue order matches the
/// sheet layout the production backend uses (row 1 is the header, data
/// starts at row 2).
#[derive(Debug, Clone)]
pub struct MemoryStore {
    rows: Arc<Mutex<BTreeMap<u64, Record>>>,
}

impl MemoryStore {
    /// Build a store from fixture records. Fails if any row reference is
    /// not numeric; fixtures come from user-supplied files, so a bad row
    /// is a config error, not a panic.
    pub fn new(records: Vec<Record>) -> Result<Self, StoreError> {
        let mut rows = BTreeMap::new();
        for record in records {
            let key = record.row.as_str().parse::<u64>().map_err(|_| {
                StoreError::Backend(format!("row reference {} is not numeric", record.row))
            })?;
            rows.insert(key, record);
        }

        Ok(Self {
            rows: Arc::new(Mutex::new(rows)),
        })
    }

    /// Seed a store with unprocessed rows starting at row 2, one per
    /// `(url, first_name)` pair. Convenience for tests.
    pub fn seeded(entries: &[(&str, &str)]) -> Self {
        let rows = entries
            .iter()
            .enumerate()
            .map(|(i, (url, first_name))| {
                let key = i as u64 + 2;
                let record = Record {
                    row: RowRef::new(key.to_string()),
                    url: url.to_string(),
                    company: String::new(),
                    connected_on: String::new(),
                    first_name: first_name.to_string(),
                    last_name: String::new(),
                    recording: String::new(),
                };
                (key, record)
            })
            .collect();

        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    /// Snapshot of a single row, for assertions.
    pub async fn get(&self, row: &RowRef) -> Option<Record> {
        let key = Self::key(row).ok()?;
        self.rows.lock().await.get(&key).cloned()
    }

    fn key(row: &RowRef) -> Result<u64, StoreError> {
        row.as_str()
            .parse::<u64>()
            .map_err(|_| StoreError::RowNotFound(row.clone()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn first_unprocessed(&self) -> Result<Option<Record>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.values().find(|r| !r.is_processed()).cloned())
    }

    async fn next_unprocessed(&self, after: &RowRef) -> Result<Option<Record>, StoreError> {
        let after_key = Self::key(after)?;
        let rows = self.rows.lock().await;
        Ok(rows
            .range(after_key + 1..)
            .map(|(_, r)| r)
            .find(|r| !r.is_processed())
            .cloned())
    }

    async fn claim(&self, row: &RowRef, marker: &str) -> Result<(), StoreError> {
        let key = Self::key(row)?;
        let mut rows = self.rows.lock().await;
        let record = rows
            .get_mut(&key)
            .ok_or_else(|| StoreError::RowNotFound(row.clone()))?;

        if record.is_processed() {
            return Err(StoreError::AlreadyProcessed(row.clone()));
        }

        record.recording = marker.to_string();
        info!("Claimed row {} ({})", row, marker);
        Ok(())
    }

    async fn write_transcription(&self, row: &RowRef, text: &str) -> Result<(), StoreError> {
        let key = Self::key(row)?;
        let mut rows = self.rows.lock().await;
        let record = rows
            .get_mut(&key)
            .ok_or_else(|| StoreError::RowNotFound(row.clone()))?;

        record.recording = text.to_string();
        Ok(())
    }
}
