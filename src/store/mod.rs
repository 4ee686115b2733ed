//! Record store: the queue of outreach rows this service works through
//!
//! A record is one row in the backing sheet. Column F (the `recording`
//! field) doubles as the processed flag: an empty cell means the row has
//! not been worked yet. Claiming a row writes a marker into that cell with
//! compare-and-set semantics, which is what makes duplicate submissions
//! detectable.

mod memory;
mod sheets;

pub use memory::MemoryStore;
pub use sheets::{SheetsConfig, SheetsStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker written into the transcription cell while transcription is
/// still running in the background.
pub const PENDING_MARKER: &str = "[transcribing...]";

/// Opaque continuation token identifying one row in the store.
///
/// The client round-trips this value between requests; the server keeps no
/// session state of its own. For the sheets backend it is the 1-based row
/// number in string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowRef(pub String);

impl RowRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One queue entry: reference link, display metadata, and the
/// transcription slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub row: RowRef,
    pub url: String,
    pub company: String,
    pub connected_on: String,
    pub first_name: String,
    pub last_name: String,
    /// Transcription slot. Empty means unprocessed.
    pub recording: String,
}

impl Record {
    pub fn is_processed(&self) -> bool {
        !self.recording.trim().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row's transcription slot was already non-empty when a claim was
    /// attempted. Duplicate submission; the store was not modified.
    #[error("row {0} has already been processed")]
    AlreadyProcessed(RowRef),

    #[error("row {0} does not exist")]
    RowNotFound(RowRef),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Port to the backing record queue.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// First unprocessed record in queue order, if any.
    async fn first_unprocessed(&self) -> Result<Option<Record>, StoreError>;

    /// Next unprocessed record strictly after `after` in queue order.
    async fn next_unprocessed(&self, after: &RowRef) -> Result<Option<Record>, StoreError>;

    /// Atomically write `marker` into the row's transcription slot iff the
    /// slot is currently empty. This is the compare-and-set that marks the
    /// row processed; a second claim for the same row fails with
    /// [`StoreError::AlreadyProcessed`].
    async fn claim(&self, row: &RowRef, marker: &str) -> Result<(), StoreError>;

    /// Unconditional write-back of the final transcription text, keyed by
    /// row ref. Used by the background transcription task to replace the
    /// pending marker.
    async fn write_transcription(&self, row: &RowRef, text: &str) -> Result<(), StoreError>;
}
