use std::sync::Arc;

use crate::store::RecordStore;
use crate::transcribe::Transcriber;

/// Shared application state for HTTP handlers.
///
/// Deliberately holds no per-operator session state: the client carries
/// the current row reference between requests, and the record store is
/// the only thing shared across them.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self { store, transcriber }
    }
}
