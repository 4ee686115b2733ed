pub mod capture;
pub mod client;
pub mod config;
pub mod http;
pub mod session;
pub mod store;
pub mod transcribe;

pub use capture::{
    collect_blob, AudioBlob, AudioFrame, CaptureError, CpalMic, MicBackend, ScriptedMic,
    ScriptedProbe,
};
pub use client::{AdvanceClient, ClientError, Outcome};
pub use config::Config;
pub use http::{create_router, AppState, NO_MORE_RECORDS};
pub use session::{
    AdvanceOutcome, LinkOpener, NoopOpener, OperatorSession, RecordingState, SessionError,
    SystemOpener,
};
pub use store::{
    MemoryStore, Record, RecordStore, RowRef, SheetsConfig, SheetsStore, StoreError,
    PENDING_MARKER,
};
pub use transcribe::{Transcriber, TranscriptionError, WhisperTranscriber};
