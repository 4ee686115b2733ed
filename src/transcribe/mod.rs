//! Transcription port and adapters

mod whisper;

pub use whisper::WhisperTranscriber;

use async_trait::async_trait;
use thiserror::Error;

use crate::capture::AudioBlob;

/// Transcription errors
#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Empty transcription response")]
    EmptyResponse,

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API error: {0}")]
    ApiError(String),
}

/// Port for speech-to-text transcription of a finished recording.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioBlob) -> Result<String, TranscriptionError>;
}
