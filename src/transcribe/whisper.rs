//! OpenAI Whisper API transcriber adapter

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{TranscriptionError, Transcriber};
use crate::capture::AudioBlob;

const DEFAULT_MODEL: &str = "whisper-1";

const API_BASE_URL: &str = "https://api.openai.com/v1";

/// Upload size cap enforced by the API (25 MB). Larger recordings are
/// split into chunks and transcribed piecewise.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Bound on a single transcription request; a hung call must not pin the
/// background task forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Whisper API transcriber
pub struct WhisperTranscriber {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the adapter at a different API endpoint. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_url(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }

    async fn transcribe_one(&self, audio: &AudioBlob) -> Result<String, TranscriptionError> {
        let part = reqwest::multipart::Part::bytes(audio.bytes.clone())
            .file_name("memo.wav")
            .mime_str(&audio.media_type)
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "text");

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TranscriptionError::InvalidApiKey);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TranscriptionError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranscriptionError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TranscriptionError::EmptyResponse);
        }

        Ok(trimmed.to_string())
    }

    /// Split a WAV blob into chunks that each fit under `max_bytes`.
    ///
    /// Non-WAV payloads and payloads already under the cap pass through
    /// unchanged.
    fn split_blob(audio: &AudioBlob, max_bytes: usize) -> Vec<AudioBlob> {
        if audio.len() <= max_bytes {
            return vec![audio.clone()];
        }

        let reader = match hound::WavReader::new(Cursor::new(&audio.bytes)) {
            Ok(r) => r,
            Err(_) => return vec![audio.clone()],
        };

        let sample_rate = reader.spec().sample_rate;
        let samples: Vec<i16> = match reader.into_samples().collect() {
            Ok(s) => s,
            Err(_) => return vec![audio.clone()],
        };

        // Two bytes per sample plus container overhead.
        let samples_per_chunk = (max_bytes.saturating_sub(1024) / 2).max(1);

        samples
            .chunks(samples_per_chunk)
            .filter_map(|chunk| AudioBlob::from_samples(chunk, sample_rate).ok())
            .collect()
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioBlob) -> Result<String, TranscriptionError> {
        let chunks = Self::split_blob(audio, MAX_UPLOAD_BYTES);

        if chunks.len() > 1 {
            info!(
                "Recording exceeds upload cap, split into {} chunks",
                chunks.len()
            );
        }

        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            parts.push(self.transcribe_one(chunk).await?);
        }

        Ok(parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_targets_transcriptions_endpoint() {
        let transcriber = WhisperTranscriber::new("test-key");
        assert_eq!(
            transcriber.api_url(),
            "https://api.openai.com/v1/audio/transcriptions"
        );
    }

    #[test]
    fn base_url_override() {
        let transcriber = WhisperTranscriber::new("key").with_base_url("http://localhost:9999");
        assert_eq!(
            transcriber.api_url(),
            "http://localhost:9999/audio/transcriptions"
        );
    }

    #[test]
    fn small_blob_is_not_split() {
        let blob = AudioBlob::from_samples(&[0i16; 1600], 16000).unwrap();
        let chunks = WhisperTranscriber::split_blob(&blob, MAX_UPLOAD_BYTES);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn oversized_blob_splits_into_bounded_chunks() {
        let blob = AudioBlob::from_samples(&[7i16; 100_000], 16000).unwrap();
        let chunks = WhisperTranscriber::split_blob(&blob, 50_000);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 50_000, "chunk of {} bytes", chunk.len());
        }

        let total: usize = chunks
            .iter()
            .map(|c| {
                hound::WavReader::new(Cursor::new(&c.bytes))
                    .unwrap()
                    .len() as usize
            })
            .sum();
        assert_eq!(total, 100_000);
    }
}
