//! Advance protocol client
//!
//! Thin wire layer between the operator session and the advance handler.
//! Packages the finished blob plus the current row reference as a
//! multipart submission and decodes the server's answer, which is either
//! the next record's display fields or the terminal message.

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::capture::AudioBlob;
use crate::store::{Record, RowRef};

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The request never completed or the response could not be decoded.
    /// Surfaced to the operator as text; no automatic retry.
    #[error("network error: {0}")]
    Network(String),

    /// The server refused the submission (duplicate row, unknown row).
    #[error("server rejected submission: {0}")]
    Rejected(String),
}

/// What the server handed back.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The next unprocessed record; the session should re-arm on it.
    Next(Record),
    /// End of queue. The session is over.
    Done(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AdvancePayload {
    Next(Record),
    Done { message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
}

pub struct AdvanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl AdvanceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the first unprocessed record to seed a fresh session.
    pub async fn initial(&self) -> Result<Outcome, ClientError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    /// Submit the finished recording for `current_row` and receive the
    /// next record or the terminal message. The blob is consumed.
    pub async fn advance(
        &self,
        blob: AudioBlob,
        current_row: &RowRef,
    ) -> Result<Outcome, ClientError> {
        info!(
            "Submitting {} bytes for row {}",
            blob.len(),
            current_row
        );

        let part = reqwest::multipart::Part::bytes(blob.bytes)
            .file_name("memo.wav")
            .mime_str(&blob.media_type)
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("current_row", current_row.as_str().to_string());

        let response = self
            .client
            .post(format!("{}/advance", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Outcome, ClientError> {
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ClientError::Network(e.to_string()))?;
            let detail = serde_json::from_str::<ErrorPayload>(&body)
                .map(|p| p.error)
                .unwrap_or(body);
            return Err(ClientError::Rejected(format!("{}: {}", status, detail)));
        }

        let payload: AdvancePayload = response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("bad response payload: {}", e)))?;

        Ok(match payload {
            AdvancePayload::Next(record) => Outcome::Next(record),
            AdvancePayload::Done { message } => Outcome::Done(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = AdvanceClient::new("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn payload_decodes_next_record() {
        let json = r#"{"row":"2","url":"u1","company":"c","connected_on":"d",
                       "first_name":"f","last_name":"l","recording":""}"#;
        let payload: AdvancePayload = serde_json::from_str(json).unwrap();
        assert!(matches!(payload, AdvancePayload::Next(_)));
    }

    #[test]
    fn payload_decodes_terminal_message() {
        let json = r#"{"message":"No more unprocessed records."}"#;
        let payload: AdvancePayload = serde_json::from_str(json).unwrap();
        assert!(matches!(payload, AdvancePayload::Done { .. }));
    }
}
