use super::state::AppState;
use crate::capture::AudioBlob;
use crate::store::{RowRef, StoreError, PENDING_MARKER};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info, warn};

/// Terminal message returned once the queue is exhausted.
pub const NO_MORE_RECORDS: &str = "No more unprocessed records.";

// ============================================================================
// Response Types
// ============================================================================

/// End-of-queue signal. Returned with 200; queue exhaustion is the normal
/// terminal condition, not a failure.
#[derive(Debug, Serialize)]
pub struct TerminalResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
/// Serve the first unprocessed record so the operator session can seed
/// itself, or the terminal message if the queue is already empty.
pub async fn initial_record(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.first_unprocessed().await {
        Ok(Some(record)) => {
            info!("Serving initial record: row {}", record.row);
            (StatusCode::OK, Json(record)).into_response()
        }
        Ok(None) => (
            StatusCode::OK,
            Json(TerminalResponse {
                message: NO_MORE_RECORDS.to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to load initial record: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to load initial record: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /advance
///
/// Multipart body: `file` (the finished recording) and `current_row` (the
/// continuation token the client has been carrying). Claims the row,
/// hands the audio to background transcription, and answers with the next
/// unprocessed record or the terminal message.
pub async fn advance(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let submission = match read_submission(multipart).await {
        Ok(s) => s,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
                .into_response()
        }
    };

    let row = submission.current_row;
    info!(
        "Advance request: row {}, {} bytes of {}",
        row,
        submission.audio.len(),
        submission.audio.media_type
    );

    // Claim the row first. The compare-and-set keeps a duplicate
    // submission from double-counting: if the transcription slot is
    // already occupied the store is left untouched and the client gets a
    // retryable rejection.
    if let Err(e) = state.store.claim(&row, PENDING_MARKER).await {
        return match e {
            StoreError::AlreadyProcessed(_) => {
                warn!("Duplicate submission for row {}", row);
                (
                    StatusCode::CONFLICT,
                    Json(ErrorResponse {
                        error: format!("Row {} was already submitted", row),
                    }),
                )
                    .into_response()
            }
            StoreError::RowNotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Row {} not found", row),
                }),
            )
                .into_response(),
            StoreError::Backend(msg) => {
                error!("Store error claiming row {}: {}", row, msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: format!("Failed to claim row {}: {}", row, msg),
                    }),
                )
                    .into_response()
            }
        };
    }

    // Transcription runs out-of-band; the row reference is the only
    // correlation key. The response below never waits on it.
    spawn_transcription(&state, row.clone(), submission.audio);

    match state.store.next_unprocessed(&row).await {
        Ok(Some(next)) => {
            info!("Serving next record: row {}", next.row);
            (StatusCode::OK, Json(next)).into_response()
        }
        Ok(None) => {
            info!("Queue exhausted after row {}", row);
            (
                StatusCode::OK,
                Json(TerminalResponse {
                    message: NO_MORE_RECORDS.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to look up next record: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to look up next record: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Internals
// ============================================================================

struct Submission {
    audio: AudioBlob,
    current_row: RowRef,
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, String> {
    let mut audio = None;
    let mut current_row = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Malformed multipart body: {}", e))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read audio field: {}", e))?;
                audio = Some(AudioBlob::new(bytes.to_vec(), media_type));
            }
            Some("current_row") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read current_row field: {}", e))?;
                current_row = Some(RowRef::new(value));
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| "Missing 'file' field".to_string())?;
    let current_row = current_row.ok_or_else(|| "Missing 'current_row' field".to_string())?;

    if audio.is_empty() {
        return Err("Audio upload is empty".to_string());
    }
    if current_row.as_str().trim().is_empty() {
        return Err("current_row is empty".to_string());
    }

    Ok(Submission { audio, current_row })
}

/// Kick off background transcription for a claimed row. On failure a
/// failure marker is persisted instead of the text so the queue keeps
/// moving; the row stays processed either way.
fn spawn_transcription(state: &AppState, row: RowRef, audio: AudioBlob) {
    let store = state.store.clone();
    let transcriber = state.transcriber.clone();

    tokio::spawn(async move {
        let text = match transcriber.transcribe(&audio).await {
            Ok(text) => {
                info!("Transcription complete for row {} ({} chars)", row, text.len());
                text
            }
            Err(e) => {
                error!("Transcription failed for row {}: {}", row, e);
                format!("[transcription failed: {}]", e)
            }
        };

        if let Err(e) = store.write_transcription(&row, &text).await {
            error!("Failed to write transcription for row {}: {}", row, e);
        }
    });
}
