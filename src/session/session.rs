use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::link::LinkOpener;
use super::machine::RecordingState;
use crate::capture::{collect_blob, AudioBlob, AudioFrame, CaptureError, MicBackend};
use crate::client::{AdvanceClient, ClientError, Outcome};
use crate::store::Record;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The terminal message has been received; controls are disabled.
    #[error("session has ended")]
    SessionEnded,

    #[error("no current record loaded")]
    NoCurrentRecord,

    #[error("a recording cycle is already active")]
    NotIdle,

    #[error(transparent)]
    Microphone(#[from] CaptureError),

    #[error(transparent)]
    Advance(#[from] ClientError),

    #[error("failed to package recording: {0}")]
    Packaging(String),
}

/// Result of a `done` signal.
#[derive(Debug)]
pub enum AdvanceOutcome {
    /// Nothing was recording and nothing was pending: no-op.
    NotRecording,
    /// The next record arrived and a new recording cycle is already armed.
    Advanced,
    /// Terminal message received; the session is over.
    Finished(String),
}

/// One operator's record-advance session.
///
/// Owns the microphone handle exclusively, drives the recording state
/// machine, and applies the server's advance responses. All methods take
/// `&mut self`, so at most one recording and one advance request can be
/// in flight at a time.
pub struct OperatorSession {
    session_id: String,
    mic: Box<dyn MicBackend>,
    opener: Box<dyn LinkOpener>,
    client: AdvanceClient,
    state: RecordingState,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    /// Finished blob from a cycle whose submission failed; held for
    /// manual retry so the recording is not lost.
    pending_blob: Option<AudioBlob>,
    current: Option<Record>,
    terminal: Option<String>,
}

impl OperatorSession {
    pub fn new(
        mic: Box<dyn MicBackend>,
        opener: Box<dyn LinkOpener>,
        client: AdvanceClient,
    ) -> Self {
        let session_id = format!("session-{}", uuid::Uuid::new_v4());
        info!("Creating operator session: {}", session_id);

        Self {
            session_id,
            mic,
            opener,
            client,
            state: RecordingState::Idle,
            frames: None,
            pending_blob: None,
            current: None,
            terminal: None,
        }
    }

    /// Seed the session with the first unprocessed record. An empty queue
    /// ends the session immediately; recording controls stay disabled.
    pub async fn load_initial(&mut self) -> Result<(), SessionError> {
        match self.client.initial().await? {
            Outcome::Next(record) => {
                info!("Session {} seeded with row {}", self.session_id, record.row);
                self.current = Some(record);
            }
            Outcome::Done(message) => {
                info!("Session {} found an empty queue: {}", self.session_id, message);
                self.terminal = Some(message);
            }
        }
        Ok(())
    }

    /// Begin a recording cycle for the current record.
    ///
    /// Opens the record's reference link, acquires the microphone on the
    /// first cycle (later cycles reuse the held handle), and starts
    /// capture. On microphone failure the session stays `Idle` and the
    /// operator can retry without reloading.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.terminal.is_some() {
            return Err(SessionError::SessionEnded);
        }
        if !self.state.is_idle() {
            return Err(SessionError::NotIdle);
        }
        let record = self.current.as_ref().ok_or(SessionError::NoCurrentRecord)?;

        if let Err(e) = self.opener.open(&record.url) {
            warn!("Could not open reference link {}: {}", record.url, e);
        }

        // Starting a fresh capture cycle replaces the frame channel, which
        // discards any chunks from a previous cycle.
        let frames = self.mic.start().await?;
        self.frames = Some(frames);
        self.state.start();

        info!(
            "Recording started for row {} ({})",
            record.row,
            self.mic.name()
        );
        Ok(())
    }

    /// The `done` signal: finish the current recording, submit it, and
    /// apply the server's response.
    ///
    /// A `done` while nothing is recording is a no-op unless a previous
    /// submission failed, in which case the retained blob is resubmitted
    /// (the manual retry path).
    pub async fn advance(&mut self) -> Result<AdvanceOutcome, SessionError> {
        if self.terminal.is_some() {
            return Err(SessionError::SessionEnded);
        }

        let blob = if self.state.is_recording() {
            self.finish_recording().await?
        } else if let Some(blob) = self.pending_blob.take() {
            info!("Retrying failed submission ({} bytes)", blob.len());
            blob
        } else {
            return Ok(AdvanceOutcome::NotRecording);
        };

        let row = self
            .current
            .as_ref()
            .ok_or(SessionError::NoCurrentRecord)?
            .row
            .clone();

        match self.client.advance(blob.clone(), &row).await {
            Ok(Outcome::Next(record)) => {
                info!(
                    "Session {} advanced: row {} -> row {}",
                    self.session_id, row, record.row
                );
                self.current = Some(record);
                // Recording for the next record begins without an
                // explicit operator action.
                self.start().await?;
                Ok(AdvanceOutcome::Advanced)
            }
            Ok(Outcome::Done(message)) => {
                info!("Session {} finished: {}", self.session_id, message);
                self.terminal = Some(message.clone());
                Ok(AdvanceOutcome::Finished(message))
            }
            Err(e) => {
                // Keep the blob so a re-click can resubmit it.
                self.pending_blob = Some(blob);
                Err(e.into())
            }
        }
    }

    /// `Recording -> Stopping -> Idle`: stop capture, wait for the final
    /// buffered frame to flush, and package the accumulated audio.
    ///
    /// The session returns to `Idle` even when stopping or packaging
    /// fails; a wedged `Stopping` state would lock the operator out of
    /// every further cycle.
    async fn finish_recording(&mut self) -> Result<AudioBlob, SessionError> {
        self.state.begin_stop();
        let result = self.stop_and_package().await;
        self.state.finish_stop();

        let blob = result?;
        info!("Recording finished: {} bytes", blob.len());
        Ok(blob)
    }

    async fn stop_and_package(&mut self) -> Result<AudioBlob, SessionError> {
        self.mic.stop().await?;

        let frames = self
            .frames
            .take()
            .ok_or_else(|| SessionError::Packaging("no frame channel".into()))?;

        // Finalization is asynchronous: the channel closes only after the
        // backend has delivered its last chunk.
        collect_blob(frames)
            .await
            .map_err(|e| SessionError::Packaging(e.to_string()))
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn current_record(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    /// Once ended, the session accepts no further starts or advances.
    pub fn is_ended(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn terminal_message(&self) -> Option<&str> {
        self.terminal.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
