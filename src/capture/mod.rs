//! Microphone capture for the operator session
//!
//! The backend trait follows the push model: `start` hands back a channel
//! of audio frames, `stop` flushes whatever the device still has buffered
//! and then closes the channel. Finalization is therefore asynchronous;
//! the consumer must drain the receiver to exhaustion after `stop` before
//! it can treat the recording as complete.

mod mic;
mod scripted;

pub use mic::CpalMic;
pub use scripted::{ScriptedMic, ScriptedProbe};

use std::io::Cursor;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, mono)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("no audio input device available")]
    NoDevice,

    #[error("microphone access denied")]
    PermissionDenied,

    #[error("failed to start capture: {0}")]
    StartFailed(String),

    #[error("failed to stop capture: {0}")]
    StopFailed(String),

    #[error("no capture in progress")]
    NotCapturing,
}

/// Microphone capture backend.
///
/// The device handle is acquired on the first `start` and reused across
/// recording cycles; implementations must not re-open (or re-prompt for)
/// the device on later cycles, and must hold it until the backend is
/// dropped with the session.
#[async_trait]
pub trait MicBackend: Send {
    /// Begin a capture cycle.
    ///
    /// Returns a channel receiver that will receive audio frames. The
    /// channel stays open until `stop` has flushed the final frame.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// End the current capture cycle, flushing buffered audio into the
    /// frame channel before closing it.
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// A finished recording: immutable bytes plus declared media type.
///
/// Produced once per recording cycle and consumed exactly once by the
/// advance client.
#[derive(Debug, Clone)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl AudioBlob {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// Package raw mono PCM samples into a WAV container. Container
    /// packaging only; the samples are written as-is.
    pub fn from_samples(samples: &[i16], sample_rate: u32) -> anyhow::Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }

        Ok(Self::new(cursor.into_inner(), "audio/wav"))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Drain a frame channel to exhaustion and package the accumulated
/// samples. Called after `MicBackend::stop`; blocks until the backend has
/// delivered its final frame and closed the channel.
pub async fn collect_blob(
    mut frames: mpsc::Receiver<AudioFrame>,
) -> anyhow::Result<AudioBlob> {
    let mut samples = Vec::new();
    let mut sample_rate = 16000;

    while let Some(frame) = frames.recv().await {
        sample_rate = frame.sample_rate;
        samples.extend_from_slice(&frame.samples);
    }

    AudioBlob::from_samples(&samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_is_valid_wav() {
        let samples = vec![0i16, 100, -100, 3000];
        let blob = AudioBlob::from_samples(&samples, 16000).unwrap();

        assert_eq!(blob.media_type, "audio/wav");
        assert_eq!(&blob.bytes[..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(blob.bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let decoded: Vec<i16> = reader.into_samples().collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded, samples);
    }

    #[tokio::test]
    async fn collect_blob_drains_until_channel_closes() {
        let (tx, rx) = mpsc::channel(8);
        for i in 0..3u64 {
            tx.send(AudioFrame {
                samples: vec![i as i16; 4],
                sample_rate: 16000,
                timestamp_ms: i * 100,
            })
            .await
            .unwrap();
        }
        drop(tx);

        let blob = collect_blob(rx).await.unwrap();
        let reader = hound::WavReader::new(Cursor::new(blob.bytes)).unwrap();
        assert_eq!(reader.len(), 12);
    }
}
