use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::{AudioFrame, CaptureError, MicBackend};

/// Frame channel depth. The audio callback drops frames rather than block
/// if the consumer falls this far behind.
const FRAME_CHANNEL_CAPACITY: usize = 1024;

enum MicCommand {
    Start {
        frames: mpsc::Sender<AudioFrame>,
        ack: oneshot::Sender<Result<(), CaptureError>>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
}

struct FrameSink {
    tx: mpsc::Sender<AudioFrame>,
    samples_sent: u64,
}

/// Microphone backend on top of cpal.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread
/// that is spawned on the first `start` and owns the device for the life
/// of the backend. Later cycles pause and resume the same stream; the
/// operator is never re-prompted for the device.
pub struct CpalMic {
    commands: Option<std_mpsc::Sender<MicCommand>>,
    is_capturing: Arc<AtomicBool>,
}

impl CpalMic {
    pub fn new() -> Self {
        Self {
            commands: None,
            is_capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the stream thread and wait for it to open the device.
    async fn acquire(&mut self) -> Result<(), CaptureError> {
        if self.commands.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        std::thread::spawn(move || stream_thread(ready_tx));

        let commands = ready_rx
            .await
            .map_err(|_| CaptureError::StartFailed("capture thread exited".into()))??;

        info!("Microphone acquired");
        self.commands = Some(commands);
        Ok(())
    }

    fn mix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
        if channels <= 1 {
            return samples.to_vec();
        }

        samples
            .chunks(channels as usize)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    }
}

impl Default for CpalMic {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MicBackend for CpalMic {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.is_capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::StartFailed(
                "capture already in progress".into(),
            ));
        }

        self.acquire().await?;

        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ack_tx, ack_rx) = oneshot::channel();

        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| CaptureError::StartFailed("device not acquired".into()))?;
        commands
            .send(MicCommand::Start {
                frames: frames_tx,
                ack: ack_tx,
            })
            .map_err(|_| CaptureError::StartFailed("capture thread gone".into()))?;

        ack_rx
            .await
            .map_err(|_| CaptureError::StartFailed("capture thread gone".into()))??;

        self.is_capturing.store(true, Ordering::SeqCst);
        Ok(frames_rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.is_capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::NotCapturing);
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let commands = self.commands.as_ref().ok_or(CaptureError::NotCapturing)?;
        commands
            .send(MicCommand::Stop { ack: ack_tx })
            .map_err(|_| CaptureError::StopFailed("capture thread gone".into()))?;

        ack_rx
            .await
            .map_err(|_| CaptureError::StopFailed("capture thread gone".into()))?;

        self.is_capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

/// Owns the cpal stream for the life of the backend. Runs on its own
/// thread; commands arrive over a std channel so the thread can block.
fn stream_thread(ready: oneshot::Sender<Result<std_mpsc::Sender<MicCommand>, CaptureError>>) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            let _ = ready.send(Err(CaptureError::NoDevice));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::StartFailed(e.to_string())));
            return;
        }
    };

    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.config();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;

    let sink: Arc<StdMutex<Option<FrameSink>>> = Arc::new(StdMutex::new(None));

    let on_error = |err| error!("Audio stream error: {}", err);

    let stream_result = match sample_format {
        SampleFormat::I16 => {
            let sink = Arc::clone(&sink);
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    push_frame(&sink, data, sample_rate, channels);
                },
                on_error,
                None,
            )
        }
        SampleFormat::F32 => {
            let sink = Arc::clone(&sink);
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let i16_data: Vec<i16> =
                        data.iter().map(|&s| (s * 32767.0) as i16).collect();
                    push_frame(&sink, &i16_data, sample_rate, channels);
                },
                on_error,
                None,
            )
        }
        other => {
            let _ = ready.send(Err(CaptureError::StartFailed(format!(
                "unsupported sample format {:?}",
                other
            ))));
            return;
        }
    };

    let stream = match stream_result {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::StartFailed(e.to_string())));
            return;
        }
    };

    // The stream starts paused; each cycle resumes and pauses it.
    if let Err(e) = stream.pause() {
        warn!("Could not pause freshly built stream: {}", e);
    }

    let (command_tx, command_rx) = std_mpsc::channel();
    if ready.send(Ok(command_tx)).is_err() {
        return;
    }

    info!(
        "Capture stream ready: {}Hz, {} channel(s), {:?}",
        sample_rate, channels, sample_format
    );

    while let Ok(command) = command_rx.recv() {
        match command {
            MicCommand::Start { frames, ack } => {
                {
                    let mut guard = sink.lock().unwrap();
                    *guard = Some(FrameSink {
                        tx: frames,
                        samples_sent: 0,
                    });
                }
                let result = stream
                    .play()
                    .map_err(|e| CaptureError::StartFailed(e.to_string()));
                let _ = ack.send(result);
            }
            MicCommand::Stop { ack } => {
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause stream: {}", e);
                }
                // Dropping the sender closes the frame channel once the
                // consumer has drained everything already pushed.
                let mut guard = sink.lock().unwrap();
                *guard = None;
                drop(guard);
                let _ = ack.send(());
            }
        }
    }
    // Command channel closed: backend dropped, release the device.
    drop(stream);
    info!("Capture stream released");
}

fn push_frame(
    sink: &Arc<StdMutex<Option<FrameSink>>>,
    data: &[i16],
    sample_rate: u32,
    channels: u16,
) {
    let mut guard = match sink.lock() {
        Ok(g) => g,
        Err(_) => return,
    };

    if let Some(state) = guard.as_mut() {
        let mono = CpalMic::mix_to_mono(data, channels);
        let timestamp_ms = state.samples_sent * 1000 / sample_rate as u64;
        state.samples_sent += mono.len() as u64;

        // Drop the frame rather than block the audio callback.
        let _ = state.tx.try_send(AudioFrame {
            samples: mono,
            sample_rate,
            timestamp_ms,
        });
    }
}
