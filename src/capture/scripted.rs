use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{AudioFrame, CaptureError, MicBackend};

/// Deterministic capture backend for tests and batch runs.
///
/// Each cycle replays the same scripted samples. Frames are pushed into
/// the channel on `start`; the channel is not closed until `stop` drops
/// the sender, mirroring the asynchronous finalization of a real device.
pub struct ScriptedMic {
    script: Vec<AudioFrame>,
    tx: Option<mpsc::Sender<AudioFrame>>,
    acquired: bool,
    /// Fail this many `start` calls before succeeding. usize::MAX means
    /// the device is permanently unavailable.
    fail_starts: usize,
    /// Fail this many `stop` calls before succeeding.
    fail_stops: usize,
    cycles_started: Arc<AtomicUsize>,
    acquire_count: Arc<AtomicUsize>,
}

/// Cloneable view into a [`ScriptedMic`]'s counters, usable after the
/// backend has been boxed into a session.
#[derive(Clone)]
pub struct ScriptedProbe {
    cycles_started: Arc<AtomicUsize>,
    acquire_count: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    /// Number of capture cycles started so far.
    pub fn cycles_started(&self) -> usize {
        self.cycles_started.load(Ordering::SeqCst)
    }

    /// Number of times the device was (re)acquired. The session contract
    /// says this stays at one no matter how many cycles run.
    pub fn acquire_count(&self) -> usize {
        self.acquire_count.load(Ordering::SeqCst)
    }
}

impl ScriptedMic {
    pub fn new(script: Vec<AudioFrame>) -> Self {
        Self {
            script,
            tx: None,
            acquired: false,
            fail_starts: 0,
            fail_stops: 0,
            cycles_started: Arc::new(AtomicUsize::new(0)),
            acquire_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// One 100ms frame of silence at 16kHz per cycle.
    pub fn silent() -> Self {
        Self::new(vec![AudioFrame {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
            timestamp_ms: 0,
        }])
    }

    /// A backend whose device acquisition always fails, for exercising
    /// the microphone-error path.
    pub fn unavailable() -> Self {
        let mut mic = Self::new(Vec::new());
        mic.fail_starts = usize::MAX;
        mic
    }

    /// Fail the first `n` start attempts, then behave normally. Models an
    /// operator denying and then granting microphone access.
    pub fn flaky(mut self, n: usize) -> Self {
        self.fail_starts = n;
        self
    }

    /// Fail the first `n` stop attempts. The interrupted cycle's frames
    /// are discarded, as a real device teardown failure would.
    pub fn fail_stops(mut self, n: usize) -> Self {
        self.fail_stops = n;
        self
    }

    pub fn probe(&self) -> ScriptedProbe {
        ScriptedProbe {
            cycles_started: Arc::clone(&self.cycles_started),
            acquire_count: Arc::clone(&self.acquire_count),
        }
    }
}

#[async_trait]
impl MicBackend for ScriptedMic {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.fail_starts > 0 {
            self.fail_starts = self.fail_starts.saturating_sub(1);
            return Err(CaptureError::PermissionDenied);
        }
        if self.tx.is_some() {
            return Err(CaptureError::StartFailed(
                "capture already in progress".into(),
            ));
        }

        if !self.acquired {
            self.acquired = true;
            self.acquire_count.fetch_add(1, Ordering::SeqCst);
        }
        self.cycles_started.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(self.script.len().max(1) + 1);
        for frame in &self.script {
            tx.send(frame.clone())
                .await
                .map_err(|_| CaptureError::StartFailed("frame channel closed".into()))?;
        }
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        match self.tx.take() {
            Some(tx) => {
                drop(tx);
                if self.fail_stops > 0 {
                    self.fail_stops -= 1;
                    return Err(CaptureError::StopFailed("scripted stop failure".into()));
                }
                Ok(())
            }
            None => Err(CaptureError::NotCapturing),
        }
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
