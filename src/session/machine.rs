/// Recording state for one operator session.
///
/// There is no separate armed state: the microphone handle is held by the
/// session itself, so arming and capturing happen in the same transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Not currently recording.
    Idle,
    /// Capture in progress, frames accumulating.
    Recording,
    /// Stop requested; waiting for the final buffered frame to flush.
    Stopping,
}

impl RecordingState {
    /// `Idle --start--> Recording`. Illegal from any other state.
    pub fn start(&mut self) -> bool {
        match self {
            RecordingState::Idle => {
                *self = RecordingState::Recording;
                true
            }
            _ => false,
        }
    }

    /// `Recording --done--> Stopping`. A `done` signal in any other state
    /// is a no-op; this is the double-submit guard.
    pub fn begin_stop(&mut self) -> bool {
        match self {
            RecordingState::Recording => {
                *self = RecordingState::Stopping;
                true
            }
            _ => false,
        }
    }

    /// `Stopping --(blob ready)--> Idle`. Only legal once the final frame
    /// has been delivered.
    pub fn finish_stop(&mut self) -> bool {
        match self {
            RecordingState::Stopping => {
                *self = RecordingState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }
}
