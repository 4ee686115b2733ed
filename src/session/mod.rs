//! Client-side operator session: the recording state machine, the
//! microphone handle, and the advance loop.

mod link;
mod machine;
mod session;

pub use link::{LinkOpener, NoopOpener, SystemOpener};
pub use machine::RecordingState;
pub use session::{AdvanceOutcome, OperatorSession, SessionError};
