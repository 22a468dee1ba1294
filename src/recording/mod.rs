//! Recorder and user-controlled recording session

mod recorder;
mod session;

pub use recorder::{HarRecorder, RecorderStats};
pub use session::{RecordingSession, SessionState};
