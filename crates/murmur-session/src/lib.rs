//! Murmur session crate - the recording pipeline.
//!
//! Owns the session registry (per-key mutual exclusion, minimum-duration
//! floor), the transcription queue and its single worker, the gesture state
//! machine, and text injection into the focused application.

pub mod gesture;
pub mod registry;
pub mod session;
pub mod text_inject;
pub mod worker;

pub use gesture::GestureHandler;
pub use registry::{AppendOutcome, SessionRegistry};
pub use session::RecordingSession;
pub use text_inject::{MockTextSink, SendInputInjector, TextSink};
pub use worker::{JobReceiver, JobSender, TranscriptionJob, TranscriptionWorker};
