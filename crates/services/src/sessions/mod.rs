mod plan;
mod recorder;

// Public API of the session subsystem.
pub use crate::error::{SelectionError, SessionError};
pub use plan::{SessionPlan, SessionSelector};
pub use recorder::{AnswerFeedback, SessionProgress, SessionRecorder};
