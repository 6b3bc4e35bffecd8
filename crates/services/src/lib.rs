#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod progress_service;
pub mod report;
pub mod sessions;
pub mod study_services;

pub use quiz_core::Clock;
pub use sessions as session;

pub use context::StudyContext;
pub use error::{ReportError, SelectionError, SessionError, StudyServicesError};
pub use progress_service::{ProgressTracker, SessionOutcome};
pub use report::{GradebookReport, StudyStats, TopicStats, weakest_topic};
pub use sessions::{
    AnswerFeedback, SessionPlan, SessionProgress, SessionRecorder, SessionSelector,
};
pub use study_services::{LoadStatus, SaveStatus, StudyServices};
