//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionId, SessionResultError, SettingsError};

/// Rejected `SessionSelector` request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("question count must be at least 1")]
    ZeroCount,
    #[error("unknown quiz mode: {0}")]
    UnknownMode(String),
}

/// Errors emitted while recording a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session already completed")]
    Completed,
    #[error("expected an answer for {expected}, got {got}")]
    WrongQuestion { expected: QuestionId, got: QuestionId },
    #[error(transparent)]
    Result(#[from] SessionResultError),
}

/// Errors emitted while assembling study services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyServicesError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Errors emitted while rendering a report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("report is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
