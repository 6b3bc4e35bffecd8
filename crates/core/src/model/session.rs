use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::model::{Confidence, QuestionId, QuizMode, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionResultError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("question {0} answered twice in one session")]
    DuplicateAnswer(QuestionId),
}

/// One answered question within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub question_id: QuestionId,
    pub correct: bool,
    pub confidence: Confidence,
    pub response_time: Duration,
}

impl AnswerEvent {
    #[must_use]
    pub fn new(
        question_id: QuestionId,
        correct: bool,
        confidence: Confidence,
        response_time: Duration,
    ) -> Self {
        Self {
            question_id,
            correct,
            confidence,
            response_time,
        }
    }
}

/// Read-only result of a finished (or abandoned) quiz session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    session_id: SessionId,
    mode: QuizMode,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    answers: Vec<AnswerEvent>,
    abandoned: bool,
}

impl SessionResult {
    /// Build a result from the answers given, in order.
    ///
    /// # Errors
    ///
    /// Returns `SessionResultError::InvalidTimeRange` if `completed_at` is before `started_at`,
    /// or `DuplicateAnswer` if a question appears twice.
    pub fn new(
        session_id: SessionId,
        mode: QuizMode,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        answers: Vec<AnswerEvent>,
        abandoned: bool,
    ) -> Result<Self, SessionResultError> {
        if completed_at < started_at {
            return Err(SessionResultError::InvalidTimeRange);
        }
        let mut seen = std::collections::HashSet::new();
        for answer in &answers {
            if !seen.insert(&answer.question_id) {
                return Err(SessionResultError::DuplicateAnswer(answer.question_id.clone()));
            }
        }

        Ok(Self {
            session_id,
            mode,
            started_at,
            completed_at,
            answers,
            abandoned,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerEvent] {
        &self.answers
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        u32::try_from(self.answers.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        u32::try_from(self.answers.iter().filter(|a| a.correct).count()).unwrap_or(u32::MAX)
    }

    /// Fraction answered correctly; `None` when nothing was answered.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        match self.answered() {
            0 => None,
            n => Some(f64::from(self.correct()) / f64::from(n)),
        }
    }

    #[must_use]
    pub fn total_response_time(&self) -> Duration {
        self.answers.iter().map(|a| a.response_time).sum()
    }

    /// (correct, answered) per question id, for topic roll-ups by the caller.
    #[must_use]
    pub fn tally_by<K: Ord>(&self, mut key: impl FnMut(&QuestionId) -> Option<K>) -> BTreeMap<K, (u32, u32)> {
        let mut tally = BTreeMap::new();
        for answer in &self.answers {
            if let Some(k) = key(&answer.question_id) {
                let entry: &mut (u32, u32) = tally.entry(k).or_default();
                entry.1 += 1;
                if answer.correct {
                    entry.0 += 1;
                }
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn answer(id: &str, correct: bool) -> AnswerEvent {
        AnswerEvent::new(
            QuestionId::new(id),
            correct,
            Confidence::Medium,
            Duration::from_secs(4),
        )
    }

    #[test]
    fn counts_and_accuracy() {
        let now = fixed_now();
        let result = SessionResult::new(
            SessionId::generate(),
            QuizMode::Random,
            now,
            now,
            vec![answer("a", true), answer("b", false), answer("c", true), answer("d", true)],
            false,
        )
        .unwrap();

        assert_eq!(result.answered(), 4);
        assert_eq!(result.correct(), 3);
        assert_eq!(result.accuracy(), Some(0.75));
        assert_eq!(result.total_response_time(), Duration::from_secs(16));
    }

    #[test]
    fn empty_session_has_no_accuracy() {
        let now = fixed_now();
        let result =
            SessionResult::new(SessionId::generate(), QuizMode::Random, now, now, vec![], true)
                .unwrap();
        assert_eq!(result.accuracy(), None);
        assert!(result.is_abandoned());
    }

    #[test]
    fn rejects_duplicates_and_reversed_time() {
        let now = fixed_now();
        let err = SessionResult::new(
            SessionId::generate(),
            QuizMode::Random,
            now,
            now,
            vec![answer("a", true), answer("a", false)],
            false,
        )
        .unwrap_err();
        assert_eq!(err, SessionResultError::DuplicateAnswer(QuestionId::new("a")));

        let err = SessionResult::new(
            SessionId::generate(),
            QuizMode::Random,
            now,
            now - chrono::Duration::seconds(1),
            vec![],
            false,
        )
        .unwrap_err();
        assert_eq!(err, SessionResultError::InvalidTimeRange);
    }

    #[test]
    fn tally_groups_by_key() {
        let now = fixed_now();
        let result = SessionResult::new(
            SessionId::generate(),
            QuizMode::Random,
            now,
            now,
            vec![answer("a1", true), answer("a2", false), answer("b1", true)],
            false,
        )
        .unwrap();
        let tally = result.tally_by(|id| id.as_str().chars().next());
        assert_eq!(tally[&'a'], (1, 2));
        assert_eq!(tally[&'b'], (1, 1));
    }
}
