use chrono::{DateTime, Utc};
use std::time::Duration;

use quiz_core::model::{
    Answer, AnswerEvent, Confidence, Question, QuestionId, QuizMode, SessionId, SessionResult,
};

use crate::error::SessionError;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// What the learner sees after answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub correct_text: String,
    pub explanation: Option<String>,
}

/// Steps through a planned question list and collects one answer per question.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    session_id: SessionId,
    mode: QuizMode,
    started_at: DateTime<Utc>,
    questions: Vec<QuestionId>,
    answers: Vec<AnswerEvent>,
    current: usize,
}

impl SessionRecorder {
    #[must_use]
    pub fn new(mode: QuizMode, questions: Vec<QuestionId>, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: SessionId::generate(),
            mode,
            started_at,
            questions,
            answers: Vec::new(),
            current: 0,
        }
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
    pub fn questions(&self) -> &[QuestionId] {
        &self.questions
    }

    /// Question awaiting an answer, if any.
    #[must_use]
    pub fn current(&self) -> Option<&QuestionId> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current >= self.questions.len()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self.answers.len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(self.current),
            is_complete: self.is_complete(),
        }
    }

    /// Time left for timed modes; `None` for untimed ones.
    #[must_use]
    pub fn time_left(&self, now: DateTime<Utc>) -> Option<Duration> {
        let limit = self.mode.time_limit()?;
        let elapsed = (now - self.started_at).to_std().unwrap_or_default();
        Some(limit.saturating_sub(elapsed))
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.time_left(now).is_some_and(|left| left.is_zero())
    }

    /// Record an already-graded answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` when every question was answered.
    pub fn record(
        &mut self,
        correct: bool,
        confidence: Confidence,
        response_time: Duration,
    ) -> Result<(), SessionError> {
        let id = self.current().cloned().ok_or(SessionError::Completed)?;
        self.answers
            .push(AnswerEvent::new(id, correct, confidence, response_time));
        self.current += 1;
        Ok(())
    }

    /// Grade `answer` against `question` and record it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` when the session is over, or
    /// `WrongQuestion` if `question` is not the current one.
    pub fn submit(
        &mut self,
        question: &Question,
        answer: &Answer,
        confidence: Confidence,
        response_time: Duration,
    ) -> Result<AnswerFeedback, SessionError> {
        let expected = self.current().ok_or(SessionError::Completed)?;
        if expected != question.id() {
            return Err(SessionError::WrongQuestion {
                expected: expected.clone(),
                got: question.id().clone(),
            });
        }
        let correct = question.check(answer);
        self.record(correct, confidence, response_time)?;
        Ok(AnswerFeedback {
            correct,
            correct_text: question.correct_text().to_owned(),
            explanation: question.explanation().map(str::to_owned),
        })
    }

    /// Move past the current question without answering it.
    pub fn skip(&mut self) {
        if !self.is_complete() {
            self.current += 1;
        }
    }

    /// Close the session normally.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Result` if `completed_at` precedes the start.
    pub fn finish(self, completed_at: DateTime<Utc>) -> Result<SessionResult, SessionError> {
        self.into_result(completed_at, false)
    }

    /// Close the session early, keeping the answers given so far.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Result` if `completed_at` precedes the start.
    pub fn abandon(self, completed_at: DateTime<Utc>) -> Result<SessionResult, SessionError> {
        self.into_result(completed_at, true)
    }

    fn into_result(
        self,
        completed_at: DateTime<Utc>,
        abandoned: bool,
    ) -> Result<SessionResult, SessionError> {
        Ok(SessionResult::new(
            self.session_id,
            self.mode,
            self.started_at,
            completed_at,
            self.answers,
            abandoned,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{CatalogDraft, QuestionDraft, QuestionKind, TopicDraft, TopicId};
    use quiz_core::time::fixed_now;

    fn question(id: &str) -> Question {
        let catalog = CatalogDraft {
            topics: vec![TopicDraft {
                id: TopicId::new(1),
                name: "Search".into(),
            }],
            questions: vec![QuestionDraft {
                id: QuestionId::new(id),
                topic: TopicId::new(1),
                prompt: "Which search expands the shallowest node first?".into(),
                kind: QuestionKind::MultipleChoice {
                    choices: vec!["DFS".into(), "BFS".into()],
                    correct: 1,
                },
                explanation: Some("Breadth-first uses a FIFO frontier.".into()),
            }],
        }
        .validate()
        .unwrap();
        catalog.question(&QuestionId::new(id)).unwrap().clone()
    }

    fn ids(list: &[&str]) -> Vec<QuestionId> {
        list.iter().map(|s| QuestionId::new(*s)).collect()
    }

    #[test]
    fn steps_through_questions_in_order() {
        let mut rec = SessionRecorder::new(QuizMode::Random, ids(&["a", "b"]), fixed_now());
        assert_eq!(rec.current(), Some(&QuestionId::new("a")));
        rec.record(true, Confidence::High, Duration::from_secs(2)).unwrap();
        assert_eq!(rec.current(), Some(&QuestionId::new("b")));
        rec.record(false, Confidence::Low, Duration::from_secs(5)).unwrap();
        assert!(rec.is_complete());
        assert_eq!(
            rec.record(true, Confidence::High, Duration::ZERO),
            Err(SessionError::Completed)
        );

        let result = rec.finish(fixed_now()).unwrap();
        assert_eq!(result.answered(), 2);
        assert_eq!(result.correct(), 1);
        assert!(!result.is_abandoned());
    }

    #[test]
    fn submit_grades_and_checks_question() {
        let q = question("s1");
        let mut rec = SessionRecorder::new(QuizMode::Random, ids(&["s1"]), fixed_now());
        let feedback = rec
            .submit(&q, &Answer::Text("bfs".into()), Confidence::Medium, Duration::from_secs(1))
            .unwrap();
        assert!(feedback.correct);
        assert_eq!(feedback.correct_text, "BFS");

        let mut rec = SessionRecorder::new(QuizMode::Random, ids(&["other"]), fixed_now());
        let err = rec
            .submit(&q, &Answer::Choice(1), Confidence::Medium, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, SessionError::WrongQuestion { .. }));
    }

    #[test]
    fn abandon_keeps_partial_answers() {
        let mut rec = SessionRecorder::new(QuizMode::Random, ids(&["a", "b", "c"]), fixed_now());
        rec.record(true, Confidence::High, Duration::from_secs(2)).unwrap();
        rec.skip();
        let progress = rec.progress();
        assert_eq!((progress.answered, progress.remaining), (1, 1));

        let result = rec.abandon(fixed_now()).unwrap();
        assert!(result.is_abandoned());
        assert_eq!(result.answered(), 1);
    }

    #[test]
    fn timed_modes_expire() {
        let rec = SessionRecorder::new(QuizMode::TimeAttack, ids(&["a"]), fixed_now());
        assert_eq!(rec.time_left(fixed_now()), Some(Duration::from_secs(120)));
        assert!(!rec.is_expired(fixed_now() + chrono::Duration::seconds(119)));
        assert!(rec.is_expired(fixed_now() + chrono::Duration::seconds(121)));

        let untimed = SessionRecorder::new(QuizMode::Random, ids(&["a"]), fixed_now());
        assert_eq!(untimed.time_left(fixed_now()), None);
    }

    #[test]
    fn finish_before_start_is_rejected() {
        let rec = SessionRecorder::new(QuizMode::Random, ids(&["a"]), fixed_now());
        let err = rec.finish(fixed_now() - chrono::Duration::seconds(1)).unwrap_err();
        assert!(matches!(err, SessionError::Result(_)));
    }
}
