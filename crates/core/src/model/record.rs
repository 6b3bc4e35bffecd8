use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{QuestionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("question {id}: total_correct ({correct}) exceeds total_attempts ({attempts})")]
    CorrectExceedsAttempts {
        id: QuestionId,
        correct: u32,
        attempts: u32,
    },

    #[error("question {0}: next_due is before last_seen")]
    DueBeforeSeen(QuestionId),

    #[error("question {0}: has attempts but was never seen")]
    AttemptsWithoutSeen(QuestionId),

    #[error("invalid confidence rating: {0}")]
    InvalidConfidence(String),
}

//
// ─── RATINGS ───────────────────────────────────────────────────────────────────
//

/// Learner's self-reported certainty, independent of correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Default for Confidence {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for Confidence {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" | "1" => Ok(Self::Low),
            "medium" | "m" | "2" | "" => Ok(Self::Medium),
            "high" | "h" | "3" => Ok(Self::High),
            other => Err(RecordError::InvalidConfidence(other.to_owned())),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Presentation difficulty adapted from the learner's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Per-question performance history.
///
/// Fields are private so the invariants hold for every instance:
/// `next_due >= last_seen` and `total_correct <= total_attempts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    question_id: QuestionId,
    topic: TopicId,
    last_seen: Option<DateTime<Utc>>,
    next_due: DateTime<Utc>,
    consecutive_correct: u32,
    consecutive_incorrect: u32,
    confidence: Confidence,
    difficulty: Difficulty,
    total_attempts: u32,
    total_correct: u32,
}

impl QuestionRecord {
    /// Default record for a question that has never been answered; due immediately.
    #[must_use]
    pub fn new(question_id: QuestionId, topic: TopicId, now: DateTime<Utc>) -> Self {
        Self {
            question_id,
            topic,
            last_seen: None,
            next_due: now,
            consecutive_correct: 0,
            consecutive_incorrect: 0,
            confidence: Confidence::Medium,
            difficulty: Difficulty::Normal,
            total_attempts: 0,
            total_correct: 0,
        }
    }

    /// Checks the record invariants, typically after deserialization.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` describing the first violated invariant.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.total_correct > self.total_attempts {
            return Err(RecordError::CorrectExceedsAttempts {
                id: self.question_id.clone(),
                correct: self.total_correct,
                attempts: self.total_attempts,
            });
        }
        match self.last_seen {
            Some(seen) if self.next_due < seen => {
                Err(RecordError::DueBeforeSeen(self.question_id.clone()))
            }
            None if self.total_attempts > 0 => {
                Err(RecordError::AttemptsWithoutSeen(self.question_id.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Records one answer. Scheduling fields are supplied by the scheduler.
    pub(crate) fn record_answer(
        &mut self,
        correct: bool,
        confidence: Confidence,
        now: DateTime<Utc>,
        interval: Duration,
    ) {
        self.total_attempts = self.total_attempts.saturating_add(1);
        if correct {
            self.total_correct = self.total_correct.saturating_add(1);
            self.consecutive_correct = self.consecutive_correct.saturating_add(1);
            self.consecutive_incorrect = 0;
        } else {
            self.consecutive_incorrect = self.consecutive_incorrect.saturating_add(1);
            self.consecutive_correct = 0;
        }
        self.confidence = confidence;
        self.last_seen = Some(now);
        self.next_due = now
            .checked_add_signed(interval.max(Duration::zero()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    pub(crate) fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn topic(&self) -> TopicId {
        self.topic
    }

    #[must_use]
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    #[must_use]
    pub fn next_due(&self) -> DateTime<Utc> {
        self.next_due
    }

    #[must_use]
    pub fn consecutive_correct(&self) -> u32 {
        self.consecutive_correct
    }

    #[must_use]
    pub fn consecutive_incorrect(&self) -> u32 {
        self.consecutive_incorrect
    }

    #[must_use]
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    #[must_use]
    pub fn total_correct(&self) -> u32 {
        self.total_correct
    }

    /// Whether the record is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due <= now
    }

    /// How long past due the record is; zero when not yet due.
    #[must_use]
    pub fn overdue_by(&self, now: DateTime<Utc>) -> Duration {
        (now - self.next_due).max(Duration::zero())
    }

    /// Current review interval, `None` for a never-seen question.
    #[must_use]
    pub fn current_interval(&self) -> Option<Duration> {
        self.last_seen.map(|seen| self.next_due - seen)
    }

    /// Fraction of attempts answered correctly; 0 when never attempted.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            f64::from(self.total_correct) / f64::from(self.total_attempts)
        }
    }

    /// Mastery score in `[0, 1]`.
    ///
    /// Accuracy weighted by how much evidence exists, plus a bonus for the
    /// current correct run, so one lucky answer does not count as mastered.
    #[must_use]
    pub fn mastery(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        let evidence = (f64::from(self.total_attempts) / 5.0).min(1.0);
        let run = (f64::from(self.consecutive_correct) / 5.0).min(1.0);
        (self.accuracy() * evidence * 0.8 + run * 0.2).clamp(0.0, 1.0)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn record() -> QuestionRecord {
        QuestionRecord::new(QuestionId::new("q1"), TopicId::new(1), fixed_now())
    }

    #[test]
    fn new_record_is_due_now_with_defaults() {
        let r = record();
        assert!(r.is_due(fixed_now()));
        assert_eq!(r.confidence(), Confidence::Medium);
        assert_eq!(r.difficulty(), Difficulty::Normal);
        assert_eq!(r.current_interval(), None);
        assert_eq!(r.mastery(), 0.0);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn record_answer_updates_counts_and_runs() {
        let mut r = record();
        let now = fixed_now();
        r.record_answer(true, Confidence::High, now, Duration::days(2));
        r.record_answer(false, Confidence::Low, now, Duration::days(1));

        assert_eq!(r.total_attempts(), 2);
        assert_eq!(r.total_correct(), 1);
        assert_eq!(r.consecutive_correct(), 0);
        assert_eq!(r.consecutive_incorrect(), 1);
        assert_eq!(r.confidence(), Confidence::Low);
        assert_eq!(r.current_interval(), Some(Duration::days(1)));
        assert!(r.validate().is_ok());
    }

    #[test]
    fn validate_catches_broken_invariants() {
        let json = r#"{
            "question_id": "q1", "topic": 1,
            "last_seen": "2023-11-14T22:13:20Z", "next_due": "2023-11-13T22:13:20Z",
            "consecutive_correct": 0, "consecutive_incorrect": 0,
            "confidence": "medium", "difficulty": "normal",
            "total_attempts": 1, "total_correct": 1
        }"#;
        let r: QuestionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.validate(), Err(RecordError::DueBeforeSeen(QuestionId::new("q1"))));

        let json = json
            .replace("2023-11-13", "2023-11-15")
            .replace("\"total_correct\": 1", "\"total_correct\": 4");
        let r: QuestionRecord = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            r.validate(),
            Err(RecordError::CorrectExceedsAttempts { correct: 4, attempts: 1, .. })
        ));
    }

    #[test]
    fn confidence_parses_loose_input() {
        assert_eq!("HIGH".parse::<Confidence>().unwrap(), Confidence::High);
        assert_eq!("l".parse::<Confidence>().unwrap(), Confidence::Low);
        assert_eq!("".parse::<Confidence>().unwrap(), Confidence::Medium);
        assert!("sure".parse::<Confidence>().is_err());
    }

    #[test]
    fn mastery_needs_evidence() {
        let mut one = record();
        one.record_answer(true, Confidence::High, fixed_now(), Duration::days(1));
        let mut five = record();
        for _ in 0..5 {
            five.record_answer(true, Confidence::High, fixed_now(), Duration::days(1));
        }
        assert!(one.mastery() < five.mastery());
        assert!((five.mastery() - 1.0).abs() < 1e-9);
    }
}
