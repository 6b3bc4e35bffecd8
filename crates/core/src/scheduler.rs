use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

use crate::model::{
    Confidence, Difficulty, QuestionRecord, SchedulerSettings, SettingsError,
};

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// What the scheduler did to a record for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub interval: Duration,
    pub next_due: DateTime<Utc>,
    pub difficulty: Difficulty,
    /// The record's topic now needs a weak-area drill.
    pub flag_weak_topic: bool,
}

/// Ranking key for due questions: most overdue first, then longest miss run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPriority {
    pub overdue: Duration,
    pub misses: u32,
}

impl Ord for ReviewPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.overdue
            .cmp(&other.overdue)
            .then(self.misses.cmp(&other.misses))
    }
}

impl PartialOrd for ReviewPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Confidence-aware spaced-repetition scheduler.
///
/// Confident correct answers double the review interval up to a cap. A correct
/// answer given with low confidence counts as a guess and resets the interval
/// to the base, as does any incorrect answer.
///
/// # Examples
///
/// ```
/// # use quiz_core::scheduler::Scheduler;
/// # use quiz_core::model::{Confidence, QuestionId, QuestionRecord, TopicId};
/// let scheduler = Scheduler::default();
/// let now = quiz_core::time::fixed_now();
/// let mut record = QuestionRecord::new(QuestionId::new("q1"), TopicId::new(1), now);
///
/// let outcome = scheduler.apply(&mut record, true, Confidence::High, now);
/// assert_eq!(outcome.interval, chrono::Duration::days(1));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scheduler {
    settings: SchedulerSettings,
}

impl Scheduler {
    /// Create a scheduler with custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are out of range.
    pub fn new(settings: SchedulerSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    #[must_use]
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    #[must_use]
    pub fn base_interval(&self) -> Duration {
        Duration::hours(self.settings.base_interval_hours)
    }

    #[must_use]
    pub fn max_interval(&self) -> Duration {
        Duration::days(self.settings.max_interval_days)
    }

    /// Interval the next review should use, before the record is mutated.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss
    )]
    pub fn next_interval(
        &self,
        record: &QuestionRecord,
        correct: bool,
        confidence: Confidence,
    ) -> Duration {
        let base = self.base_interval();
        if !correct || confidence == Confidence::Low {
            return base;
        }
        match record.current_interval() {
            None => base,
            Some(previous) => {
                let previous = previous.max(base);
                let max = self.max_interval();
                let grown_secs = (previous.num_seconds() as f64 * self.settings.growth_factor)
                    .min(max.num_seconds() as f64);
                Duration::seconds(grown_secs.round() as i64).min(max)
            }
        }
    }

    /// Apply one answer to `record`: counts, interval, next due date and difficulty.
    pub fn apply(
        &self,
        record: &mut QuestionRecord,
        correct: bool,
        confidence: Confidence,
        now: DateTime<Utc>,
    ) -> ScheduleOutcome {
        let interval = self.next_interval(record, correct, confidence);
        record.record_answer(correct, confidence, now, interval);

        let flag_weak_topic = record.consecutive_incorrect() >= self.settings.weak_area_threshold;
        let difficulty = if flag_weak_topic {
            Difficulty::Easy
        } else {
            self.adapted_difficulty(record)
        };
        record.set_difficulty(difficulty);

        ScheduleOutcome {
            interval,
            next_due: record.next_due(),
            difficulty,
            flag_weak_topic,
        }
    }

    /// Difficulty from accuracy once enough attempts exist; otherwise unchanged.
    #[must_use]
    pub fn adapted_difficulty(&self, record: &QuestionRecord) -> Difficulty {
        if record.total_attempts() < self.settings.adapt_after_attempts {
            return record.difficulty();
        }
        let accuracy = record.accuracy();
        if accuracy < self.settings.easy_below_accuracy {
            Difficulty::Easy
        } else if accuracy > self.settings.hard_above_accuracy {
            Difficulty::Hard
        } else {
            Difficulty::Normal
        }
    }

    /// Ranking key used when choosing among due questions.
    #[must_use]
    pub fn priority(&self, record: &QuestionRecord, now: DateTime<Utc>) -> ReviewPriority {
        ReviewPriority {
            overdue: record.overdue_by(now),
            misses: record.consecutive_incorrect(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
