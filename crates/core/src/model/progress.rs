use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::model::{ProgressSettings, QuestBoard, QuestError, TopicId};
use crate::time::calendar_days_between;

//
// ─── ACHIEVEMENTS ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    FirstSession,
    PerfectScore,
    ExcellentPerformance,
    CenturyClub,
    WeekStreak,
    ConfidentAndCorrect,
    LevelFive,
    WeakAreaCleared,
    QuestApprentice,
    QuestAdept,
    QuestVeteran,
    QuestLegend,
}

impl AchievementId {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            AchievementId::FirstSession => "First Steps",
            AchievementId::PerfectScore => "Perfect Score!",
            AchievementId::ExcellentPerformance => "Excellent Performance!",
            AchievementId::CenturyClub => "Century Club: 100 Questions!",
            AchievementId::WeekStreak => "7 Day Streak!",
            AchievementId::ConfidentAndCorrect => "Sure Thing",
            AchievementId::LevelFive => "Level 5 Reached!",
            AchievementId::WeakAreaCleared => "Weak Spot Fixed",
            AchievementId::QuestApprentice => "Quest Apprentice: 5 Quests",
            AchievementId::QuestAdept => "Quest Adept: 15 Quests",
            AchievementId::QuestVeteran => "Quest Veteran: 25 Quests",
            AchievementId::QuestLegend => "Quest Legend: 40 Quests",
        }
    }
}

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

//
// ─── STREAKS ───────────────────────────────────────────────────────────────────
//

/// What happened to the streak when a study day was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    Started,
    Unchanged,
    Extended,
    Preserved { freezes_used: u32 },
    Reset { previous: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub change: StreakChange,
    pub freeze_earned: bool,
}

/// Correct/total counts for one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicTally {
    pub correct: u32,
    pub total: u32,
}

impl TopicTally {
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| f64::from(self.correct) / f64::from(self.total))
    }
}

//
// ─── PROGRESS STATE ────────────────────────────────────────────────────────────
//

/// Saved progress that contradicts itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("{correct} correct answers out of {answered} answered")]
    CorrectExceedsAnswered { correct: u64, answered: u64 },

    #[error("topic {topic}: {correct} correct out of {total}")]
    TopicCorrectExceedsTotal {
        topic: TopicId,
        correct: u32,
        total: u32,
    },

    #[error("best session accuracy {0}% is above 100%")]
    BestAccuracyOutOfRange(u8),

    #[error("current streak {current} exceeds longest streak {longest}")]
    StreakExceedsLongest { current: u32, longest: u32 },

    #[error("{0} study days recorded but no last study date")]
    StreakWithoutDate(u32),

    #[error(transparent)]
    Quest(#[from] QuestError),
}

/// Learner-wide progress: XP, level, streak, achievements and quests.
///
/// Owned by the progress tracker and passed around explicitly. The level is
/// derived from XP; the stored copy is recomputed on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressState {
    xp: u64,
    level: u32,
    streak_count: u32,
    longest_streak: u32,
    last_study_date: Option<NaiveDate>,
    streak_freezes: u32,
    achievements: BTreeSet<AchievementId>,
    total_answered: u64,
    total_correct: u64,
    sessions_completed: u32,
    best_accuracy_pct: u8,
    topic_accuracy: BTreeMap<TopicId, TopicTally>,
    /// Summed answer response times.
    study_time_ms: u64,
    quests: QuestBoard,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new(&ProgressSettings::default())
    }
}

impl ProgressState {
    #[must_use]
    pub fn new(settings: &ProgressSettings) -> Self {
        Self {
            xp: 0,
            level: 1,
            streak_count: 0,
            longest_streak: 0,
            last_study_date: None,
            streak_freezes: settings.starting_streak_freezes,
            achievements: BTreeSet::new(),
            total_answered: 0,
            total_correct: 0,
            sessions_completed: 0,
            best_accuracy_pct: 0,
            topic_accuracy: BTreeMap::new(),
            study_time_ms: 0,
            quests: QuestBoard::default(),
        }
    }

    /// Checks a deserialized state and recomputes its level from XP.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` describing the first contradiction found.
    pub fn validated(mut self, settings: &ProgressSettings) -> Result<Self, ProgressError> {
        if self.total_correct > self.total_answered {
            return Err(ProgressError::CorrectExceedsAnswered {
                correct: self.total_correct,
                answered: self.total_answered,
            });
        }
        if let Some((&topic, tally)) = self
            .topic_accuracy
            .iter()
            .find(|(_, tally)| tally.correct > tally.total)
        {
            return Err(ProgressError::TopicCorrectExceedsTotal {
                topic,
                correct: tally.correct,
                total: tally.total,
            });
        }
        if self.best_accuracy_pct > 100 {
            return Err(ProgressError::BestAccuracyOutOfRange(self.best_accuracy_pct));
        }
        if self.streak_count > self.longest_streak {
            return Err(ProgressError::StreakExceedsLongest {
                current: self.streak_count,
                longest: self.longest_streak,
            });
        }
        if self.streak_count > 0 && self.last_study_date.is_none() {
            return Err(ProgressError::StreakWithoutDate(self.streak_count));
        }
        self.quests.validate()?;
        self.level = level_for_xp(self.xp, settings.xp_per_level);
        Ok(self)
    }

    /// Adds XP and recomputes the level. Returns true on level-up.
    pub fn add_xp(&mut self, amount: u64, settings: &ProgressSettings) -> bool {
        let before = self.level;
        self.xp = self.xp.saturating_add(amount);
        self.level = level_for_xp(self.xp, settings.xp_per_level);
        self.level > before
    }

    /// Registers study on `today` and updates the streak.
    ///
    /// A gap of `g > 1` days needs `g - 1` freezes to keep the streak alive;
    /// without enough freezes the streak restarts at 1 and none are spent.
    pub fn register_study_day(
        &mut self,
        today: NaiveDate,
        settings: &ProgressSettings,
    ) -> StreakUpdate {
        let change = match self.last_study_date {
            None => {
                self.streak_count = 1;
                StreakChange::Started
            }
            Some(last) => {
                let gap = calendar_days_between(last, today);
                if gap <= 0 {
                    StreakChange::Unchanged
                } else if gap == 1 {
                    self.streak_count = self.streak_count.saturating_add(1);
                    StreakChange::Extended
                } else {
                    let missed = u32::try_from(gap - 1).unwrap_or(u32::MAX);
                    if self.streak_count > 0 && self.streak_freezes >= missed {
                        self.streak_freezes -= missed;
                        self.streak_count = self.streak_count.saturating_add(1);
                        StreakChange::Preserved {
                            freezes_used: missed,
                        }
                    } else {
                        let previous = self.streak_count;
                        self.streak_count = 1;
                        StreakChange::Reset { previous }
                    }
                }
            }
        };

        if self.last_study_date.is_none_or(|last| today > last) {
            self.last_study_date = Some(today);
        }
        self.longest_streak = self.longest_streak.max(self.streak_count);

        let moved = !matches!(change, StreakChange::Unchanged);
        let freeze_earned = moved
            && settings.freeze_every_days > 0
            && self.streak_count % settings.freeze_every_days == 0
            && self.streak_freezes < settings.max_streak_freezes;
        if freeze_earned {
            self.streak_freezes += 1;
        }

        StreakUpdate {
            change,
            freeze_earned,
        }
    }

    /// Unlocks an achievement; returns false if it was already unlocked.
    pub fn unlock(&mut self, id: AchievementId) -> bool {
        self.achievements.insert(id)
    }

    /// Folds one session's answer counts and time into lifetime totals.
    pub fn record_session(&mut self, answered: u32, correct: u32, study_time: Duration) {
        let ms = u64::try_from(study_time.as_millis()).unwrap_or(u64::MAX);
        self.study_time_ms = self.study_time_ms.saturating_add(ms);
        self.total_answered = self.total_answered.saturating_add(u64::from(answered));
        self.total_correct = self.total_correct.saturating_add(u64::from(correct));
        self.sessions_completed = self.sessions_completed.saturating_add(1);
        if answered > 0 {
            let pct = u8::try_from(correct.saturating_mul(100) / answered).unwrap_or(100);
            self.best_accuracy_pct = self.best_accuracy_pct.max(pct);
        }
    }

    pub fn record_topic_answer(&mut self, topic: TopicId, correct: bool) {
        let tally = self.topic_accuracy.entry(topic).or_default();
        tally.total = tally.total.saturating_add(1);
        if correct {
            tally.correct = tally.correct.saturating_add(1);
        }
    }

    #[must_use]
    pub fn xp(&self) -> u64 {
        self.xp
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn streak_count(&self) -> u32 {
        self.streak_count
    }

    #[must_use]
    pub fn longest_streak(&self) -> u32 {
        self.longest_streak
    }

    #[must_use]
    pub fn last_study_date(&self) -> Option<NaiveDate> {
        self.last_study_date
    }

    #[must_use]
    pub fn streak_freezes(&self) -> u32 {
        self.streak_freezes
    }

    #[must_use]
    pub fn achievements(&self) -> &BTreeSet<AchievementId> {
        &self.achievements
    }

    #[must_use]
    pub fn has_achievement(&self, id: AchievementId) -> bool {
        self.achievements.contains(&id)
    }

    #[must_use]
    pub fn total_answered(&self) -> u64 {
        self.total_answered
    }

    #[must_use]
    pub fn total_correct(&self) -> u64 {
        self.total_correct
    }

    #[must_use]
    pub fn sessions_completed(&self) -> u32 {
        self.sessions_completed
    }

    #[must_use]
    pub fn best_accuracy_pct(&self) -> u8 {
        self.best_accuracy_pct
    }

    #[must_use]
    pub fn topic_accuracy(&self) -> &BTreeMap<TopicId, TopicTally> {
        &self.topic_accuracy
    }

    /// Total time spent answering questions.
    #[must_use]
    pub fn study_time(&self) -> Duration {
        Duration::from_millis(self.study_time_ms)
    }

    #[must_use]
    pub fn quests(&self) -> &QuestBoard {
        &self.quests
    }

    pub fn quests_mut(&mut self) -> &mut QuestBoard {
        &mut self.quests
    }

    /// Lifetime accuracy; `None` before the first answer.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn overall_accuracy(&self) -> Option<f64> {
        (self.total_answered > 0).then(|| self.total_correct as f64 / self.total_answered as f64)
    }

    #[cfg(test)]
    pub(crate) fn with_last_study(mut self, date: NaiveDate, streak: u32, freezes: u32) -> Self {
        self.last_study_date = Some(date);
        self.streak_count = streak;
        self.longest_streak = streak;
        self.streak_freezes = freezes;
        self
    }
}

/// `floor(xp / xp_per_level) + 1`.
#[must_use]
pub fn level_for_xp(xp: u64, xp_per_level: u64) -> u32 {
    let steps = xp / xp_per_level.max(1);
    u32::try_from(steps).unwrap_or(u32::MAX - 1) + 1
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn settings() -> ProgressSettings {
        ProgressSettings::default()
    }

    #[test]
    fn level_is_step_function_of_xp() {
        assert_eq!(level_for_xp(0, 100), 1);
        assert_eq!(level_for_xp(99, 100), 1);
        assert_eq!(level_for_xp(100, 100), 2);
        assert_eq!(level_for_xp(1_250, 100), 13);

        let mut state = ProgressState::default();
        assert!(!state.add_xp(50, &settings()));
        assert!(state.add_xp(65, &settings()));
        assert_eq!(state.level(), 2);
        assert_eq!(state.xp(), 115);
    }

    #[test]
    fn first_study_day_starts_streak() {
        let mut state = ProgressState::default();
        let update = state.register_study_day(day(1), &settings());
        assert_eq!(update.change, StreakChange::Started);
        assert_eq!(state.streak_count(), 1);
        assert_eq!(state.last_study_date(), Some(day(1)));
    }

    #[test]
    fn yesterday_extends_by_exactly_one() {
        let mut state = ProgressState::default().with_last_study(day(9), 3, 0);
        let update = state.register_study_day(day(10), &settings());
        assert_eq!(update.change, StreakChange::Extended);
        assert_eq!(state.streak_count(), 4);
    }

    #[test]
    fn same_day_leaves_streak_unchanged() {
        let mut state = ProgressState::default().with_last_study(day(10), 3, 0);
        let update = state.register_study_day(day(10), &settings());
        assert_eq!(update.change, StreakChange::Unchanged);
        assert_eq!(state.streak_count(), 3);
    }

    #[test]
    fn three_day_gap_without_freeze_resets_to_one() {
        let mut state = ProgressState::default().with_last_study(day(7), 6, 0);
        let update = state.register_study_day(day(10), &settings());
        assert_eq!(update.change, StreakChange::Reset { previous: 6 });
        assert_eq!(state.streak_count(), 1);
        assert_eq!(state.longest_streak(), 6);
    }

    #[test]
    fn freezes_cover_missed_days() {
        let mut state = ProgressState::default().with_last_study(day(7), 6, 2);
        let update = state.register_study_day(day(10), &settings());
        assert_eq!(update.change, StreakChange::Preserved { freezes_used: 2 });
        assert_eq!(state.streak_count(), 7);
        assert_eq!(state.streak_freezes(), 0);
    }

    #[test]
    fn not_enough_freezes_spends_none() {
        let mut state = ProgressState::default().with_last_study(day(1), 6, 2);
        state.register_study_day(day(10), &settings());
        assert_eq!(state.streak_count(), 1);
        assert_eq!(state.streak_freezes(), 2);
    }

    #[test]
    fn freeze_earned_on_multiples_up_to_cap() {
        let mut state = ProgressState::default().with_last_study(day(9), 4, 2);
        let update = state.register_study_day(day(10), &settings());
        assert!(update.freeze_earned);
        assert_eq!(state.streak_freezes(), 3);

        let mut capped = ProgressState::default().with_last_study(day(9), 9, 5);
        assert!(!capped.register_study_day(day(10), &settings()).freeze_earned);
        assert_eq!(capped.streak_freezes(), 5);
    }

    #[test]
    fn unlock_is_idempotent() {
        let mut state = ProgressState::default();
        assert!(state.unlock(AchievementId::PerfectScore));
        assert!(!state.unlock(AchievementId::PerfectScore));
        assert_eq!(state.achievements().len(), 1);
    }

    #[test]
    fn session_totals_and_best_accuracy() {
        let mut state = ProgressState::default();
        state.record_session(10, 9, Duration::from_secs(95));
        state.record_session(4, 1, Duration::from_millis(25_500));
        assert_eq!(state.total_answered(), 14);
        assert_eq!(state.best_accuracy_pct(), 90);
        assert_eq!(state.sessions_completed(), 2);
        assert_eq!(state.study_time(), Duration::from_millis(120_500));
    }

    fn decode(json: &str) -> ProgressState {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn validated_recomputes_level_from_xp() {
        let state = decode(r#"{"xp": 250}"#).validated(&settings()).unwrap();
        assert_eq!(state.level(), 3);

        let state = decode(r#"{"xp": 0, "level": 40}"#).validated(&settings()).unwrap();
        assert_eq!(state.level(), 1);
    }

    #[test]
    fn validated_rejects_contradictory_totals() {
        let err = decode(r#"{"total_answered": 1, "total_correct": 9}"#)
            .validated(&settings())
            .unwrap_err();
        assert_eq!(
            err,
            ProgressError::CorrectExceedsAnswered {
                correct: 9,
                answered: 1
            }
        );

        let err = decode(r#"{"best_accuracy_pct": 180}"#)
            .validated(&settings())
            .unwrap_err();
        assert_eq!(err, ProgressError::BestAccuracyOutOfRange(180));

        let err = decode(r#"{"topic_accuracy": {"3": {"correct": 4, "total": 2}}}"#)
            .validated(&settings())
            .unwrap_err();
        assert!(matches!(err, ProgressError::TopicCorrectExceedsTotal { .. }));

        let err = decode(r#"{"streak_count": 4, "longest_streak": 2, "last_study_date": "2024-03-01"}"#)
            .validated(&settings())
            .unwrap_err();
        assert!(matches!(err, ProgressError::StreakExceedsLongest { .. }));
    }

    #[test]
    fn serde_round_trip_keeps_topic_keys() {
        let mut state = ProgressState::default();
        state.record_topic_answer(TopicId::new(4), true);
        state.unlock(AchievementId::FirstSession);
        let json = serde_json::to_string(&state).unwrap();
        let back: ProgressState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
