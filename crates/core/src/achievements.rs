//! Declarative achievement table.
//!
//! Each rule pairs a predicate over the just-finished session with the
//! achievement it unlocks. Rules are evaluated once per session, in order.

use crate::model::{AchievementId, Confidence, ProgressState, SessionResult};

/// Everything an achievement predicate may look at.
#[derive(Debug, Clone, Copy)]
pub struct AchievementContext<'a> {
    pub session: &'a SessionResult,
    /// Progress after XP, streak, totals and quests for this session were applied.
    pub progress: &'a ProgressState,
    /// Weak topics whose drill flag this session cleared.
    pub cleared_weak_topics: usize,
}

#[derive(Clone, Copy)]
pub struct AchievementRule {
    pub id: AchievementId,
    pub predicate: fn(&AchievementContext<'_>) -> bool,
}

impl std::fmt::Debug for AchievementRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AchievementRule").field("id", &self.id).finish()
    }
}

pub const ACHIEVEMENT_RULES: &[AchievementRule] = &[
    AchievementRule {
        id: AchievementId::FirstSession,
        predicate: |ctx| ctx.session.answered() > 0,
    },
    AchievementRule {
        id: AchievementId::PerfectScore,
        predicate: |ctx| ctx.session.accuracy() == Some(1.0),
    },
    AchievementRule {
        id: AchievementId::ExcellentPerformance,
        predicate: |ctx| ctx.session.accuracy().is_some_and(|acc| acc >= 0.9),
    },
    AchievementRule {
        id: AchievementId::CenturyClub,
        predicate: |ctx| ctx.progress.total_answered() >= 100,
    },
    AchievementRule {
        id: AchievementId::WeekStreak,
        predicate: |ctx| ctx.progress.streak_count() >= 7,
    },
    AchievementRule {
        id: AchievementId::ConfidentAndCorrect,
        predicate: |ctx| {
            let answers = ctx.session.answers();
            answers.len() >= 5
                && answers
                    .iter()
                    .all(|a| a.correct && a.confidence == Confidence::High)
        },
    },
    AchievementRule {
        id: AchievementId::LevelFive,
        predicate: |ctx| ctx.progress.level() >= 5,
    },
    AchievementRule {
        id: AchievementId::WeakAreaCleared,
        predicate: |ctx| ctx.cleared_weak_topics > 0,
    },
    AchievementRule {
        id: AchievementId::QuestApprentice,
        predicate: |ctx| ctx.progress.quests().completed_count() >= 5,
    },
    AchievementRule {
        id: AchievementId::QuestAdept,
        predicate: |ctx| ctx.progress.quests().completed_count() >= 15,
    },
    AchievementRule {
        id: AchievementId::QuestVeteran,
        predicate: |ctx| ctx.progress.quests().completed_count() >= 25,
    },
    AchievementRule {
        id: AchievementId::QuestLegend,
        predicate: |ctx| ctx.progress.quests().completed_count() >= 40,
    },
];

/// Achievements satisfied by `ctx` that `ctx.progress` does not hold yet.
#[must_use]
pub fn newly_satisfied(rules: &[AchievementRule], ctx: &AchievementContext<'_>) -> Vec<AchievementId> {
    rules
        .iter()
        .filter(|rule| !ctx.progress.has_achievement(rule.id))
        .filter(|rule| (rule.predicate)(ctx))
        .map(|rule| rule.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerEvent, QuestionId, QuizMode, SessionId};
    use crate::time::fixed_now;
    use std::time::Duration;

    fn session(results: &[(bool, Confidence)]) -> SessionResult {
        let answers = results
            .iter()
            .enumerate()
            .map(|(i, &(correct, confidence))| {
                AnswerEvent::new(
                    QuestionId::new(format!("q{i}")),
                    correct,
                    confidence,
                    Duration::from_secs(3),
                )
            })
            .collect();
        SessionResult::new(
            SessionId::generate(),
            QuizMode::Random,
            fixed_now(),
            fixed_now(),
            answers,
            false,
        )
        .unwrap()
    }

    #[test]
    fn perfect_confident_session_unlocks_expected_set() {
        let s = session(&[(true, Confidence::High); 5]);
        let progress = ProgressState::default();
        let ctx = AchievementContext {
            session: &s,
            progress: &progress,
            cleared_weak_topics: 0,
        };
        let ids = newly_satisfied(ACHIEVEMENT_RULES, &ctx);
        assert_eq!(
            ids,
            vec![
                AchievementId::FirstSession,
                AchievementId::PerfectScore,
                AchievementId::ExcellentPerformance,
                AchievementId::ConfidentAndCorrect,
            ]
        );
    }

    #[test]
    fn already_unlocked_are_skipped() {
        let s = session(&[(true, Confidence::Low), (false, Confidence::Low)]);
        let mut progress = ProgressState::default();
        progress.unlock(AchievementId::FirstSession);
        let ctx = AchievementContext {
            session: &s,
            progress: &progress,
            cleared_weak_topics: 1,
        };
        assert_eq!(
            newly_satisfied(ACHIEVEMENT_RULES, &ctx),
            vec![AchievementId::WeakAreaCleared]
        );
    }

    #[test]
    fn empty_session_unlocks_nothing() {
        let s = session(&[]);
        let progress = ProgressState::default();
        let ctx = AchievementContext {
            session: &s,
            progress: &progress,
            cleared_weak_topics: 0,
        };
        assert!(newly_satisfied(ACHIEVEMENT_RULES, &ctx).is_empty());
    }
}
