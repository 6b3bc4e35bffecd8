use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use quiz_core::achievements::{ACHIEVEMENT_RULES, AchievementContext, newly_satisfied};
use quiz_core::model::{
    AchievementId, Catalog, ProgressSettings, Quest, QuestActivity, QuestionId, QuizMode,
    SessionId, SessionResult, SettingsError, StreakUpdate, TopicId, TopicTally,
};
use quiz_core::time::study_day;

use crate::context::StudyContext;
use crate::report::weakest_topic;

/// Everything that changed when a session result was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub answered: u32,
    pub correct: u32,
    /// XP from answers and the accuracy bonus.
    pub xp_gained: u64,
    pub accuracy_bonus: bool,
    /// XP from quests this session completed.
    pub quest_xp: u64,
    pub completed_quests: Vec<Quest>,
    pub level_before: u32,
    pub level_after: u32,
    /// `None` when nothing was answered and the day did not count.
    pub streak: Option<StreakUpdate>,
    pub new_achievements: Vec<AchievementId>,
    pub newly_weak_topics: Vec<TopicId>,
    pub cleared_weak_topics: Vec<TopicId>,
    /// Answers whose question is missing from the catalog.
    pub skipped: Vec<QuestionId>,
}

impl SessionOutcome {
    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }

    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.xp_gained + self.quest_xp
    }
}

/// Folds finished sessions into the question store and learner progress.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    settings: ProgressSettings,
}

impl ProgressTracker {
    /// # Errors
    ///
    /// Returns `SettingsError` if the settings are out of range.
    pub fn new(settings: ProgressSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    #[must_use]
    pub fn settings(&self) -> &ProgressSettings {
        &self.settings
    }

    /// Issue today's quests if needed. The practice quest targets the
    /// currently weakest topic. Returns how many quests were issued.
    pub fn refresh_quests(
        &self,
        ctx: &mut StudyContext,
        catalog: &Catalog,
        now: DateTime<Utc>,
    ) -> usize {
        let focus = weakest_topic(catalog, &ctx.store);
        let issued = ctx.progress.quests_mut().refresh(study_day(now), focus);
        if issued > 0 {
            tracing::debug!(issued, focus = ?focus, "quests issued");
        }
        issued
    }

    /// Apply one session result.
    ///
    /// Each answer updates its question record, then XP, streak, totals,
    /// quests, weak-topic flags and achievements are brought up to date.
    /// Abandoned sessions are applied the same way.
    pub fn apply(
        &self,
        ctx: &mut StudyContext,
        catalog: &Catalog,
        result: &SessionResult,
        now: DateTime<Utc>,
    ) -> SessionOutcome {
        self.refresh_quests(ctx, catalog, now);
        let weak_before = ctx.store.weak_topics().clone();
        let mut reflagged = BTreeSet::new();
        let mut skipped = Vec::new();

        let by_topic: BTreeMap<TopicId, TopicTally> = result
            .tally_by(|id| catalog.question(id).map(|q| q.topic()))
            .into_iter()
            .map(|(topic, (correct, total))| (topic, TopicTally { correct, total }))
            .collect();
        let answered: u32 = by_topic.values().map(|t| t.total).sum();
        let correct: u32 = by_topic.values().map(|t| t.correct).sum();

        for event in result.answers() {
            let Some(question) = catalog.question(&event.question_id) else {
                tracing::warn!(
                    session = %result.session_id(),
                    question = %event.question_id,
                    "answer for unknown question skipped"
                );
                skipped.push(event.question_id.clone());
                continue;
            };
            let topic = question.topic();
            let outcome =
                ctx.store
                    .update(&event.question_id, topic, event.correct, event.confidence, now);
            if outcome.flag_weak_topic {
                reflagged.insert(topic);
            }
            ctx.progress.record_topic_answer(topic, event.correct);
        }

        let level_before = ctx.progress.level();
        let mut xp_gained = u64::from(correct) * self.settings.xp_per_correct;
        let accuracy_bonus = answered > 0
            && f64::from(correct) / f64::from(answered) >= self.settings.accuracy_bonus_threshold;
        if accuracy_bonus {
            xp_gained += self.settings.accuracy_bonus_xp;
        }
        ctx.progress.add_xp(xp_gained, &self.settings);

        let streak = (answered > 0).then(|| {
            ctx.progress
                .record_session(answered, correct, result.total_response_time());
            ctx.progress.register_study_day(study_day(now), &self.settings)
        });

        let activity = QuestActivity {
            answered,
            answered_by_topic: by_topic.iter().map(|(t, tally)| (*t, tally.total)).collect(),
            review: result.mode() == QuizMode::DailyChallenge,
            accuracy_pct: (answered > 0)
                .then(|| u8::try_from(correct * 100 / answered).unwrap_or(100)),
        };
        let completed_quests = ctx.progress.quests_mut().record(&activity);
        let quest_xp: u64 = completed_quests.iter().map(Quest::xp_reward).sum();
        ctx.progress.add_xp(quest_xp, &self.settings);
        for quest in &completed_quests {
            tracing::info!(quest = %quest, xp = quest.xp_reward(), "quest completed");
        }

        let cleared_weak_topics = if result.mode() == QuizMode::WeakAreaDrill {
            self.clear_drilled_topics(ctx, &weak_before, &reflagged, &by_topic)
        } else {
            Vec::new()
        };
        let newly_weak_topics: Vec<TopicId> = ctx
            .store
            .weak_topics()
            .difference(&weak_before)
            .copied()
            .collect();

        let achievement_ctx = AchievementContext {
            session: result,
            progress: &ctx.progress,
            cleared_weak_topics: cleared_weak_topics.len(),
        };
        let new_achievements = newly_satisfied(ACHIEVEMENT_RULES, &achievement_ctx);
        for id in &new_achievements {
            ctx.progress.unlock(*id);
            tracing::info!(achievement = %id, "achievement unlocked");
        }

        let outcome = SessionOutcome {
            session_id: result.session_id(),
            answered,
            correct,
            xp_gained,
            accuracy_bonus,
            quest_xp,
            completed_quests,
            level_before,
            level_after: ctx.progress.level(),
            streak,
            new_achievements,
            newly_weak_topics,
            cleared_weak_topics,
            skipped,
        };
        tracing::info!(
            session = %outcome.session_id,
            mode = %result.mode(),
            answered,
            correct,
            xp = outcome.xp_gained,
            quest_xp = outcome.quest_xp,
            level = outcome.level_after,
            abandoned = result.is_abandoned(),
            "session applied"
        );
        outcome
    }

    /// Clear flags on topics this drill covered well enough.
    fn clear_drilled_topics(
        &self,
        ctx: &mut StudyContext,
        weak_before: &BTreeSet<TopicId>,
        reflagged: &BTreeSet<TopicId>,
        by_topic: &BTreeMap<TopicId, TopicTally>,
    ) -> Vec<TopicId> {
        let mut cleared = Vec::new();
        for (topic, tally) in by_topic {
            let passed = tally.total >= self.settings.drill_clear_min_answers
                && tally
                    .accuracy()
                    .is_some_and(|acc| acc >= self.settings.drill_clear_accuracy);
            if passed
                && weak_before.contains(topic)
                && !reflagged.contains(topic)
                && ctx.store.clear_weak_topic(*topic)
            {
                tracing::info!(topic = %topic, "weak topic cleared by drill");
                cleared.push(*topic);
            }
        }
        cleared
    }
}
