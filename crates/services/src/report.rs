//! Study statistics and the instructor gradebook export.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use quiz_core::model::{Catalog, Quest, QuestionId, TopicId};
use quiz_core::store::QuestionStore;

use crate::context::StudyContext;
use crate::error::ReportError;

/// Topic with the lowest answer accuracy; untried topics count as 0%.
///
/// Ties go to the lowest topic id. `None` only for a catalog without topics.
#[must_use]
pub fn weakest_topic(catalog: &Catalog, store: &QuestionStore) -> Option<TopicId> {
    catalog
        .topics()
        .map(|t| {
            let accuracy = store.topic_tally(t.id()).accuracy().unwrap_or(0.0);
            (t.id(), accuracy)
        })
        .min_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ia.cmp(ib)))
        .map(|(id, _)| id)
}

/// Mean mastery over a set of questions, unseen ones counting as 0.
fn mean_mastery<'a>(store: &QuestionStore, ids: impl Iterator<Item = &'a QuestionId>) -> f64 {
    let (sum, count) = ids.fold((0.0, 0u32), |(sum, count), id| {
        let mastery = store.peek(id).map_or(0.0, |r| r.mastery());
        (sum + mastery, count + 1)
    });
    if count == 0 { 0.0 } else { sum / f64::from(count) }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStats {
    pub topic: TopicId,
    pub name: String,
    pub correct: u32,
    pub total: u32,
    pub accuracy: Option<f64>,
    /// Mean question mastery, 0-100.
    pub mastery_pct: u8,
    pub due: usize,
    pub weak: bool,
}

/// Snapshot of how the learner is doing, for the stats screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyStats {
    pub answered: u64,
    pub correct: u64,
    pub overall_accuracy: Option<f64>,
    pub level: u32,
    pub xp: u64,
    pub streak: u32,
    pub longest_streak: u32,
    pub streak_freezes: u32,
    pub sessions_completed: u32,
    pub achievements: usize,
    /// Summed answer response times, in whole seconds.
    pub study_time_secs: u64,
    pub quests_completed: u32,
    pub active_quests: Vec<Quest>,
    /// Mean mastery across the whole catalog, 0-100.
    pub exam_readiness: u8,
    pub due_now: usize,
    pub weakest_topic: Option<TopicId>,
    pub topics: Vec<TopicStats>,
}

impl StudyStats {
    #[must_use]
    pub fn compute(ctx: &StudyContext, catalog: &Catalog, now: DateTime<Utc>) -> Self {
        let is_due = |id: &QuestionId| ctx.store.peek(id).is_none_or(|r| r.is_due(now));

        let topics = catalog
            .topics()
            .map(|topic| {
                let tally = ctx.store.topic_tally(topic.id());
                TopicStats {
                    topic: topic.id(),
                    name: topic.name().to_owned(),
                    correct: tally.correct,
                    total: tally.total,
                    accuracy: tally.accuracy(),
                    mastery_pct: percent(mean_mastery(&ctx.store, topic.question_ids().iter())),
                    due: topic.question_ids().iter().filter(|&id| is_due(id)).count(),
                    weak: ctx.store.is_weak(topic.id()),
                }
            })
            .collect();

        let progress = &ctx.progress;
        Self {
            answered: progress.total_answered(),
            correct: progress.total_correct(),
            overall_accuracy: progress.overall_accuracy(),
            level: progress.level(),
            xp: progress.xp(),
            streak: progress.streak_count(),
            longest_streak: progress.longest_streak(),
            streak_freezes: progress.streak_freezes(),
            sessions_completed: progress.sessions_completed(),
            achievements: progress.achievements().len(),
            study_time_secs: progress.study_time().as_secs(),
            quests_completed: progress.quests().completed_count(),
            active_quests: progress.quests().active().to_vec(),
            exam_readiness: percent(mean_mastery(&ctx.store, catalog.questions().map(|q| q.id()))),
            due_now: catalog.questions().filter(|q| is_due(q.id())).count(),
            weakest_topic: weakest_topic(catalog, &ctx.store),
            topics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradebookSummary {
    pub total_questions_answered: u64,
    pub correct_answers: u64,
    pub overall_accuracy_pct: f64,
    pub exam_readiness_score: u8,
    pub current_level: u32,
    pub total_xp: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub sessions_completed: u32,
    pub time_spent_minutes: f64,
    pub quests_completed: u32,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMasteryEntry {
    pub name: String,
    pub mastery_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicAccuracyEntry {
    pub correct: u32,
    pub total: u32,
    pub accuracy_pct: f64,
}

/// Instructor-facing export, keyed by topic id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradebookReport {
    pub student_name: String,
    pub export_date: DateTime<Utc>,
    pub summary: GradebookSummary,
    pub topic_mastery: BTreeMap<TopicId, TopicMasteryEntry>,
    pub topic_accuracy: BTreeMap<TopicId, TopicAccuracyEntry>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl GradebookReport {
    #[must_use]
    pub fn build(
        ctx: &StudyContext,
        catalog: &Catalog,
        student_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let stats = StudyStats::compute(ctx, catalog, now);
        let progress = &ctx.progress;

        let topic_mastery = stats
            .topics
            .iter()
            .map(|t| {
                (
                    t.topic,
                    TopicMasteryEntry {
                        name: t.name.clone(),
                        mastery_percent: t.mastery_pct,
                    },
                )
            })
            .collect();
        let topic_accuracy = catalog
            .topics()
            .map(|topic| {
                let tally = progress
                    .topic_accuracy()
                    .get(&topic.id())
                    .copied()
                    .unwrap_or_default();
                (
                    topic.id(),
                    TopicAccuracyEntry {
                        correct: tally.correct,
                        total: tally.total,
                        accuracy_pct: round2(tally.accuracy().unwrap_or(0.0) * 100.0),
                    },
                )
            })
            .collect();

        Self {
            student_name: student_name
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("Guest")
                .to_owned(),
            export_date: now,
            summary: GradebookSummary {
                total_questions_answered: stats.answered,
                correct_answers: stats.correct,
                overall_accuracy_pct: round2(stats.overall_accuracy.unwrap_or(0.0) * 100.0),
                exam_readiness_score: stats.exam_readiness,
                current_level: stats.level,
                total_xp: stats.xp,
                current_streak: stats.streak,
                longest_streak: stats.longest_streak,
                sessions_completed: stats.sessions_completed,
                time_spent_minutes: round1(progress.study_time().as_secs_f64() / 60.0),
                quests_completed: stats.quests_completed,
                achievements: progress
                    .achievements()
                    .iter()
                    .map(|a| a.title().to_owned())
                    .collect(),
            },
            topic_mastery,
            topic_accuracy,
        }
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Two-section CSV for spreadsheets: metric/value rows, then one row
    /// per topic.
    ///
    /// # Errors
    ///
    /// Returns `ReportError` if a row cannot be written.
    pub fn to_csv(&self) -> Result<String, ReportError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        let summary = &self.summary;

        writer.write_record(["Metric", "Value"])?;
        let metrics = [
            ("Student Name", self.student_name.clone()),
            ("Total Questions", summary.total_questions_answered.to_string()),
            ("Correct Answers", summary.correct_answers.to_string()),
            ("Overall Accuracy (%)", format!("{:.1}", summary.overall_accuracy_pct)),
            ("Exam Readiness (%)", summary.exam_readiness_score.to_string()),
            ("Current Level", summary.current_level.to_string()),
            ("Total XP", summary.total_xp.to_string()),
            ("Current Streak", summary.current_streak.to_string()),
            ("Time Spent (min)", format!("{:.1}", summary.time_spent_minutes)),
            ("Quests Completed", summary.quests_completed.to_string()),
        ];
        for (metric, value) in &metrics {
            writer.write_record([*metric, value.as_str()])?;
        }

        writer.write_record(["Topic", "Mastery %", "Accuracy %", "Questions"])?;
        for (topic, mastery) in &self.topic_mastery {
            let accuracy = self.topic_accuracy.get(topic);
            writer.write_record([
                mastery.name.clone(),
                mastery.mastery_percent.to_string(),
                format!("{:.1}", accuracy.map_or(0.0, |a| a.accuracy_pct)),
                accuracy.map_or(0, |a| a.total).to_string(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| ReportError::Csv(err.into_error().into()))?;
        Ok(String::from_utf8(bytes)?)
    }
}
