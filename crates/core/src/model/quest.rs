use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::model::TopicId;

/// Answers needed for the daily quiz quest.
pub const DAILY_ANSWER_TARGET: u32 = 5;
/// Answers on the focus topic needed for the daily practice quest.
pub const TOPIC_PRACTICE_TARGET: u32 = 3;
/// Strong sessions needed for the weekly mastery quest.
pub const WEEKLY_STRONG_SESSIONS: u32 = 3;
/// Session accuracy that counts as strong for the weekly quest.
pub const STRONG_SESSION_PCT: u8 = 70;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestError {
    #[error("quest {id} has a zero target")]
    ZeroTarget { id: String },

    #[error("quest {id} is complete but still active ({progress}/{target})")]
    StillActive {
        id: String,
        progress: u32,
        target: u32,
    },

    #[error("quest {0} appears twice")]
    Duplicate(String),
}

/// What a quest asks the learner to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestGoal {
    /// Answer questions in any mode.
    AnswerQuestions,
    /// Answer questions on one topic.
    PracticeTopic { topic: TopicId },
    /// Finish a daily challenge with at least one answer.
    ReviewSession,
    /// Finish sessions at or above an accuracy.
    StrongSessions { min_accuracy_pct: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestCadence {
    Daily,
    Weekly,
}

/// What one applied session contributes towards quests.
#[derive(Debug, Clone, Default)]
pub struct QuestActivity {
    pub answered: u32,
    pub answered_by_topic: BTreeMap<TopicId, u32>,
    /// The session was a daily challenge.
    pub review: bool,
    /// Rounded-down session accuracy; `None` when nothing was answered.
    pub accuracy_pct: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    id: String,
    goal: QuestGoal,
    cadence: QuestCadence,
    target: u32,
    progress: u32,
    xp_reward: u64,
    /// Last study day the quest can be worked on.
    expires_on: NaiveDate,
}

impl Quest {
    fn daily(id: String, goal: QuestGoal, target: u32, xp_reward: u64, today: NaiveDate) -> Self {
        Self {
            id,
            goal,
            cadence: QuestCadence::Daily,
            target,
            progress: 0,
            xp_reward,
            expires_on: today,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn goal(&self) -> QuestGoal {
        self.goal
    }

    #[must_use]
    pub fn cadence(&self) -> QuestCadence {
        self.cadence
    }

    #[must_use]
    pub fn target(&self) -> u32 {
        self.target
    }

    #[must_use]
    pub fn progress(&self) -> u32 {
        self.progress
    }

    #[must_use]
    pub fn xp_reward(&self) -> u64 {
        self.xp_reward
    }

    #[must_use]
    pub fn expires_on(&self) -> NaiveDate {
        self.expires_on
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress >= self.target
    }

    fn contribution(&self, activity: &QuestActivity) -> u32 {
        match self.goal {
            QuestGoal::AnswerQuestions => activity.answered,
            QuestGoal::PracticeTopic { topic } => {
                activity.answered_by_topic.get(&topic).copied().unwrap_or(0)
            }
            QuestGoal::ReviewSession => u32::from(activity.review && activity.answered > 0),
            QuestGoal::StrongSessions { min_accuracy_pct } => {
                u32::from(activity.accuracy_pct.is_some_and(|pct| pct >= min_accuracy_pct))
            }
        }
    }
}

impl fmt::Display for Quest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.goal {
            QuestGoal::AnswerQuestions => write!(f, "Answer {} questions", self.target),
            QuestGoal::PracticeTopic { topic } => {
                write!(f, "Answer {} questions on topic {topic}", self.target)
            }
            QuestGoal::ReviewSession => f.write_str("Complete a daily challenge"),
            QuestGoal::StrongSessions { min_accuracy_pct } => write!(
                f,
                "Finish {} sessions at {min_accuracy_pct}%+ this week",
                self.target
            ),
        }
    }
}

/// Monday of the ISO week containing `day`.
#[must_use]
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// Active daily and weekly quests plus the lifetime completion count.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestBoard {
    active: Vec<Quest>,
    daily_issued_on: Option<NaiveDate>,
    weekly_issued_for: Option<NaiveDate>,
    completed: u32,
}

impl QuestBoard {
    /// Drops expired quests and issues today's dailies and this week's
    /// weekly quest if they have not been issued yet. Returns how many
    /// quests were issued.
    ///
    /// `focus_topic` is the topic the practice quest targets; without one
    /// that quest is not issued.
    pub fn refresh(&mut self, today: NaiveDate, focus_topic: Option<TopicId>) -> usize {
        self.active.retain(|q| q.expires_on >= today);
        let before = self.active.len();

        if self.daily_issued_on != Some(today) {
            self.active.push(Quest::daily(
                format!("daily-quiz-{today}"),
                QuestGoal::AnswerQuestions,
                DAILY_ANSWER_TARGET,
                25,
                today,
            ));
            if let Some(topic) = focus_topic {
                self.active.push(Quest::daily(
                    format!("topic-practice-{today}"),
                    QuestGoal::PracticeTopic { topic },
                    TOPIC_PRACTICE_TARGET,
                    15,
                    today,
                ));
            }
            self.active.push(Quest::daily(
                format!("review-{today}"),
                QuestGoal::ReviewSession,
                1,
                20,
                today,
            ));
            self.daily_issued_on = Some(today);
        }

        let monday = week_start(today);
        if self.weekly_issued_for != Some(monday) {
            self.active.push(Quest {
                id: format!("weekly-mastery-{monday}"),
                goal: QuestGoal::StrongSessions {
                    min_accuracy_pct: STRONG_SESSION_PCT,
                },
                cadence: QuestCadence::Weekly,
                target: WEEKLY_STRONG_SESSIONS,
                progress: 0,
                xp_reward: 100,
                expires_on: monday + Duration::days(6),
            });
            self.weekly_issued_for = Some(monday);
        }

        self.active.len() - before
    }

    /// Advances every active quest by what `activity` contributes.
    ///
    /// Quests that reach their target are removed from the board and
    /// returned, in board order.
    pub fn record(&mut self, activity: &QuestActivity) -> Vec<Quest> {
        for quest in &mut self.active {
            let step = quest.contribution(activity);
            quest.progress = quest.progress.saturating_add(step).min(quest.target);
        }
        let (done, open): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.active).into_iter().partition(Quest::is_complete);
        self.active = open;
        self.completed = self
            .completed
            .saturating_add(u32::try_from(done.len()).unwrap_or(u32::MAX));
        done
    }

    #[must_use]
    pub fn active(&self) -> &[Quest] {
        &self.active
    }

    /// Quests completed over the learner's lifetime.
    #[must_use]
    pub fn completed_count(&self) -> u32 {
        self.completed
    }

    /// Checks board invariants, typically after deserialization.
    ///
    /// # Errors
    ///
    /// Returns `QuestError` for the first offending quest.
    pub fn validate(&self) -> Result<(), QuestError> {
        let mut seen = std::collections::BTreeSet::new();
        for quest in &self.active {
            if quest.target == 0 {
                return Err(QuestError::ZeroTarget {
                    id: quest.id.clone(),
                });
            }
            if quest.is_complete() {
                return Err(QuestError::StillActive {
                    id: quest.id.clone(),
                    progress: quest.progress,
                    target: quest.target,
                });
            }
            if !seen.insert(quest.id.as_str()) {
                return Err(QuestError::Duplicate(quest.id.clone()));
            }
        }
        Ok(())
    }
}
