use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, BTreeSet};

use quiz_core::model::{Catalog, Question, QuestionId, QuizMode, TopicId};
use quiz_core::scheduler::ReviewPriority;
use quiz_core::store::QuestionStore;

use crate::error::SelectionError;
use crate::report::weakest_topic;

/// Selection result for a session build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub mode: QuizMode,
    pub questions: Vec<QuestionId>,
    pub due_selected: usize,
    pub backfilled: usize,
    /// Topics a weak-area drill targeted; empty for other modes.
    pub target_topics: Vec<TopicId>,
}

impl SessionPlan {
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    id: QuestionId,
    topic: TopicId,
    next_due: DateTime<Utc>,
    priority: ReviewPriority,
    mastery: f64,
}

/// Picks the next batch of questions for a quiz mode.
///
/// Due questions come first, most overdue and most-missed first. Short
/// batches are topped up with the least-mastered questions of the pool.
pub struct SessionSelector<'a> {
    catalog: &'a Catalog,
    store: &'a QuestionStore,
    shuffle_backfill: bool,
}

impl<'a> SessionSelector<'a> {
    #[must_use]
    pub fn new(catalog: &'a Catalog, store: &'a QuestionStore) -> Self {
        Self {
            catalog,
            store,
            shuffle_backfill: false,
        }
    }

    /// Shuffle backfill candidates before ranking so equal-mastery ties vary.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle_backfill = shuffle;
        self
    }

    /// Ordered question ids for a session of `mode`, at most `n` long.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::ZeroCount` when `n` is 0.
    pub fn select(
        &self,
        mode: QuizMode,
        n: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuestionId>, SelectionError> {
        self.plan(mode, n, now).map(|plan| plan.questions)
    }

    /// Same as [`select`](Self::select) with the mode given by name.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::UnknownMode` for an unrecognised mode name and
    /// `ZeroCount` when `n` is 0.
    pub fn select_named(
        &self,
        mode: &str,
        n: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuestionId>, SelectionError> {
        let mode: QuizMode = mode
            .parse()
            .map_err(|_| SelectionError::UnknownMode(mode.to_owned()))?;
        self.select(mode, n, now)
    }

    /// Build the full plan, including how the batch was filled.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::ZeroCount` when `n` is 0.
    pub fn plan(
        &self,
        mode: QuizMode,
        n: usize,
        now: DateTime<Utc>,
    ) -> Result<SessionPlan, SelectionError> {
        if n == 0 {
            return Err(SelectionError::ZeroCount);
        }

        let target_topics = self.target_topics(mode);
        let pool: Vec<Candidate> = self
            .catalog
            .questions()
            .filter(|q| target_topics.is_empty() || target_topics.contains(&q.topic()))
            .map(|q| self.candidate(q, now))
            .collect();

        let (mut due, mut rest): (Vec<_>, Vec<_>) =
            pool.into_iter().partition(|c| c.next_due <= now);

        due.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        due.truncate(n);
        let due_selected = due.len();

        if self.shuffle_backfill {
            rest.shuffle(&mut rng());
        } else {
            rest.sort_by(|a, b| a.id.cmp(&b.id));
        }
        // stable: ties keep the shuffled or id order
        rest.sort_by(|a, b| {
            a.mastery
                .total_cmp(&b.mastery)
                .then_with(|| a.next_due.cmp(&b.next_due))
        });
        let backfill: Vec<Candidate> = rest.into_iter().take(n - due_selected).collect();
        let backfilled = backfill.len();

        let mut selected = due;
        selected.extend(backfill);
        if mode == QuizMode::Interleaved {
            selected = interleave(selected);
        }

        Ok(SessionPlan {
            mode,
            questions: selected.into_iter().map(|c| c.id).collect(),
            due_selected,
            backfilled,
            target_topics: target_topics.into_iter().collect(),
        })
    }

    fn candidate(&self, question: &Question, now: DateTime<Utc>) -> Candidate {
        match self.store.peek(question.id()) {
            Some(record) => Candidate {
                id: question.id().clone(),
                topic: question.topic(),
                next_due: record.next_due(),
                priority: self.store.scheduler().priority(record, now),
                mastery: record.mastery(),
            },
            // unseen questions are due now with no history
            None => Candidate {
                id: question.id().clone(),
                topic: question.topic(),
                next_due: now,
                priority: ReviewPriority {
                    overdue: chrono::Duration::zero(),
                    misses: 0,
                },
                mastery: 0.0,
            },
        }
    }

    /// Topics a mode is restricted to; empty means the whole catalog.
    fn target_topics(&self, mode: QuizMode) -> BTreeSet<TopicId> {
        if mode != QuizMode::WeakAreaDrill {
            return BTreeSet::new();
        }
        let flagged: BTreeSet<TopicId> = self
            .store
            .weak_topics()
            .iter()
            .copied()
            .filter(|t| self.catalog.topic(*t).is_some())
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }
        weakest_topic(self.catalog, self.store).into_iter().collect()
    }
}

/// Reorder so no two neighbours share a topic where possible.
///
/// Walks the ranked list and at each step takes, in order of preference:
/// the first item of a topic that would otherwise be left with too many
/// items to separate; the next ranked item if its topic differs from the
/// previous one; the earliest-due item of another topic. When every
/// remaining item shares the previous topic the constraint is dropped.
fn interleave(ranked: Vec<Candidate>) -> Vec<Candidate> {
    let mut remaining = ranked;
    let mut out = Vec::with_capacity(remaining.len());
    let mut last: Option<TopicId> = None;

    while !remaining.is_empty() {
        let mut counts: BTreeMap<TopicId, usize> = BTreeMap::new();
        for c in &remaining {
            *counts.entry(c.topic).or_default() += 1;
        }
        let majority = remaining
            .iter()
            .map(|c| c.topic)
            .find(|t| counts[t] * 2 > remaining.len() && Some(*t) != last);

        let idx = if let Some(topic) = majority {
            remaining.iter().position(|c| c.topic == topic)
        } else if Some(remaining[0].topic) != last {
            Some(0)
        } else {
            remaining
                .iter()
                .enumerate()
                .filter(|(_, c)| Some(c.topic) != last)
                .min_by(|(ia, a), (ib, b)| a.next_due.cmp(&b.next_due).then(ia.cmp(ib)))
                .map(|(i, _)| i)
        }
        .unwrap_or(0);

        let picked = remaining.remove(idx);
        last = Some(picked.topic);
        out.push(picked);
    }
    out
}
