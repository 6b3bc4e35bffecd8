use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::{
    Confidence, ProgressError, QuestionId, QuestionRecord, RecordError, TopicId, TopicTally,
};
use crate::scheduler::{ScheduleOutcome, Scheduler};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    #[error("store snapshot is corrupt: {0}")]
    DataCorruption(String),
}

impl From<RecordError> for StoreError {
    fn from(err: RecordError) -> Self {
        StoreError::DataCorruption(err.to_string())
    }
}

impl From<ProgressError> for StoreError {
    fn from(err: ProgressError) -> Self {
        StoreError::DataCorruption(format!("progress: {err}"))
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Serializable image of the store, handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub records: Vec<QuestionRecord>,
    #[serde(default)]
    pub weak_topics: Vec<TopicId>,
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

/// Owns every `QuestionRecord` and the weak-topic flags.
#[derive(Debug, Clone, Default)]
pub struct QuestionStore {
    records: BTreeMap<QuestionId, QuestionRecord>,
    weak_topics: BTreeSet<TopicId>,
    scheduler: Scheduler,
}

impl QuestionStore {
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            records: BTreeMap::new(),
            weak_topics: BTreeSet::new(),
            scheduler,
        }
    }

    /// Rebuild a store from a snapshot, checking every record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` for duplicate ids or records that
    /// break their invariants. Callers fall back to an empty store.
    pub fn load(snapshot: StoreSnapshot, scheduler: Scheduler) -> Result<Self, StoreError> {
        let mut records = BTreeMap::new();
        for record in snapshot.records {
            record.validate()?;
            let id = record.question_id().clone();
            if records.insert(id.clone(), record).is_some() {
                return Err(StoreError::DataCorruption(format!(
                    "question {id} appears twice"
                )));
            }
        }
        Ok(Self {
            records,
            weak_topics: snapshot.weak_topics.into_iter().collect(),
            scheduler,
        })
    }

    /// Snapshot of all records (ordered by id) and weak-topic flags.
    #[must_use]
    pub fn export(&self) -> StoreSnapshot {
        StoreSnapshot {
            records: self.records.values().cloned().collect(),
            weak_topics: self.weak_topics.iter().copied().collect(),
        }
    }

    /// Record for `id`, created with defaults (due at `now`) on first access.
    pub fn get(&mut self, id: &QuestionId, topic: TopicId, now: DateTime<Utc>) -> &QuestionRecord {
        self.records
            .entry(id.clone())
            .or_insert_with(|| QuestionRecord::new(id.clone(), topic, now))
    }

    /// Read-only lookup that never creates a record.
    #[must_use]
    pub fn peek(&self, id: &QuestionId) -> Option<&QuestionRecord> {
        self.records.get(id)
    }

    /// Apply one answer to a question's record and reschedule it.
    pub fn update(
        &mut self,
        id: &QuestionId,
        topic: TopicId,
        correct: bool,
        confidence: Confidence,
        now: DateTime<Utc>,
    ) -> ScheduleOutcome {
        let record = self
            .records
            .entry(id.clone())
            .or_insert_with(|| QuestionRecord::new(id.clone(), topic, now));
        let outcome = self.scheduler.apply(record, correct, confidence, now);
        if outcome.flag_weak_topic {
            self.weak_topics.insert(record.topic());
        }
        outcome
    }

    pub fn records(&self) -> impl Iterator<Item = &QuestionRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn weak_topics(&self) -> &BTreeSet<TopicId> {
        &self.weak_topics
    }

    #[must_use]
    pub fn is_weak(&self, topic: TopicId) -> bool {
        self.weak_topics.contains(&topic)
    }

    /// Clears a topic's drill flag; returns whether it was set.
    pub fn clear_weak_topic(&mut self, topic: TopicId) -> bool {
        self.weak_topics.remove(&topic)
    }

    /// Aggregate correct/total over a topic's records.
    #[must_use]
    pub fn topic_tally(&self, topic: TopicId) -> TopicTally {
        self.records
            .values()
            .filter(|r| r.topic() == topic)
            .fold(TopicTally::default(), |mut acc, r| {
                acc.correct = acc.correct.saturating_add(r.total_correct());
                acc.total = acc.total.saturating_add(r.total_attempts());
                acc
            })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn q(id: &str) -> QuestionId {
        QuestionId::new(id)
    }

    #[test]
    fn get_creates_default_record_once() {
        let mut store = QuestionStore::default();
        let now = fixed_now();
        let first = store.get(&q("a"), TopicId::new(1), now).clone();
        assert_eq!(first.next_due(), now);

        let later = now + Duration::days(3);
        let again = store.get(&q("a"), TopicId::new(1), later);
        assert_eq!(again.next_due(), now);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_keeps_count_invariants() {
        let mut store = QuestionStore::default();
        let mut now = fixed_now();
        let mut last_attempts = 0;
        for (i, correct) in [true, false, true, true, false, false, true].into_iter().enumerate() {
            let confidence = if i % 2 == 0 { Confidence::High } else { Confidence::Low };
            store.update(&q("a"), TopicId::new(1), correct, confidence, now);
            let r = store.peek(&q("a")).unwrap();
            assert!(r.total_attempts() > last_attempts);
            assert!(r.total_correct() <= r.total_attempts());
            assert!(r.next_due() >= r.last_seen().unwrap());
            last_attempts = r.total_attempts();
            now += Duration::hours(30);
        }
    }

    #[test]
    fn three_misses_flag_topic_and_later_success_keeps_flag() {
        let mut store = QuestionStore::default();
        let now = fixed_now();
        let topic = TopicId::new(2);
        for _ in 0..3 {
            store.update(&q("x"), topic, false, Confidence::Medium, now);
        }
        assert!(store.is_weak(topic));

        store.update(&q("x"), topic, true, Confidence::High, now + Duration::days(1));
        assert!(store.is_weak(topic));

        assert!(store.clear_weak_topic(topic));
        assert!(!store.is_weak(topic));
    }

    #[test]
    fn export_then_load_round_trips() {
        let mut store = QuestionStore::default();
        let now = fixed_now();
        store.update(&q("a"), TopicId::new(1), true, Confidence::High, now);
        store.update(&q("b"), TopicId::new(2), false, Confidence::Low, now);
        store.get(&q("c"), TopicId::new(2), now);
        for _ in 0..3 {
            store.update(&q("d"), TopicId::new(3), false, Confidence::Low, now);
        }

        let snapshot = store.export();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: StoreSnapshot = serde_json::from_str(&json).unwrap();
        let loaded = QuestionStore::load(parsed, Scheduler::default()).unwrap();

        assert_eq!(loaded.export(), snapshot);
        let original: Vec<_> = store.records().cloned().collect();
        let restored: Vec<_> = loaded.records().cloned().collect();
        assert_eq!(original, restored);
        assert!(loaded.is_weak(TopicId::new(3)));
    }

    #[test]
    fn load_rejects_duplicates() {
        let now = fixed_now();
        let record = QuestionRecord::new(q("a"), TopicId::new(1), now);
        let snapshot = StoreSnapshot {
            records: vec![record.clone(), record],
            weak_topics: vec![],
        };
        let err = QuestionStore::load(snapshot, Scheduler::default()).unwrap_err();
        assert!(matches!(err, StoreError::DataCorruption(_)));
    }

    #[test]
    fn topic_tally_sums_records() {
        let mut store = QuestionStore::default();
        let now = fixed_now();
        store.update(&q("a"), TopicId::new(1), true, Confidence::High, now);
        store.update(&q("b"), TopicId::new(1), false, Confidence::High, now);
        store.update(&q("c"), TopicId::new(2), true, Confidence::High, now);
        let tally = store.topic_tally(TopicId::new(1));
        assert_eq!((tally.correct, tally.total), (1, 2));
    }
}
