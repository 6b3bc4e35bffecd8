use chrono::{DateTime, Utc};

use quiz_core::model::{ProgressSettings, ProgressState};
use quiz_core::scheduler::Scheduler;
use quiz_core::store::{QuestionStore, StoreError};
use storage::Snapshot;

/// Mutable study state threaded through the services: the question store
/// and the learner's progress.
#[derive(Debug, Clone)]
pub struct StudyContext {
    pub store: QuestionStore,
    pub progress: ProgressState,
}

impl StudyContext {
    #[must_use]
    pub fn fresh(scheduler: Scheduler, settings: &ProgressSettings) -> Self {
        Self {
            store: QuestionStore::new(scheduler),
            progress: ProgressState::new(settings),
        }
    }

    /// Rebuild state from a persisted snapshot. The level is recomputed
    /// from XP under `settings`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the records or the progress
    /// totals break their invariants.
    pub fn from_snapshot(
        snapshot: Snapshot,
        scheduler: Scheduler,
        settings: &ProgressSettings,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            store: QuestionStore::load(snapshot.store, scheduler)?,
            progress: snapshot.progress.validated(settings)?,
        })
    }

    #[must_use]
    pub fn to_snapshot(&self, saved_at: DateTime<Utc>) -> Snapshot {
        Snapshot::new(saved_at, self.store.export(), self.progress.clone())
    }
}
