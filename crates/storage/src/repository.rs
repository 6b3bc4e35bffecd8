use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::ProgressState;
use quiz_core::store::StoreSnapshot;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::json::{self, JsonFileRepository};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No snapshot has been saved yet.
    #[error("no saved snapshot")]
    NotFound,

    #[error("snapshot is corrupt: {0}")]
    DataCorruption(String),

    #[error("snapshot i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Everything persisted between runs: question records, weak-topic flags and
/// learner progress.
///
/// On disk this is wrapped in a tagged envelope (see [`crate::json`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    pub store: StoreSnapshot,
    pub progress: ProgressState,
}

impl Snapshot {
    #[must_use]
    pub fn new(saved_at: DateTime<Utc>, store: StoreSnapshot, progress: ProgressState) -> Self {
        Self {
            saved_at,
            store,
            progress,
        }
    }
}

/// Load/save contract for the single study snapshot.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Read the last saved snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` on first run, `DataCorruption` if the
    /// stored data cannot be decoded, or `Io` for read failures.
    async fn load(&self) -> Result<Snapshot, StorageError>;

    /// Replace the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the snapshot cannot be written.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}

/// In-memory repository for tests and throwaway runs.
///
/// Holds the encoded document rather than the value so loads go through the
/// same decoder as the file repository.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    document: Arc<Mutex<Option<String>>>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-seeded with a raw document, valid or not.
    #[must_use]
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(document.into()))),
            fail_saves: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every following `save` fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Raw stored document, if any.
    #[must_use]
    pub fn document(&self) -> Option<String> {
        self.document.lock().ok().and_then(|guard| guard.clone())
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Io(io::Error::other(err.to_string()))
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn load(&self) -> Result<Snapshot, StorageError> {
        let guard = self.document.lock().map_err(poisoned)?;
        match guard.as_deref() {
            Some(text) => json::decode(text),
            None => Err(StorageError::NotFound),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "saves disabled",
            )));
        }
        let text = json::encode(snapshot)?;
        let mut guard = self.document.lock().map_err(poisoned)?;
        *guard = Some(text);
        Ok(())
    }
}

/// Snapshot backend behind a trait object for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub snapshots: Arc<dyn SnapshotRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            snapshots: Arc::new(InMemoryRepository::new()),
        }
    }

    #[must_use]
    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Self {
            snapshots: Arc::new(JsonFileRepository::new(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Confidence, QuestionId, TopicId};
    use quiz_core::store::QuestionStore;
    use quiz_core::time::fixed_now;

    fn sample_snapshot() -> Snapshot {
        let mut store = QuestionStore::default();
        let now = fixed_now();
        store.update(&QuestionId::new("q1"), TopicId::new(1), true, Confidence::High, now);
        store.update(&QuestionId::new("q2"), TopicId::new(2), false, Confidence::Low, now);
        Snapshot::new(now, store.export(), ProgressState::default())
    }

    #[tokio::test]
    async fn empty_repository_reports_not_found() {
        let repo = InMemoryRepository::new();
        assert!(matches!(repo.load().await, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn round_trips_snapshot() {
        let repo = InMemoryRepository::new();
        let snapshot = sample_snapshot();
        repo.save(&snapshot).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, snapshot);
        assert!(repo.document().unwrap().contains("\"quiz-snapshot\""));
    }

    #[tokio::test]
    async fn failing_saves_surface_io_and_keep_previous_document() {
        let repo = InMemoryRepository::new();
        let snapshot = sample_snapshot();
        repo.save(&snapshot).await.unwrap();

        repo.set_fail_saves(true);
        let err = repo.save(&snapshot).await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(repo.load().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn garbage_document_is_corruption() {
        let repo = InMemoryRepository::with_document("{not json");
        assert!(matches!(
            repo.load().await,
            Err(StorageError::DataCorruption(_))
        ));
    }

    #[test]
    fn storage_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Storage>();
        assert_send_sync::<InMemoryRepository>();
    }
}
