use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quiz_core::model::{Catalog, QuizMode, SessionResult, StudySettings};
use quiz_core::scheduler::Scheduler;
use storage::{Storage, StorageError};

use crate::Clock;
use crate::context::StudyContext;
use crate::error::{SelectionError, StudyServicesError};
use crate::progress_service::{ProgressTracker, SessionOutcome};
use crate::report::{GradebookReport, StudyStats};
use crate::sessions::{SessionPlan, SessionRecorder, SessionSelector};

/// How startup state was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No snapshot existed; starting fresh.
    FirstRun,
    Restored,
    /// The snapshot was unusable and empty state was used instead.
    Recovered { reason: String },
}

/// Result of a checkpoint save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    /// The save failed; state stays in memory only for the rest of the run.
    Degraded { reason: String },
    /// Persistence was already degraded, nothing was written.
    Skipped,
}

impl SaveStatus {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveStatus::Saved)
    }
}

/// Assembles the study services around one catalog and snapshot backend.
#[derive(Clone)]
pub struct StudyServices {
    clock: Clock,
    catalog: Arc<Catalog>,
    storage: Storage,
    scheduler: Scheduler,
    tracker: ProgressTracker,
    shuffle: bool,
    degraded: Arc<AtomicBool>,
}

impl StudyServices {
    /// # Errors
    ///
    /// Returns `StudyServicesError::Settings` if the settings are out of range.
    pub fn new(
        clock: Clock,
        settings: StudySettings,
        catalog: Arc<Catalog>,
        storage: Storage,
    ) -> Result<Self, StudyServicesError> {
        settings.validate()?;
        Ok(Self {
            clock,
            catalog,
            storage,
            scheduler: Scheduler::new(settings.scheduler)?,
            tracker: ProgressTracker::new(settings.progress)?,
            shuffle: false,
            degraded: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn fresh_context(&self) -> StudyContext {
        StudyContext::fresh(self.scheduler.clone(), self.tracker.settings())
    }

    /// Load the saved snapshot, falling back to empty state, and issue
    /// today's quests.
    ///
    /// Never fails: corrupt data is logged and replaced, and an unreadable
    /// snapshot additionally stops later saves from overwriting it.
    pub async fn bootstrap(&self) -> (StudyContext, LoadStatus) {
        let (mut ctx, status) = self.load_context().await;
        self.tracker
            .refresh_quests(&mut ctx, &self.catalog, self.clock.now());
        (ctx, status)
    }

    async fn load_context(&self) -> (StudyContext, LoadStatus) {
        match self.storage.snapshots.load().await {
            Ok(snapshot) => match StudyContext::from_snapshot(
                snapshot,
                self.scheduler.clone(),
                self.tracker.settings(),
            ) {
                Ok(ctx) => {
                    tracing::info!(records = ctx.store.len(), "study state restored");
                    (ctx, LoadStatus::Restored)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "snapshot rejected, starting empty");
                    (
                        self.fresh_context(),
                        LoadStatus::Recovered {
                            reason: err.to_string(),
                        },
                    )
                }
            },
            Err(StorageError::NotFound) => {
                tracing::info!("no saved state, first run");
                (self.fresh_context(), LoadStatus::FirstRun)
            }
            Err(StorageError::Io(err)) => {
                tracing::warn!(error = %err, "snapshot unreadable, running in memory only");
                self.degraded.store(true, Ordering::SeqCst);
                (
                    self.fresh_context(),
                    LoadStatus::Recovered {
                        reason: err.to_string(),
                    },
                )
            }
            Err(err) => {
                tracing::warn!(error = %err, "snapshot corrupt, starting empty");
                (
                    self.fresh_context(),
                    LoadStatus::Recovered {
                        reason: err.to_string(),
                    },
                )
            }
        }
    }

    /// Persist the current state unless persistence has already failed.
    pub async fn checkpoint(&self, ctx: &StudyContext) -> SaveStatus {
        if self.is_degraded() {
            tracing::debug!("persistence degraded, checkpoint skipped");
            return SaveStatus::Skipped;
        }
        let snapshot = ctx.to_snapshot(self.clock.now());
        match self.storage.snapshots.save(&snapshot).await {
            Ok(()) => SaveStatus::Saved,
            Err(err) => {
                tracing::warn!(error = %err, "save failed, continuing in memory only");
                self.degraded.store(true, Ordering::SeqCst);
                SaveStatus::Degraded {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Plan a session; `count` defaults to the mode's usual length.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::ZeroCount` for `Some(0)`.
    pub fn plan_session(
        &self,
        ctx: &StudyContext,
        mode: QuizMode,
        count: Option<usize>,
    ) -> Result<SessionPlan, SelectionError> {
        SessionSelector::new(&self.catalog, &ctx.store)
            .with_shuffle(self.shuffle)
            .plan(mode, count.unwrap_or_else(|| mode.default_count()), self.clock.now())
    }

    /// Plan a session and return a recorder for it.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::ZeroCount` for `Some(0)`.
    pub fn start_session(
        &self,
        ctx: &StudyContext,
        mode: QuizMode,
        count: Option<usize>,
    ) -> Result<SessionRecorder, SelectionError> {
        let plan = self.plan_session(ctx, mode, count)?;
        Ok(SessionRecorder::new(mode, plan.questions, self.clock.now()))
    }

    /// Apply a finished or abandoned session and checkpoint.
    pub async fn complete_session(
        &self,
        ctx: &mut StudyContext,
        result: &SessionResult,
    ) -> (SessionOutcome, SaveStatus) {
        let outcome = self
            .tracker
            .apply(ctx, &self.catalog, result, self.clock.now());
        let status = self.checkpoint(ctx).await;
        (outcome, status)
    }

    #[must_use]
    pub fn stats(&self, ctx: &StudyContext) -> StudyStats {
        StudyStats::compute(ctx, &self.catalog, self.clock.now())
    }

    #[must_use]
    pub fn gradebook(&self, ctx: &StudyContext, student_name: Option<&str>) -> GradebookReport {
        GradebookReport::build(ctx, &self.catalog, student_name, self.clock.now())
    }

    /// Replace all saved state with an empty one.
    pub async fn reset(&self) -> (StudyContext, SaveStatus) {
        let ctx = self.fresh_context();
        let status = self.checkpoint(&ctx).await;
        (ctx, status)
    }
}
