use std::sync::Arc;

use academy_core::model::{Lesson, LessonCatalog, LessonId};
use academy_core::playground::{ExecutionOutcome, Interpreter, Sandbox, SandboxLimits, evaluate};
use storage::repository::Storage;

use crate::error::{AppServicesError, SessionError};
use crate::progression::ProgressionStore;
use crate::sessions::{PracticeRun, SessionController, SessionSettings};
use crate::Clock;

/// Knobs applied when assembling services.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    pub clock: Clock,
    pub limits: SandboxLimits,
    pub session: SessionSettings,
}

/// Assembles the progression store and session controller over one catalog.
///
/// This is the presentation boundary: everything a front end renders or
/// triggers goes through here.
pub struct AcademyServices {
    catalog: Arc<LessonCatalog>,
    sandbox: Arc<dyn Sandbox>,
    progress: ProgressionStore,
    session: SessionController,
}

impl AcademyServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        catalog: LessonCatalog,
        options: ServiceOptions,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, catalog, options).await)
    }

    /// Build services over an already constructed storage aggregate.
    pub async fn from_storage(
        storage: &Storage,
        catalog: LessonCatalog,
        options: ServiceOptions,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let sandbox: Arc<dyn Sandbox> = Arc::new(Interpreter::new(options.limits));
        let progress =
            ProgressionStore::load(Arc::clone(&catalog), Arc::clone(&storage.progress)).await;
        let session = SessionController::new(Arc::clone(&catalog), Arc::clone(&sandbox))
            .with_clock(options.clock)
            .with_settings(options.session);

        Self {
            catalog,
            sandbox,
            progress,
            session,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressionStore {
        &self.progress
    }

    #[must_use]
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionController {
        &mut self.session
    }

    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.catalog.get(id)
    }

    /// Run a snippet outside any lesson, e.g. a theory example.
    #[must_use]
    pub fn evaluate(&self, source: &str) -> ExecutionOutcome {
        evaluate(self.sandbox.as_ref(), source)
    }

    /// # Errors
    ///
    /// See [`SessionController::open`].
    pub fn open(&mut self, id: LessonId) -> Result<&Lesson, SessionError> {
        self.session.open(&self.progress, id)
    }

    /// # Errors
    ///
    /// See [`SessionController::complete_theory`].
    pub fn complete_theory(&mut self) -> Result<(), SessionError> {
        self.session.complete_theory()
    }

    /// # Errors
    ///
    /// See [`SessionController::run_practice`].
    pub async fn run_practice(
        &mut self,
        code: impl Into<String>,
    ) -> Result<PracticeRun, SessionError> {
        self.session.run_practice(&mut self.progress, code).await
    }

    /// # Errors
    ///
    /// See [`SessionController::reset_practice`].
    pub fn reset_practice(&mut self) -> Result<(), SessionError> {
        self.session.reset_practice()
    }

    pub fn exit(&mut self) {
        self.session.exit();
    }

    pub fn tick(&mut self) -> bool {
        self.session.tick()
    }

    /// Close any open lesson and wipe all stored progress.
    pub async fn reset_progress(&mut self) {
        self.session.exit();
        self.progress.reset().await;
    }
}
