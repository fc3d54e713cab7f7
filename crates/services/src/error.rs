//! Shared error types for the services crate.

use thiserror::Error;

use academy_core::model::{CatalogError, LessonId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `SessionController`.
///
/// Execution failures are not errors: they come back as part of a
/// `PracticeRun` and the learner may retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("lesson {0} does not exist")]
    UnknownLesson(LessonId),
    #[error("lesson {0} is locked until the previous lesson is completed")]
    Locked(LessonId),
    #[error("practice is locked until the theory is completed")]
    PracticeLocked,
    #[error("no lesson is open")]
    NoActiveLesson,
    #[error("the exercise is already solved")]
    AlreadySolved,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
