use thiserror::Error;

use crate::model::{CatalogError, LessonError, ProgressError};
use crate::playground::SyntaxError;

/// Umbrella error for callers that do not care which domain check failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}
