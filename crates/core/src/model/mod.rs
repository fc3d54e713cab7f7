mod catalog;
mod ids;
mod lesson;
mod progress;
mod session;

pub use catalog::{CatalogError, LessonCatalog};
pub use ids::LessonId;
pub use lesson::{Difficulty, Exercise, Lesson, LessonError, Theory, TheoryExample};
pub use progress::{
    LessonCard, LessonStatus, MAX_STARS_PER_LESSON, ProgressError, ProgressRecord,
    ProgressSummary, REWARD_PER_COMPLETION,
};
pub use session::{SessionPhase, SessionState};
