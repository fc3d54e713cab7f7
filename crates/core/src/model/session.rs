use serde::Serialize;

use crate::model::ids::LessonId;

/// Where the learner is within a lesson visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionPhase {
    /// No lesson is open; the learner is on the lesson list.
    #[default]
    Idle,
    /// Reading the theory; practice is not reachable yet.
    Theory,
    /// Theory marked read; the exercise can be run.
    Practice,
}

/// Snapshot of the current lesson visit, rendered by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionState {
    pub active_lesson: Option<LessonId>,
    pub phase: SessionPhase,
    pub exercise_solved: bool,
    pub attempt_count: u32,
}

impl SessionState {
    /// Fresh state for a newly opened lesson.
    #[must_use]
    pub fn opened(lesson: LessonId) -> Self {
        Self {
            active_lesson: Some(lesson),
            phase: SessionPhase::Theory,
            exercise_solved: false,
            attempt_count: 0,
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    #[must_use]
    pub fn practice_unlocked(&self) -> bool {
        self.phase == SessionPhase::Practice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opened_state_starts_in_theory() {
        let state = SessionState::opened(LessonId::new(2));
        assert_eq!(state.phase, SessionPhase::Theory);
        assert_eq!(state.attempt_count, 0);
        assert!(!state.practice_unlocked());
        assert!(SessionState::default().is_idle());
    }
}
