use std::sync::Arc;

use academy_core::model::{Lesson, LessonCatalog, LessonId, SessionPhase, SessionState};
use academy_core::playground::{ExecutionOutcome, Sandbox, check_solution};
use academy_core::time::{Clock, Deadline};
use serde::Serialize;

use super::settings::SessionSettings;
use crate::error::SessionError;
use crate::progression::ProgressionStore;

//
// ─── PRACTICE RUN ──────────────────────────────────────────────────────────────
//

/// Result of one press of "run" in the practice phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PracticeRun {
    pub outcome: ExecutionOutcome,
    pub passed: bool,
    /// 1-based attempt number within the current visit.
    pub attempt: u32,
}

impl PracticeRun {
    /// Text to show under the editor: captured output or the failure message.
    #[must_use]
    pub fn feedback(&self) -> &str {
        self.outcome.feedback()
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Drives one lesson visit: theory, practice, and the return to the list.
///
/// Progress is lent in by the caller on the operations that need it; the
/// controller itself never persists anything.
pub struct SessionController {
    catalog: Arc<LessonCatalog>,
    sandbox: Arc<dyn Sandbox>,
    clock: Clock,
    settings: SessionSettings,
    state: SessionState,
    editor: String,
    hint_visible: bool,
    latest_run: Option<PracticeRun>,
    pending_return: Option<Deadline>,
}

impl SessionController {
    #[must_use]
    pub fn new(catalog: Arc<LessonCatalog>, sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            catalog,
            sandbox,
            clock: Clock::default(),
            settings: SessionSettings::default(),
            state: SessionState::default(),
            editor: String::new(),
            hint_visible: false,
            latest_run: None,
            pending_return: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Mutable access so tests and the binary can move a manual clock forward.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    #[must_use]
    pub fn active_lesson(&self) -> Option<&Lesson> {
        self.state.active_lesson.and_then(|id| self.catalog.get(id))
    }

    /// Current editor content.
    #[must_use]
    pub fn editor(&self) -> &str {
        &self.editor
    }

    #[must_use]
    pub fn hint_visible(&self) -> bool {
        self.hint_visible
    }

    /// Hint text of the open exercise, once the learner has asked for it.
    #[must_use]
    pub fn visible_hint(&self) -> Option<&str> {
        if !self.hint_visible {
            return None;
        }
        self.active_lesson()
            .map(|lesson| lesson.exercise().hint.as_str())
    }

    #[must_use]
    pub fn latest_run(&self) -> Option<&PracticeRun> {
        self.latest_run.as_ref()
    }

    /// When the solved lesson will close itself, if a return is scheduled.
    #[must_use]
    pub fn pending_return(&self) -> Option<Deadline> {
        self.pending_return
    }

    /// Open a lesson at its theory phase, discarding any current visit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownLesson` if the catalog has no such lesson
    /// and `SessionError::Locked` if its prerequisite is not completed.
    pub fn open(
        &mut self,
        progress: &ProgressionStore,
        id: LessonId,
    ) -> Result<&Lesson, SessionError> {
        let Some(lesson) = self.catalog.get(id) else {
            return Err(SessionError::UnknownLesson(id));
        };
        if !progress.is_unlocked(id) {
            tracing::debug!(lesson_id = %id, "refused to open locked lesson");
            return Err(SessionError::Locked(id));
        }

        self.editor.clone_from(&lesson.exercise().initial_code);
        self.state = SessionState::opened(id);
        self.hint_visible = false;
        self.latest_run = None;
        self.pending_return = None;
        tracing::info!(lesson_id = %id, "lesson opened");

        self.active_lesson().ok_or(SessionError::UnknownLesson(id))
    }

    /// Mark the theory as read and unlock the exercise.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveLesson` when no lesson is open.
    pub fn complete_theory(&mut self) -> Result<(), SessionError> {
        let id = self.active_id()?;
        if self.state.phase == SessionPhase::Theory {
            self.state.phase = SessionPhase::Practice;
            tracing::debug!(lesson_id = %id, "theory completed");
        }
        Ok(())
    }

    /// Replace the editor content without running it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` unless the practice phase is open.
    pub fn edit(&mut self, code: impl Into<String>) -> Result<(), SessionError> {
        self.require_practice()?;
        self.editor = code.into();
        Ok(())
    }

    /// Show or hide the hint; returns the new visibility.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` unless the practice phase is open.
    pub fn toggle_hint(&mut self) -> Result<bool, SessionError> {
        self.require_practice()?;
        self.hint_visible = !self.hint_visible;
        Ok(self.hint_visible)
    }

    /// Store `code` in the editor, run it and grade the output.
    ///
    /// A passing run records the completion and schedules the return to the
    /// lesson list after the celebration delay. Failed runs leave progress
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` unless the practice phase is open and the
    /// exercise is still unsolved.
    pub async fn run_practice(
        &mut self,
        progress: &mut ProgressionStore,
        code: impl Into<String>,
    ) -> Result<PracticeRun, SessionError> {
        let id = self.require_practice()?;
        if self.state.exercise_solved {
            return Err(SessionError::AlreadySolved);
        }
        let expected = self
            .catalog
            .get(id)
            .map(|lesson| lesson.exercise().expected_output.clone())
            .ok_or(SessionError::UnknownLesson(id))?;

        self.editor = code.into();
        self.state.attempt_count = self.state.attempt_count.saturating_add(1);
        let attempt = self.state.attempt_count;

        let (outcome, passed) = check_solution(self.sandbox.as_ref(), &self.editor, &expected);
        match outcome.failure() {
            Some(failure) => tracing::debug!(
                lesson_id = %id,
                attempt,
                kind = ?failure.kind,
                "practice run failed"
            ),
            None => tracing::debug!(lesson_id = %id, attempt, passed, "practice run finished"),
        }

        if passed {
            progress
                .record_completion(id)
                .await
                .map_err(|_| SessionError::UnknownLesson(id))?;
            self.state.exercise_solved = true;
            self.pending_return = Some(Deadline::after(
                &self.clock,
                self.settings.celebration_delay,
            ));
        }

        let run = PracticeRun {
            outcome,
            passed,
            attempt,
        };
        self.latest_run = Some(run.clone());
        Ok(run)
    }

    /// Put the starter code back and forget attempts, output and hint.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` unless the practice phase is open.
    pub fn reset_practice(&mut self) -> Result<(), SessionError> {
        let id = self.require_practice()?;
        let initial = self
            .catalog
            .get(id)
            .map(|lesson| lesson.exercise().initial_code.clone())
            .ok_or(SessionError::UnknownLesson(id))?;
        self.editor = initial;
        self.state.attempt_count = 0;
        self.state.exercise_solved = false;
        self.hint_visible = false;
        self.latest_run = None;
        self.pending_return = None;
        Ok(())
    }

    /// Return to the lesson list, dropping the visit. Progress is untouched.
    pub fn exit(&mut self) {
        if let Some(id) = self.state.active_lesson {
            tracing::debug!(lesson_id = %id, "lesson closed");
        }
        self.state = SessionState::default();
        self.editor.clear();
        self.hint_visible = false;
        self.latest_run = None;
        self.pending_return = None;
    }

    /// Perform the scheduled return once its deadline has passed.
    ///
    /// Returns `true` if the session went back to idle.
    pub fn tick(&mut self) -> bool {
        match self.pending_return {
            Some(deadline) if deadline.has_passed(&self.clock) => {
                self.exit();
                true
            }
            _ => false,
        }
    }

    fn active_id(&self) -> Result<LessonId, SessionError> {
        self.state.active_lesson.ok_or(SessionError::NoActiveLesson)
    }

    fn require_practice(&self) -> Result<LessonId, SessionError> {
        let id = self.active_id()?;
        if self.state.practice_unlocked() {
            return Ok(id);
        }
        match self.state.phase {
            SessionPhase::Theory => Err(SessionError::PracticeLocked),
            SessionPhase::Idle | SessionPhase::Practice => Err(SessionError::NoActiveLesson),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::playground::Interpreter;
    use academy_core::time::fixed_now;
    use chrono::Duration;
    use storage::catalog::bundled_catalog;
    use storage::repository::InMemoryRepository;

    const LESSON_ZERO_SOLUTION: &str = r#"let astronautName: string = "Alex";
let fuelLevel: number = 85;
let helmetOn: boolean = true;
console.log("Astronaut:", astronautName, "Fuel:", fuelLevel, "Helmet:", helmetOn);"#;

    async fn fixture() -> (SessionController, ProgressionStore) {
        let catalog = Arc::new(bundled_catalog().unwrap());
        let progress =
            ProgressionStore::load(Arc::clone(&catalog), Arc::new(InMemoryRepository::new()))
                .await;
        let controller = SessionController::new(catalog, Arc::new(Interpreter::default()))
            .with_clock(Clock::fixed(fixed_now()));
        (controller, progress)
    }

    #[tokio::test]
    async fn locked_and_unknown_lessons_cannot_be_opened() {
        let (mut controller, progress) = fixture().await;
        assert_eq!(
            controller.open(&progress, LessonId::new(1)).unwrap_err(),
            SessionError::Locked(LessonId::new(1))
        );
        assert_eq!(
            controller.open(&progress, LessonId::new(9)).unwrap_err(),
            SessionError::UnknownLesson(LessonId::new(9))
        );
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn practice_needs_an_open_lesson() {
        let (mut controller, _progress) = fixture().await;
        assert_eq!(controller.edit("console.log(1);"), Err(SessionError::NoActiveLesson));
        assert_eq!(controller.reset_practice(), Err(SessionError::NoActiveLesson));
    }

    #[tokio::test]
    async fn practice_is_locked_during_theory() {
        let (mut controller, mut progress) = fixture().await;
        controller.open(&progress, LessonId::FIRST).unwrap();
        assert_eq!(controller.state().phase, SessionPhase::Theory);

        let err = controller
            .run_practice(&mut progress, LESSON_ZERO_SOLUTION)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::PracticeLocked);
        assert_eq!(controller.toggle_hint(), Err(SessionError::PracticeLocked));
        assert_eq!(controller.state().attempt_count, 0);
    }

    #[tokio::test]
    async fn opening_loads_starter_code() {
        let (mut controller, progress) = fixture().await;
        let lesson = controller.open(&progress, LessonId::FIRST).unwrap();
        let starter = lesson.exercise().initial_code.clone();
        assert_eq!(controller.editor(), starter);
    }

    #[tokio::test]
    async fn unedited_template_does_not_pass() {
        let (mut controller, mut progress) = fixture().await;
        controller.open(&progress, LessonId::FIRST).unwrap();
        controller.complete_theory().unwrap();

        let starter = controller.editor().to_owned();
        let run = controller.run_practice(&mut progress, starter).await.unwrap();
        assert!(!run.passed);
        assert_eq!(run.feedback(), "Astronaut:  Fuel: 0 Helmet: false");
        assert_eq!(run.attempt, 1);
        assert_eq!(progress.reward_points(), 0);
        assert!(!controller.state().exercise_solved);
        assert!(controller.pending_return().is_none());
    }

    #[tokio::test]
    async fn solving_records_completion_and_returns_after_delay() {
        let (mut controller, mut progress) = fixture().await;
        controller.open(&progress, LessonId::FIRST).unwrap();
        controller.complete_theory().unwrap();

        let run = controller
            .run_practice(&mut progress, LESSON_ZERO_SOLUTION)
            .await
            .unwrap();
        assert!(run.passed);
        assert_eq!(run.feedback(), "Astronaut: Alex Fuel: 85 Helmet: true");
        assert!(controller.state().exercise_solved);
        assert_eq!(progress.reward_points(), 3);
        assert!(progress.is_unlocked(LessonId::new(1)));

        assert!(!controller.tick());
        controller.clock_mut().advance(Duration::milliseconds(999));
        assert!(!controller.tick());
        controller.clock_mut().advance(Duration::milliseconds(1));
        assert!(controller.tick());
        assert!(controller.state().is_idle());
        assert!(controller.latest_run().is_none());
    }

    #[tokio::test]
    async fn solved_exercise_rejects_further_runs() {
        let (mut controller, mut progress) = fixture().await;
        controller.open(&progress, LessonId::FIRST).unwrap();
        controller.complete_theory().unwrap();
        controller
            .run_practice(&mut progress, LESSON_ZERO_SOLUTION)
            .await
            .unwrap();
        assert_eq!(
            controller
                .run_practice(&mut progress, LESSON_ZERO_SOLUTION)
                .await
                .unwrap_err(),
            SessionError::AlreadySolved
        );
        assert_eq!(progress.reward_points(), 3);
    }

    #[tokio::test]
    async fn exit_cancels_pending_return() {
        let (mut controller, mut progress) = fixture().await;
        controller.open(&progress, LessonId::FIRST).unwrap();
        controller.complete_theory().unwrap();
        controller
            .run_practice(&mut progress, LESSON_ZERO_SOLUTION)
            .await
            .unwrap();
        controller.exit();
        assert!(controller.pending_return().is_none());
        controller.clock_mut().advance(Duration::seconds(5));
        assert!(!controller.tick());
        assert_eq!(progress.reward_points(), 3);
    }

    #[tokio::test]
    async fn failures_count_attempts_and_keep_progress() {
        let (mut controller, mut progress) = fixture().await;
        controller.open(&progress, LessonId::FIRST).unwrap();
        controller.complete_theory().unwrap();

        let run = controller
            .run_practice(&mut progress, "throw new Error(\"boom\");")
            .await
            .unwrap();
        assert!(!run.passed);
        assert!(run.outcome.is_failure());
        let run = controller
            .run_practice(&mut progress, "let = ;")
            .await
            .unwrap();
        assert_eq!(run.attempt, 2);
        assert!(run.outcome.is_failure());
        assert_eq!(progress.reward_points(), 0);
    }

    #[tokio::test]
    async fn reset_practice_restores_starter_state() {
        let (mut controller, mut progress) = fixture().await;
        let starter = controller
            .open(&progress, LessonId::FIRST)
            .unwrap()
            .exercise()
            .initial_code
            .clone();
        controller.complete_theory().unwrap();
        controller.toggle_hint().unwrap();
        assert!(controller.visible_hint().is_some());
        controller
            .run_practice(&mut progress, "console.log(1);")
            .await
            .unwrap();

        controller.reset_practice().unwrap();
        assert_eq!(controller.editor(), starter);
        assert_eq!(controller.state().attempt_count, 0);
        assert!(!controller.hint_visible());
        assert!(controller.latest_run().is_none());
    }

    #[tokio::test]
    async fn reopening_resets_attempts() {
        let (mut controller, mut progress) = fixture().await;
        controller.open(&progress, LessonId::FIRST).unwrap();
        controller.complete_theory().unwrap();
        controller.edit("console.log(2);").unwrap();
        controller
            .run_practice(&mut progress, "console.log(2);")
            .await
            .unwrap();
        assert_eq!(controller.state().attempt_count, 1);

        controller.open(&progress, LessonId::FIRST).unwrap();
        assert_eq!(controller.state().attempt_count, 0);
        assert_eq!(controller.state().phase, SessionPhase::Theory);
    }
}
