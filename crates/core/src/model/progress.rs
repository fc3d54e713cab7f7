use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::catalog::LessonCatalog;
use crate::model::ids::LessonId;
use crate::model::lesson::Difficulty;

/// Points granted the first time a lesson is completed.
pub const REWARD_PER_COMPLETION: u32 = 3;

/// Stars shown on a lesson card once it is completed.
pub const MAX_STARS_PER_LESSON: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("reward points ({found}) do not match completed lessons (expected {expected})")]
    RewardMismatch { expected: u32, found: u32 },

    #[error("lesson {0} is not part of the catalog")]
    UnknownLesson(LessonId),
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Durable learner progress: which lessons are done and the points earned.
///
/// Unlock state is derived from the completed set and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressRecord {
    completed: BTreeSet<LessonId>,
    reward_points: u32,
}

impl ProgressRecord {
    /// The zero-value record: nothing completed, no points.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate a record from storage, enforcing the reward invariant.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::RewardMismatch` if the points are not exactly
    /// `REWARD_PER_COMPLETION` per completed lesson.
    pub fn from_persisted(
        completed: impl IntoIterator<Item = LessonId>,
        reward_points: u32,
    ) -> Result<Self, ProgressError> {
        let completed: BTreeSet<LessonId> = completed.into_iter().collect();
        let expected = reward_for(completed.len());
        if expected != reward_points {
            return Err(ProgressError::RewardMismatch {
                expected,
                found: reward_points,
            });
        }
        Ok(Self {
            completed,
            reward_points,
        })
    }

    /// Rebuild a record from untrusted ids, dropping ids the catalog does not
    /// know and recomputing the points.
    #[must_use]
    pub fn repaired(completed: impl IntoIterator<Item = LessonId>, catalog: &LessonCatalog) -> Self {
        let completed: BTreeSet<LessonId> = completed
            .into_iter()
            .filter(|id| catalog.contains(*id))
            .collect();
        let reward_points = reward_for(completed.len());
        Self {
            completed,
            reward_points,
        }
    }

    /// Lesson 0 is always open; lesson `n` opens once lesson `n - 1` is done.
    #[must_use]
    pub fn is_unlocked(&self, id: LessonId) -> bool {
        match id.prerequisite() {
            None => true,
            Some(previous) => self.completed.contains(&previous),
        }
    }

    #[must_use]
    pub fn is_completed(&self, id: LessonId) -> bool {
        self.completed.contains(&id)
    }

    /// Mark a lesson complete. Returns `false` (and changes nothing) if it
    /// already was.
    pub fn record_completion(&mut self, id: LessonId) -> bool {
        if !self.completed.insert(id) {
            return false;
        }
        self.reward_points = self.reward_points.saturating_add(REWARD_PER_COMPLETION);
        true
    }

    #[must_use]
    pub fn completed_lesson_ids(&self) -> &BTreeSet<LessonId> {
        &self.completed
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    #[must_use]
    pub fn reward_points(&self) -> u32 {
        self.reward_points
    }

    #[must_use]
    pub fn is_graduated(&self, catalog: &LessonCatalog) -> bool {
        self.completed.len() == catalog.len()
    }

    #[must_use]
    pub fn status(&self, id: LessonId) -> LessonStatus {
        if self.is_completed(id) {
            LessonStatus::Completed
        } else if self.is_unlocked(id) {
            LessonStatus::Available
        } else {
            LessonStatus::Locked
        }
    }

    /// Lowest lesson id not yet completed, or `None` once everything is done.
    #[must_use]
    pub fn current_lesson(&self, catalog: &LessonCatalog) -> Option<LessonId> {
        catalog.ids().find(|id| !self.completed.contains(id))
    }

    #[must_use]
    pub fn summary(&self, catalog: &LessonCatalog) -> ProgressSummary {
        let total = catalog.len();
        let completed = self.completed.len();
        #[allow(clippy::cast_precision_loss)]
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        ProgressSummary {
            completed,
            total,
            percent,
            reward_points: self.reward_points,
            current_lesson: self.current_lesson(catalog),
            graduated: self.is_graduated(catalog),
        }
    }

    #[must_use]
    pub fn lesson_cards(&self, catalog: &LessonCatalog) -> Vec<LessonCard> {
        catalog
            .iter()
            .map(|lesson| {
                let status = self.status(lesson.id());
                LessonCard {
                    id: lesson.id(),
                    title: lesson.title().to_owned(),
                    description: lesson.description().to_owned(),
                    difficulty: lesson.difficulty(),
                    estimated_time: lesson.estimated_time().to_owned(),
                    concepts: lesson.concepts().to_vec(),
                    status,
                    stars: if status == LessonStatus::Completed {
                        MAX_STARS_PER_LESSON
                    } else {
                        0
                    },
                    max_stars: MAX_STARS_PER_LESSON,
                }
            })
            .collect()
    }
}

fn reward_for(completed: usize) -> u32 {
    u32::try_from(completed)
        .unwrap_or(u32::MAX)
        .saturating_mul(REWARD_PER_COMPLETION)
}

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LessonStatus {
    Locked,
    Available,
    Completed,
}

/// Aggregate progress for the mission-control header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
    pub reward_points: u32,
    pub current_lesson: Option<LessonId>,
    pub graduated: bool,
}

/// One entry of the lesson list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonCard {
    pub id: LessonId,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub estimated_time: String,
    pub concepts: Vec<String>,
    pub status: LessonStatus,
    pub stars: u32,
    pub max_stars: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Exercise, Lesson, Theory};

    fn catalog(len: u32) -> LessonCatalog {
        let lessons = (0..len)
            .map(|id| {
                Lesson::new(
                    LessonId::new(id),
                    format!("Lesson {id}"),
                    "",
                    Difficulty::Beginner,
                    "10 min",
                    Vec::new(),
                    Theory {
                        title: "t".into(),
                        content: "c".into(),
                        examples: Vec::new(),
                    },
                    Exercise {
                        initial_code: "x".into(),
                        expected_output: "y".into(),
                        hint: String::new(),
                        concept: String::new(),
                        explanation: String::new(),
                        solution: None,
                    },
                )
                .unwrap()
            })
            .collect();
        LessonCatalog::new(lessons).unwrap()
    }

    #[test]
    fn unlock_follows_previous_lesson() {
        let mut record = ProgressRecord::new();
        assert!(record.is_unlocked(LessonId::new(0)));
        for n in 1..6 {
            assert!(!record.is_unlocked(LessonId::new(n)));
        }

        record.record_completion(LessonId::new(2));
        for n in 1..6 {
            let expected = record.is_completed(LessonId::new(n - 1));
            assert_eq!(record.is_unlocked(LessonId::new(n)), expected);
        }
        assert!(record.is_unlocked(LessonId::new(3)));
        assert!(!record.is_unlocked(LessonId::new(1)));
    }

    #[test]
    fn completion_rewards_only_once() {
        let mut record = ProgressRecord::new();
        assert!(record.record_completion(LessonId::new(0)));
        assert!(!record.record_completion(LessonId::new(0)));
        assert_eq!(record.reward_points(), REWARD_PER_COMPLETION);
        assert_eq!(record.completed_count(), 1);
    }

    #[test]
    fn persisted_record_must_match_reward_policy() {
        let ok = ProgressRecord::from_persisted([LessonId::new(0), LessonId::new(1)], 6).unwrap();
        assert_eq!(ok.reward_points(), 6);

        let err = ProgressRecord::from_persisted([LessonId::new(0)], 5).unwrap_err();
        assert_eq!(
            err,
            ProgressError::RewardMismatch {
                expected: 3,
                found: 5
            }
        );
    }

    #[test]
    fn repair_drops_unknown_lessons() {
        let catalog = catalog(2);
        let record = ProgressRecord::repaired([LessonId::new(0), LessonId::new(7)], &catalog);
        assert_eq!(record.completed_count(), 1);
        assert_eq!(record.reward_points(), 3);
    }

    #[test]
    fn summary_reports_graduation() {
        let catalog = catalog(2);
        let mut record = ProgressRecord::new();
        let summary = record.summary(&catalog);
        assert_eq!(summary.current_lesson, Some(LessonId::new(0)));
        assert!(!summary.graduated);

        record.record_completion(LessonId::new(0));
        record.record_completion(LessonId::new(1));
        let summary = record.summary(&catalog);
        assert!(summary.graduated);
        assert_eq!(summary.current_lesson, None);
        assert!((summary.percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(summary.reward_points, 6);
    }

    #[test]
    fn lesson_cards_show_status_and_stars() {
        let catalog = catalog(3);
        let mut record = ProgressRecord::new();
        record.record_completion(LessonId::new(0));

        let cards = record.lesson_cards(&catalog);
        let statuses: Vec<_> = cards.iter().map(|card| card.status).collect();
        assert_eq!(
            statuses,
            vec![
                LessonStatus::Completed,
                LessonStatus::Available,
                LessonStatus::Locked
            ]
        );
        assert_eq!(cards[0].stars, MAX_STARS_PER_LESSON);
        assert_eq!(cards[1].stars, 0);
    }
}
