use thiserror::Error;

use crate::model::ids::LessonId;
use crate::model::lesson::{Lesson, LessonError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("lesson catalog is empty")]
    Empty,

    #[error("lesson ids must be contiguous from 0: expected {expected}, found {found}")]
    NonContiguous { expected: LessonId, found: LessonId },

    #[error("lesson {id} is invalid: {source}")]
    InvalidLesson {
        id: LessonId,
        #[source]
        source: LessonError,
    },

    #[error("lesson catalog could not be parsed: {0}")]
    Parse(String),
}

/// Ordered, read-only list of lessons; the order is the unlock chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonCatalog {
    lessons: Vec<Lesson>,
}

impl LessonCatalog {
    /// Build a catalog, checking that ids run `0..len` in order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Empty` for an empty list,
    /// `CatalogError::NonContiguous` when an id is out of sequence and
    /// `CatalogError::InvalidLesson` when a lesson fails validation.
    pub fn new(lessons: Vec<Lesson>) -> Result<Self, CatalogError> {
        if lessons.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut expected = LessonId::FIRST;
        for lesson in &lessons {
            if lesson.id() != expected {
                return Err(CatalogError::NonContiguous {
                    expected,
                    found: lesson.id(),
                });
            }
            lesson
                .validate()
                .map_err(|source| CatalogError::InvalidLesson {
                    id: lesson.id(),
                    source,
                })?;
            expected = expected.next();
        }

        Ok(Self { lessons })
    }

    #[must_use]
    pub fn get(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons.get(id.index())
    }

    #[must_use]
    pub fn contains(&self, id: LessonId) -> bool {
        id.index() < self.lessons.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    /// Always false for a constructed catalog; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lesson> {
        self.lessons.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = LessonId> + '_ {
        self.lessons.iter().map(Lesson::id)
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Exercise, Theory};

    fn lesson(id: u32) -> Lesson {
        Lesson::new(
            LessonId::new(id),
            format!("Lesson {id}"),
            "desc",
            Difficulty::Beginner,
            "10 min",
            vec!["Variables".into()],
            Theory {
                title: "Theory".into(),
                content: "Content".into(),
                examples: Vec::new(),
            },
            Exercise {
                initial_code: "console.log(1);".into(),
                expected_output: "1".into(),
                hint: "hint".into(),
                concept: "concept".into(),
                explanation: "explanation".into(),
                solution: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn accepts_contiguous_ids() {
        let catalog = LessonCatalog::new(vec![lesson(0), lesson(1), lesson(2)]).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(LessonId::new(1)).unwrap().title(), "Lesson 1");
        assert!(catalog.get(LessonId::new(3)).is_none());
        assert!(catalog.contains(LessonId::new(2)));
    }

    #[test]
    fn rejects_gaps_in_ids() {
        let err = LessonCatalog::new(vec![lesson(0), lesson(2)]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::NonContiguous {
                expected: LessonId::new(1),
                found: LessonId::new(2),
            }
        );
    }

    #[test]
    fn rejects_catalog_not_starting_at_zero() {
        assert!(matches!(
            LessonCatalog::new(vec![lesson(1)]),
            Err(CatalogError::NonContiguous { .. })
        ));
        assert_eq!(LessonCatalog::new(Vec::new()), Err(CatalogError::Empty));
    }
}
