//! Loading the lesson catalog from JSON.
//!
//! The curriculum ships inside the binary; a replacement file can be supplied
//! at runtime with the same shape.

use std::fs;
use std::path::Path;

use academy_core::model::{CatalogError, Lesson, LessonCatalog};

const BUNDLED_LESSONS: &str = include_str!("../data/lessons.json");

/// Parse a JSON array of lessons into a validated catalog.
///
/// # Errors
///
/// Returns `CatalogError::Parse` for malformed JSON, or the catalog's own
/// validation error when the lessons are not a contiguous, valid chain.
pub fn parse_catalog(json: &str) -> Result<LessonCatalog, CatalogError> {
    let lessons: Vec<Lesson> =
        serde_json::from_str(json).map_err(|err| CatalogError::Parse(err.to_string()))?;
    LessonCatalog::new(lessons)
}

/// The six-lesson curriculum compiled into the crate.
///
/// # Errors
///
/// Returns `CatalogError` only if the bundled file is broken, which the tests
/// below rule out.
pub fn bundled_catalog() -> Result<LessonCatalog, CatalogError> {
    parse_catalog(BUNDLED_LESSONS)
}

/// Read and parse a catalog file from disk.
///
/// # Errors
///
/// Returns `CatalogError::Parse` if the file cannot be read or parsed.
pub fn load_catalog_file(path: impl AsRef<Path>) -> Result<LessonCatalog, CatalogError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|err| CatalogError::Parse(format!("{}: {err}", path.display())))?;
    let catalog = parse_catalog(&raw)?;
    tracing::debug!(path = %path.display(), lessons = catalog.len(), "loaded lesson catalog");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::model::{Difficulty, LessonId};
    use academy_core::playground::{Interpreter, check_solution, evaluate};

    #[test]
    fn bundled_catalog_has_six_ordered_lessons() {
        let catalog = bundled_catalog().unwrap();
        assert_eq!(catalog.len(), 6);
        let ids: Vec<u32> = catalog.ids().map(|id| id.value()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);

        let first = catalog.get(LessonId::FIRST).unwrap();
        assert_eq!(first.title(), "Variables & Space Suits");
        assert_eq!(first.difficulty(), Difficulty::Beginner);
        assert!(!first.theory().examples.is_empty());
    }

    #[test]
    fn every_reference_solution_passes() {
        let sandbox = Interpreter::default();
        for lesson in bundled_catalog().unwrap().iter() {
            let exercise = lesson.exercise();
            let solution = exercise
                .solution
                .as_deref()
                .unwrap_or_else(|| panic!("lesson {} has no solution", lesson.id()));
            let (outcome, passed) = check_solution(&sandbox, solution, &exercise.expected_output);
            assert!(
                passed,
                "lesson {} solution produced {:?}, expected {:?}",
                lesson.id(),
                outcome,
                exercise.expected_output
            );
        }
    }

    #[test]
    fn theory_examples_run_cleanly() {
        let sandbox = Interpreter::default();
        for lesson in bundled_catalog().unwrap().iter() {
            for example in &lesson.theory().examples {
                let outcome = evaluate(&sandbox, &example.code);
                assert!(
                    !outcome.is_failure(),
                    "lesson {} example failed: {:?}",
                    lesson.id(),
                    outcome
                );
            }
        }
    }

    #[test]
    fn starter_code_never_crashes_the_sandbox() {
        let sandbox = Interpreter::default();
        for lesson in bundled_catalog().unwrap().iter() {
            let outcome = evaluate(&sandbox, &lesson.exercise().initial_code);
            assert!(
                !outcome.is_failure(),
                "lesson {} starter failed: {:?}",
                lesson.id(),
                outcome
            );
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_catalog("[{"), Err(CatalogError::Parse(_))));
        assert_eq!(parse_catalog("[]"), Err(CatalogError::Empty));
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let err = load_catalog_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(msg) if msg.contains("here.json")));
    }
}
