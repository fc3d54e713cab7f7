use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::LessonId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("exercise expected output cannot be empty")]
    EmptyExpectedOutput,

    #[error("exercise initial code cannot be empty")]
    EmptyInitialCode,
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        };
        f.write_str(label)
    }
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// A worked example shown alongside the theory text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoryExample {
    pub code: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theory {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub examples: Vec<TheoryExample>,
}

/// The graded coding task of a lesson.
///
/// `expected_output` must match, after trimming, exactly what the last
/// `console.log` call of a correct solution formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub initial_code: String,
    pub expected_output: String,
    pub hint: String,
    pub concept: String,
    pub explanation: String,
    /// A reference solution, used to check the bundled curriculum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// One unit of curriculum: theory reading plus one graded exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    id: LessonId,
    title: String,
    description: String,
    difficulty: Difficulty,
    estimated_time: String,
    #[serde(default)]
    concepts: Vec<String>,
    theory: Theory,
    #[serde(alias = "practice")]
    exercise: Exercise,
}

impl Lesson {
    /// Build a lesson from its parts.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if the title, initial code or expected output is blank.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        description: impl Into<String>,
        difficulty: Difficulty,
        estimated_time: impl Into<String>,
        concepts: Vec<String>,
        theory: Theory,
        exercise: Exercise,
    ) -> Result<Self, LessonError> {
        let lesson = Self {
            id,
            title: title.into(),
            description: description.into(),
            difficulty,
            estimated_time: estimated_time.into(),
            concepts,
            theory,
            exercise,
        };
        lesson.validate()?;
        Ok(lesson)
    }

    /// Check content rules that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` describing the first rule violated.
    pub fn validate(&self) -> Result<(), LessonError> {
        if self.title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if self.exercise.initial_code.trim().is_empty() {
            return Err(LessonError::EmptyInitialCode);
        }
        if self.exercise.expected_output.trim().is_empty() {
            return Err(LessonError::EmptyExpectedOutput);
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn estimated_time(&self) -> &str {
        &self.estimated_time
    }

    #[must_use]
    pub fn concepts(&self) -> &[String] {
        &self.concepts
    }

    #[must_use]
    pub fn theory(&self) -> &Theory {
        &self.theory
    }

    #[must_use]
    pub fn exercise(&self) -> &Exercise {
        &self.exercise
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(expected: &str) -> Exercise {
        Exercise {
            initial_code: "console.log(1);".into(),
            expected_output: expected.into(),
            hint: String::new(),
            concept: "Numbers".into(),
            explanation: String::new(),
            solution: None,
        }
    }

    fn theory() -> Theory {
        Theory {
            title: "T".into(),
            content: "C".into(),
            examples: Vec::new(),
        }
    }

    #[test]
    fn rejects_blank_expected_output() {
        let err = Lesson::new(
            LessonId::new(0),
            "Numbers",
            "",
            Difficulty::Beginner,
            "5 min",
            Vec::new(),
            theory(),
            exercise("  "),
        )
        .unwrap_err();
        assert_eq!(err, LessonError::EmptyExpectedOutput);
    }

    #[test]
    fn deserializes_original_practice_key() {
        let json = r#"{
            "id": 3,
            "title": "Objects",
            "description": "d",
            "difficulty": "Intermediate",
            "estimatedTime": "25 min",
            "concepts": ["Objects"],
            "theory": { "title": "t", "content": "c", "examples": [] },
            "practice": {
                "initialCode": "let a = 1;",
                "expectedOutput": "1",
                "hint": "h",
                "concept": "c",
                "explanation": "e"
            }
        }"#;
        let lesson: Lesson = serde_json::from_str(json).unwrap();
        assert_eq!(lesson.id(), LessonId::new(3));
        assert_eq!(lesson.difficulty(), Difficulty::Intermediate);
        assert_eq!(lesson.exercise().expected_output, "1");
    }
}
