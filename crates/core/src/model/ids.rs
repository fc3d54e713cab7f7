use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a lesson in the curriculum.
///
/// Ids are contiguous from zero, so the id doubles as the lesson's place in the
/// prerequisite chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LessonId(u32);

impl LessonId {
    /// The first lesson, which is always unlocked.
    pub const FIRST: LessonId = LessonId(0);

    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The lesson that must be completed before this one, if any.
    #[must_use]
    pub fn prerequisite(&self) -> Option<LessonId> {
        self.0.checked_sub(1).map(LessonId)
    }

    #[must_use]
    pub fn next(&self) -> LessonId {
        LessonId(self.0.saturating_add(1))
    }

    /// Index into an ordered lesson list.
    #[must_use]
    pub fn index(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl fmt::Debug for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LessonId({})", self.0)
    }
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LessonId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl FromStr for LessonId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(LessonId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_lesson_has_no_prerequisite() {
        assert_eq!(LessonId::FIRST.prerequisite(), None);
        assert_eq!(LessonId::new(4).prerequisite(), Some(LessonId::new(3)));
    }

    #[test]
    fn parses_from_trimmed_text() {
        assert_eq!(" 2 ".parse::<LessonId>().unwrap(), LessonId::new(2));
        assert!("two".parse::<LessonId>().is_err());
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&vec![LessonId::new(0), LessonId::new(3)]).unwrap();
        assert_eq!(json, "[0,3]");
    }
}
