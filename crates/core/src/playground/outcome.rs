use std::fmt;

use serde::Serialize;

/// Captured text of a run that finished without logging anything.
pub const SUCCESS_SENTINEL: &str = "Code executed successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The snippet could not be parsed.
    Syntax,
    /// The snippet threw and nothing caught it.
    Runtime,
    /// The step budget ran out, usually an endless loop.
    StepLimit,
}

/// Why a run produced no output. The message is shown to the learner verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of executing one snippet: captured text or a failure, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExecutionOutcome {
    Captured(String),
    Failed(ExecutionFailure),
}

impl ExecutionOutcome {
    pub fn captured(text: impl Into<String>) -> Self {
        Self::Captured(text.into())
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed(ExecutionFailure {
            kind,
            message: message.into(),
        })
    }

    #[must_use]
    pub fn captured_text(&self) -> Option<&str> {
        match self {
            Self::Captured(text) => Some(text),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&ExecutionFailure> {
        match self {
            Self::Captured(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Text for the output panel: the captured line, or the failure message.
    #[must_use]
    pub fn feedback(&self) -> &str {
        match self {
            Self::Captured(text) => text,
            Self::Failed(failure) => &failure.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_are_exclusive() {
        let ok = ExecutionOutcome::captured("Ready for launch!");
        assert_eq!(ok.captured_text(), Some("Ready for launch!"));
        assert!(ok.failure().is_none());
        assert_eq!(ok.feedback(), "Ready for launch!");

        let failed = ExecutionOutcome::failed(FailureKind::Runtime, "Error: boom");
        assert!(failed.is_failure());
        assert_eq!(failed.captured_text(), None);
        assert_eq!(failed.feedback(), "Error: boom");
        assert_eq!(failed.failure().map(ToString::to_string).as_deref(), Some("Error: boom"));
    }
}
