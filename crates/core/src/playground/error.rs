use thiserror::Error;

/// A snippet that could not be tokenized or parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("SyntaxError: {message} (line {line}, column {column})")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl SyntaxError {
    #[must_use]
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}
