//! Error handling for bahasa

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================

    #[error("line {line}: {message}")]
    Lex { message: String, line: usize },

    // ==================== Parser Errors ====================

    #[error("line {line}: {message}")]
    Parse { message: String, line: usize },

    // ==================== Code Generation Errors ====================

    #[error("code generation error: {message}")]
    Codegen { message: String },

    // ==================== Evaluation Errors ====================

    #[error("runtime error: {message}")]
    Runtime { message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("link error: {0}")]
    Link(String),
}

impl Error {
    pub fn lex(message: impl Into<String>, line: usize) -> Self {
        Self::Lex { message: message.into(), line }
    }

    pub fn parse(message: impl Into<String>, line: usize) -> Self {
        Self::Parse { message: message.into(), line }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::Codegen { message: message.into() }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime { message: message.into() }
    }

    /// Get the source line associated with this error
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. } | Self::Parse { line, .. } => Some(*line),
            Self::Codegen { .. } | Self::Runtime { .. } | Self::Io(_) | Self::Link(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_display() {
        let err = Error::lex("unterminated string", 3);
        assert_eq!(err.to_string(), "line 3: unterminated string");
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_codegen_has_no_line() {
        let err = Error::codegen("unknown function: f");
        assert_eq!(err.line(), None);
        assert!(err.to_string().contains("unknown function: f"));
    }
}
