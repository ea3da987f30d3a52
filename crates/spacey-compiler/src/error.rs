//! Error types for compilation and execution.

use thiserror::Error;

/// Result type for compiler and interpreter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the lexer, the compiler, and the reference interpreter.
///
/// Compile errors always abort the whole compilation; there is no partial
/// result to recover.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed source or a static semantics violation.
    #[error("SyntaxError: {message} (line {line})")]
    SyntaxError {
        /// Description of the problem
        message: String,
        /// Best known source line
        line: u32,
    },

    /// An implementation limit was exceeded.
    #[error("InternalError: {message} (line {line})")]
    InternalError {
        /// Description of the exhausted limit
        message: String,
        /// Best known source line
        line: u32,
    },

    /// Type error raised at run time.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Unresolvable reference or invalid assignment target at run time.
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Range error raised at run time.
    #[error("RangeError: {0}")]
    RangeError(String),

    /// A value was thrown and not caught.
    #[error("Uncaught {0}")]
    Uncaught(String),

    /// I/O failure while loading source.
    #[error("IOError: {0}")]
    Io(String),
}

impl Error {
    /// Creates a syntax error at `line`.
    pub fn syntax(message: impl Into<String>, line: u32) -> Self {
        Error::SyntaxError {
            message: message.into(),
            line,
        }
    }

    /// Creates an internal (limit) error at `line`.
    pub fn internal(message: impl Into<String>, line: u32) -> Self {
        Error::InternalError {
            message: message.into(),
            line,
        }
    }

    /// Returns true for compile-time syntax errors.
    pub fn is_syntax_error(&self) -> bool {
        matches!(self, Error::SyntaxError { .. })
    }

    /// Returns true for implementation-limit errors.
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Error::InternalError { .. })
    }

    /// Returns the error message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::SyntaxError { message, .. } | Error::InternalError { message, .. } => message,
            Error::TypeError(m)
            | Error::ReferenceError(m)
            | Error::RangeError(m)
            | Error::Uncaught(m)
            | Error::Io(m) => m,
        }
    }

    /// Returns the source line for compile errors.
    pub fn line(&self) -> Option<u32> {
        match self {
            Error::SyntaxError { line, .. } | Error::InternalError { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = Error::syntax("unexpected token", 3);
        assert_eq!(err.to_string(), "SyntaxError: unexpected token (line 3)");
        assert!(err.is_syntax_error());
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_internal_error_display() {
        let err = Error::internal("out of consts", 1);
        assert_eq!(err.to_string(), "InternalError: out of consts (line 1)");
        assert!(err.is_internal_error());
        assert_eq!(err.message(), "out of consts");
    }

    #[test]
    fn test_runtime_errors_have_no_line() {
        assert_eq!(Error::TypeError("x".into()).line(), None);
        assert_eq!(Error::Uncaught("1".into()).to_string(), "Uncaught 1");
    }
}
