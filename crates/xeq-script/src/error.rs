use thiserror::Error;

use crate::parser::{ParseError, ParseErrorKind};

/// A Python-style exception. `Display` renders the exception message only,
/// which is what `str(exc)` gives in Python.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("{message} (<string>, line {line})")]
    Syntax { message: String, line: usize },
    #[error("{message} (<string>, line {line})")]
    Indentation { message: String, line: usize },
    #[error("{0}")]
    Unsupported(String),
    #[error("name '{0}' is not defined")]
    Name(String),
    #[error("No module named '{0}'")]
    ModuleNotFound(String),
    #[error("{0}")]
    Import(String),
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    ZeroDivision(String),
    #[error("{0}")]
    Overflow(String),
    #[error("{0}")]
    Index(String),
    #[error("{0}")]
    Attribute(String),
    #[error("{0}")]
    Runtime(String),
}

impl ScriptError {
    #[must_use]
    pub fn exception_name(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "SyntaxError",
            Self::Indentation { .. } => "IndentationError",
            Self::Unsupported(_) => "NotImplementedError",
            Self::Name(_) => "NameError",
            Self::ModuleNotFound(_) => "ModuleNotFoundError",
            Self::Import(_) => "ImportError",
            Self::Type(_) => "TypeError",
            Self::Value(_) => "ValueError",
            Self::ZeroDivision(_) => "ZeroDivisionError",
            Self::Overflow(_) => "OverflowError",
            Self::Index(_) => "IndexError",
            Self::Attribute(_) => "AttributeError",
            Self::Runtime(_) => "RuntimeError",
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::Value(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}

impl From<ParseError> for ScriptError {
    fn from(err: ParseError) -> Self {
        match err.kind {
            ParseErrorKind::Syntax => Self::Syntax {
                message: err.message,
                line: err.line,
            },
            ParseErrorKind::Indentation => Self::Indentation {
                message: err.message,
                line: err.line,
            },
            ParseErrorKind::Unsupported => Self::Unsupported(err.message),
        }
    }
}
