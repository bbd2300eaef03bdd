//! Error types for loading circuits and running inference.

use thiserror::Error;

/// Errors raised while loading a network or evaluating it.
#[derive(Debug, Error)]
pub enum Error {
    /// The circuit or literal-map file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed circuit or literal-map content.
    ///
    /// `line` is the 1-based source line, or 0 when the problem is not tied to a line.
    #[error("format error at line {line}: {message}")]
    Format { line: usize, message: String },

    /// A nonzero product underflowed to 0.0 while evaluating a multiply node.
    #[error("arithmetic error: Underflow at node {node}")]
    Underflow { node: usize },

    /// The requested evidence change is not allowed; the evidence is left unchanged.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A query was issued before the evaluation pass it depends on.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        Error::Format {
            line,
            message: message.into(),
        }
    }

    /// Attaches a source line to a format error raised without one.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            Error::Format { line: 0, message } => Error::Format { line, message },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
