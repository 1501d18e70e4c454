//! Compile-time errors raised by the lexer and parser.

use std::fmt;

use moo_common::{Diagnostic, Span};
use thiserror::Error;

pub type SyntaxResult<T> = Result<T, SyntaxError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    Lexical,
    Parse,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxErrorKind::Lexical => f.write_str("lexical error"),
            SyntaxErrorKind::Parse => f.write_str("syntax error"),
        }
    }
}

/// A positioned compile error. There is no recovery: the first one aborts.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at line {}, column {}: {message}", span.line, span.col)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn lexical(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: SyntaxErrorKind::Lexical,
            message: message.into(),
            span,
        }
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: SyntaxErrorKind::Parse,
            message: message.into(),
            span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(format!("{}: {}", self.kind, self.message)).with_span(self.span)
    }
}
