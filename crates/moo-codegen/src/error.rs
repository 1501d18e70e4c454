//! Compile errors.

use moo_common::{Diagnostic, Span};
use moo_syntax::SyntaxError;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// Well-formed source the coder cannot accept, e.g. `break` outside a loop.
    #[error("{message} at line {}, column {}", span.line, span.col)]
    Semantic { message: String, span: Span },
    /// The coder produced inconsistent bytecode.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        CompileError::Semantic {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Syntax(err) => Some(err.span),
            CompileError::Semantic { span, .. } => Some(*span),
            CompileError::Internal(_) => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Syntax(err) => err.to_diagnostic(),
            CompileError::Semantic { message, span } => Diagnostic::error(message.clone()).with_span(*span),
            CompileError::Internal(message) => Diagnostic::error(format!("internal compiler error: {}", message))
                .with_note("this is a bug in the compiler"),
        }
    }
}
