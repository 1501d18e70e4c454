//! Runtime errors.

use std::fmt;
use std::rc::Rc;

use moo_common::{ErrorKind, SourcePos};
use thiserror::Error;

use crate::value::{ErrValue, Value};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// One line of a stack trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub name: String,
    pub pos: SourcePos,
    pub line: Option<String>,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pos.is_none() {
            write!(f, "in {}", self.name)?;
        } else {
            write!(f, "in {} at line {}", self.name, self.pos.line)?;
        }
        if let Some(line) = &self.line {
            write!(f, ": {}", line.trim())?;
        }
        Ok(())
    }
}

/// An error raised while executing bytecode.
///
/// Carries the same kind and message as the error value a `catch` binds,
/// plus where it was raised and the frames it unwound through.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {}", describe(.kind, .message))]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub pos: SourcePos,
    pub trace: Vec<TraceEntry>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            pos: SourcePos::NONE,
            trace: Vec::new(),
        }
    }

    pub fn bare(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            pos: SourcePos::NONE,
            trace: Vec::new(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvArg, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Range, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::System, message)
    }

    /// Set the position unless one was already recorded.
    pub fn located(mut self, pos: SourcePos) -> Self {
        if self.pos.is_none() {
            self.pos = pos;
        }
        self
    }

    pub fn from_value(err: &ErrValue) -> Self {
        Self {
            kind: err.kind,
            message: err.message.as_ref().map(|m| m.to_string()),
            pos: SourcePos::NONE,
            trace: Vec::new(),
        }
    }

    /// The error value bound by `catch ... as e`.
    pub fn to_value(&self) -> Value {
        Value::Err(ErrValue {
            kind: self.kind,
            message: self.message.as_deref().map(Rc::from),
        })
    }

    /// The error line followed by one line per unwound frame.
    pub fn report(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.trace.len() + 1);
        if self.pos.is_none() {
            lines.push(self.to_string());
        } else {
            lines.push(format!("{} (line {})", self, self.pos.line));
        }
        lines.extend(self.trace.iter().map(|entry| format!("  {}", entry)));
        lines
    }
}

fn describe<'a>(kind: &ErrorKind, message: &'a Option<String>) -> &'a str {
    message.as_deref().unwrap_or_else(|| kind.description())
}

impl From<ErrorKind> for RuntimeError {
    fn from(kind: ErrorKind) -> Self {
        RuntimeError::bare(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_default_description() {
        assert_eq!(RuntimeError::bare(ErrorKind::Div).to_string(), "E_DIV: division by zero");
        assert_eq!(
            RuntimeError::range("index 666 out of range").to_string(),
            "E_RANGE: index 666 out of range"
        );
    }

    #[test]
    fn test_located_keeps_first_position() {
        let err = RuntimeError::bare(ErrorKind::Type)
            .located(SourcePos::new(3, 4))
            .located(SourcePos::new(9, 9));
        assert_eq!(err.pos, SourcePos::new(3, 4));
    }

    #[test]
    fn test_value_round_trip_keeps_message() {
        let err = RuntimeError::new(ErrorKind::User3, "boom");
        match err.to_value() {
            Value::Err(ev) => assert_eq!(RuntimeError::from_value(&ev).message.as_deref(), Some("boom")),
            other => panic!("expected error value, got {:?}", other),
        }
    }

    #[test]
    fn test_report_lists_frames() {
        let mut err = RuntimeError::new(ErrorKind::VerbNf, "verb `go` not found").located(SourcePos::new(2, 1));
        err.trace.push(TraceEntry {
            name: "#5:look".into(),
            pos: SourcePos::new(2, 1),
            line: Some("  this.go();".into()),
        });
        let report = err.report();
        assert_eq!(report[0], "E_VERBNF: verb `go` not found (line 2)");
        assert_eq!(report[1], "  in #5:look at line 2: this.go();");
    }
}
