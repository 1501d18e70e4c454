//! Source spans.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A line/column pair attached to generated code for error tracebacks.
///
/// Both fields are 1-indexed; `SourcePos::NONE` (all zeros) marks code with
/// no source counterpart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourcePos {
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    pub const NONE: SourcePos = SourcePos { line: 0, col: 0 };

    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    #[inline]
    pub const fn is_none(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A region of source text.
///
/// `lo..hi` is the byte range; `line`, `col` and `end_col` locate the first
/// character and the column just past the last character on the starting
/// line (1-indexed).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    pub lo: u32,
    pub hi: u32,
    pub line: u32,
    pub col: u32,
    pub end_col: u32,
}

impl Span {
    #[inline]
    pub const fn new(lo: u32, hi: u32, line: u32, col: u32, end_col: u32) -> Self {
        Self { lo, hi, line, col, end_col }
    }

    /// A zero-width span at the given position.
    #[inline]
    pub const fn point(lo: u32, line: u32, col: u32) -> Self {
        Self { lo, hi: lo, line, col, end_col: col }
    }

    #[inline]
    pub const fn dummy() -> Self {
        Self { lo: 0, hi: 0, line: 0, col: 0, end_col: 0 }
    }

    /// Span from the start of `self` to the end of `other`.
    pub fn to(&self, other: &Span) -> Span {
        let end_col = if other.line == self.line { other.end_col } else { self.end_col };
        Span {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
            line: self.line,
            col: self.col,
            end_col,
        }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.hi - self.lo
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hi == self.lo
    }

    #[inline]
    pub fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.col)
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.line, self.col, self.end_col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to_same_line() {
        let a = Span::new(0, 3, 1, 1, 4);
        let b = Span::new(6, 9, 1, 7, 10);
        let merged = a.to(&b);
        assert_eq!(merged.lo, 0);
        assert_eq!(merged.hi, 9);
        assert_eq!(merged.col, 1);
        assert_eq!(merged.end_col, 10);
    }

    #[test]
    fn test_span_to_other_line() {
        let a = Span::new(0, 3, 1, 1, 4);
        let b = Span::new(10, 12, 2, 3, 5);
        let merged = a.to(&b);
        assert_eq!(merged.line, 1);
        assert_eq!(merged.end_col, 4);
        assert_eq!(merged.hi, 12);
    }

    #[test]
    fn test_source_pos_display() {
        assert_eq!(SourcePos::new(3, 14).to_string(), "3:14");
        assert!(SourcePos::NONE.is_none());
    }
}
