//! Source text management.
//!
//! A `SourceFile` owns the program text of one verb or script together with
//! a table of line starts, so that byte offsets can be mapped back to lines
//! for diagnostics and runtime tracebacks.

use std::fmt;
use std::sync::Arc;

use crate::span::Span;

/// Line and column information for a position in a source file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LineCol {
    /// 1-indexed line number.
    pub line: u32,
    /// 1-indexed column number (in UTF-8 bytes).
    pub column: u32,
}

impl LineCol {
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A named piece of source text.
#[derive(Clone)]
pub struct SourceFile {
    name: Arc<str>,
    source: Arc<str>,
    /// Byte offsets of line starts. The first element is always 0.
    line_starts: Vec<u32>,
}

impl SourceFile {
    pub fn new(name: impl Into<Arc<str>>, source: impl Into<Arc<str>>) -> Self {
        let source = source.into();
        let line_starts = Self::compute_line_starts(&source);
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    fn compute_line_starts(source: &str) -> Vec<u32> {
        let mut starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                starts.push((i + 1) as u32);
            }
        }
        starts
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Shared handle to the text, for attaching to compiled code.
    #[inline]
    pub fn source_arc(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Content of the given 1-indexed line, without the trailing newline.
    pub fn line(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        let idx = (line - 1) as usize;
        let start = *self.line_starts.get(idx)? as usize;
        let end = match self.line_starts.get(idx + 1) {
            Some(next) => (*next as usize).saturating_sub(1),
            None => self.source.len(),
        };
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    /// Converts a byte offset to line/column.
    pub fn line_col(&self, offset: u32) -> LineCol {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let column = offset.saturating_sub(self.line_starts[line]) + 1;
        LineCol::new((line + 1) as u32, column)
    }

    pub fn span_text(&self, span: Span) -> &str {
        let start = (span.lo as usize).min(self.source.len());
        let end = (span.hi as usize).min(self.source.len());
        &self.source[start..end]
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("len", &self.source.len())
            .field("lines", &self.line_starts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let lc = LineCol::new(10, 5);
        assert_eq!(format!("{}", lc), "10:5");
    }

    #[test]
    fn test_source_file_lines() {
        let file = SourceFile::new("test.moo", "line1\nline2\r\nline3");
        assert_eq!(file.line_count(), 3);
        assert_eq!(file.line(1), Some("line1"));
        assert_eq!(file.line(2), Some("line2"));
        assert_eq!(file.line(3), Some("line3"));
        assert_eq!(file.line(0), None);
        assert_eq!(file.line(4), None);
    }

    #[test]
    fn test_source_file_line_col() {
        let file = SourceFile::new("test.moo", "abc\ndefgh\nij");
        assert_eq!(file.line_col(0), LineCol::new(1, 1));
        assert_eq!(file.line_col(2), LineCol::new(1, 3));
        assert_eq!(file.line_col(4), LineCol::new(2, 1));
        assert_eq!(file.line_col(7), LineCol::new(2, 4));
        assert_eq!(file.line_col(11), LineCol::new(3, 2));
    }

    #[test]
    fn test_span_text() {
        let file = SourceFile::new("test.moo", "hello world");
        assert_eq!(file.span_text(Span::new(6, 11, 1, 7, 12)), "world");
    }
}
