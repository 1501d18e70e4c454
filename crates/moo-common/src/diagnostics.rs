//! Diagnostic rendering.
//!
//! Compile errors carry a `Span`; this module turns them into the familiar
//! annotated-snippet output via `codespan-reporting`.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::{self, Config};
use termcolor::{ColorChoice, NoColor, StandardStream, WriteColor};

use crate::source::SourceFile;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// A positioned message about a piece of source text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    fn to_codespan(&self) -> CsDiagnostic<()> {
        let diag = match self.severity {
            Severity::Error => CsDiagnostic::error(),
            Severity::Warning => CsDiagnostic::warning(),
            Severity::Note => CsDiagnostic::note(),
        };
        let mut diag = diag.with_message(&self.message);
        if let Some(span) = self.span {
            let hi = if span.hi > span.lo { span.hi } else { span.lo + 1 };
            diag = diag.with_labels(vec![Label::primary((), span.lo as usize..hi as usize)]);
        }
        diag.with_notes(self.notes.clone())
    }

    /// Writes the diagnostic to any color-capable writer.
    pub fn emit_to(&self, writer: &mut dyn WriteColor, file: &SourceFile) -> std::io::Result<()> {
        // Clamp the label into the text so trailing-EOF errors still render.
        let mut text = file.source().to_string();
        if let Some(span) = self.span {
            while text.len() <= span.lo as usize {
                text.push(' ');
            }
        }
        let files = SimpleFile::new(file.name(), text);
        term::emit(writer, &Config::default(), &files, &self.to_codespan())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    /// Renders the diagnostic to a plain string.
    pub fn render(&self, file: &SourceFile) -> String {
        let mut out = NoColor::new(Vec::new());
        if self.emit_to(&mut out, file).is_err() {
            return self.message.clone();
        }
        String::from_utf8_lossy(&out.into_inner()).into_owned()
    }

    /// Prints the diagnostic to stderr.
    pub fn emit(&self, file: &SourceFile, color: bool) -> std::io::Result<()> {
        let choice = if color { ColorChoice::Auto } else { ColorChoice::Never };
        let stream = StandardStream::stderr(choice);
        let mut lock = stream.lock();
        self.emit_to(&mut lock, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_message_and_location() {
        let file = SourceFile::new("greet.moo", "x = 1;\ny = ;\n");
        let diag = Diagnostic::error("unexpected token `;`")
            .with_span(Span::new(11, 12, 2, 5, 6))
            .with_note("expected an expression");
        let text = diag.render(&file);
        assert!(text.contains("unexpected token `;`"));
        assert!(text.contains("greet.moo:2:5"));
        assert!(text.contains("expected an expression"));
    }

    #[test]
    fn test_render_past_end_of_input() {
        let file = SourceFile::new("eof.moo", "x = \"abc");
        let diag = Diagnostic::error("unterminated string").with_span(Span::point(8, 1, 9));
        assert!(diag.render(&file).contains("unterminated string"));
    }
}
