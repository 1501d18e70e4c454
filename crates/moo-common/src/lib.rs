//! Shared infrastructure for the Moo toolchain.
//!
//! - `span` - byte ranges with line/column information
//! - `source` - source text with line tables
//! - `diagnostics` - terminal rendering of positioned errors
//! - `error_kind` - the closed set of runtime error kinds

pub mod diagnostics;
pub mod error_kind;
pub mod source;
pub mod span;

pub use diagnostics::{Diagnostic, Severity};
pub use error_kind::ErrorKind;
pub use source::{LineCol, SourceFile};
pub use span::{Span, SourcePos};
