//! Token definitions for the Moo lexer.

use std::fmt;

use moo_common::ErrorKind;
pub use moo_common::Span;

/// A token with its kind, source text and span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }
}

/// Token kinds for Moo.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ═══════════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════════
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    /// `#123`
    Obj(i64),
    /// `$name` outside a string
    TraitName(String),
    /// `E_RANGE` and friends
    Error(ErrorKind),

    // ═══════════════════════════════════════════════════════════════════════
    // String interpolation
    // ═══════════════════════════════════════════════════════════════════════
    /// Opening quote of a string containing substitutions.
    InterpStart,
    /// Start of one `${...}` or `$ident` substitution.
    InterpOpen,
    /// End of one substitution.
    InterpClose,
    /// Closing quote of an interpolated string.
    InterpEnd,

    // ═══════════════════════════════════════════════════════════════════════
    // Keywords
    // ═══════════════════════════════════════════════════════════════════════
    If,
    Else,
    While,
    For,
    In,
    Try,
    Catch,
    As,
    Break,
    Continue,
    Return,
    Throw,
    Suspend,
    Fork,
    When,
    Is,
    Fn,
    True,
    False,
    Null,
    Any,

    // ═══════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    Caret,   // ^

    Eq,    // ==
    NotEq, // !=
    Lt,    // <
    LtEq,  // <=
    Gt,    // >
    GtEq,  // >=

    And, // &&
    Or,  // ||
    Not, // !

    PlusPlus,   // ++
    MinusMinus, // --
    Arrow,      // ->
    DotDot,     // ..
    Question,   // ?
    Elvis,      // ?:

    // ═══════════════════════════════════════════════════════════════════════
    // Assignment
    // ═══════════════════════════════════════════════════════════════════════
    Assign,        // =
    PlusAssign,    // +=
    MinusAssign,   // -=
    StarAssign,    // *=
    SlashAssign,   // /=
    PercentAssign, // %=
    CaretAssign,   // ^=

    // ═══════════════════════════════════════════════════════════════════════
    // Delimiters
    // ═══════════════════════════════════════════════════════════════════════
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }
    Comma,    // ,
    Colon,    // :
    Semi,     // ;
    Dot,      // .

    Eof,
}

impl TokenKind {
    /// Get a human-readable name for this token kind.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Ident(_) => "identifier",
            TokenKind::Int(_) => "integer",
            TokenKind::Float(_) => "float",
            TokenKind::Str(_) => "string",
            TokenKind::Obj(_) => "object reference",
            TokenKind::TraitName(_) => "trait reference",
            TokenKind::Error(_) => "error literal",
            TokenKind::InterpStart => "interpolated string",
            TokenKind::InterpOpen => "substitution",
            TokenKind::InterpClose => "end of substitution",
            TokenKind::InterpEnd => "end of interpolated string",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::As => "as",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Throw => "throw",
            TokenKind::Suspend => "suspend",
            TokenKind::Fork => "fork",
            TokenKind::When => "when",
            TokenKind::Is => "is",
            TokenKind::Fn => "fn",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Any => "ANY",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Not => "!",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Arrow => "->",
            TokenKind::DotDot => "..",
            TokenKind::Question => "?",
            TokenKind::Elvis => "?:",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::CaretAssign => "^=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semi => ";",
            TokenKind::Dot => ".",
            TokenKind::Eof => "end of input",
        }
    }

    /// Whether a token of this kind ends an operand, so that a following `-`
    /// is binary subtraction rather than the sign of a numeric literal.
    pub fn produces_value(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::Obj(_)
                | TokenKind::TraitName(_)
                | TokenKind::Error(_)
                | TokenKind::InterpEnd
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
