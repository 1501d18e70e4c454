//! Lexer, AST definitions, and parser for the Moo scripting language.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use error::{SyntaxError, SyntaxErrorKind};
pub use lexer::Lexer;
pub use parser::{parse, Parser};
pub use token::{Token, TokenKind};
