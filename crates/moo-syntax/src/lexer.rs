//! Lexer for Moo source code.
//!
//! A character-level state machine. String literals containing `${expr}` or
//! `$ident` substitutions are split into `InterpStart`, string pieces,
//! `InterpOpen … InterpClose` groups and `InterpEnd`; a mode stack lets the
//! lexer tokenize ordinary code inside a substitution, including nested
//! braces and nested strings.

use std::collections::VecDeque;

use moo_common::ErrorKind;

use crate::error::{SyntaxError, SyntaxResult};
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Ordinary code; `depth` counts unmatched `{` inside a substitution.
    Code { depth: u32 },
    /// Inside the text of an interpolated string.
    Str,
}

/// Cursor state, saved and restored when a string turns out to interpolate.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    pos: usize,
    ch: Option<char>,
    line: u32,
    col: u32,
}

pub struct Lexer<'a> {
    input: &'a str,
    cur: Cursor,
    prev_kind: Option<TokenKind>,
    modes: Vec<Mode>,
    pending: VecDeque<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cur: Cursor {
                pos: 0,
                ch: input.chars().next(),
                line: 1,
                col: 1,
            },
            prev_kind: None,
            modes: vec![Mode::Code { depth: 0 }],
            pending: VecDeque::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Cursor
    // ═══════════════════════════════════════════════════════════════════════

    fn bump(&mut self) {
        if let Some(c) = self.cur.ch {
            self.cur.pos += c.len_utf8();
            if c == '\n' {
                self.cur.line += 1;
                self.cur.col = 1;
            } else {
                self.cur.col += 1;
            }
            self.cur.ch = self.input[self.cur.pos..].chars().next();
        }
    }

    fn peek_char(&self) -> Option<char> {
        let c = self.cur.ch?;
        self.input[self.cur.pos + c.len_utf8()..].chars().next()
    }

    fn peek_char2(&self) -> Option<char> {
        let mut it = self.input[self.cur.pos..].chars();
        it.next();
        it.next();
        it.next()
    }

    fn span_from(&self, start: Cursor) -> Span {
        let end_col = if self.cur.line == start.line { self.cur.col } else { start.col + 1 };
        Span::new(start.pos as u32, self.cur.pos as u32, start.line, start.col, end_col)
    }

    fn token_from(&self, start: Cursor, kind: TokenKind) -> Token {
        let text = &self.input[start.pos..self.cur.pos];
        Token::new(kind, text, self.span_from(start))
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        let c = self.cur;
        SyntaxError::lexical(message, Span::point(c.pos as u32, c.line, c.col))
    }

    fn prev_produces_value(&self) -> bool {
        self.prev_kind.as_ref().map_or(false, |k| k.produces_value())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entry points
    // ═══════════════════════════════════════════════════════════════════════

    /// Get the next token.
    pub fn next_token(&mut self) -> SyntaxResult<Token> {
        let tok = match self.pending.pop_front() {
            Some(tok) => tok,
            None => match self.modes.last() {
                Some(Mode::Str) => self.lex_string_piece()?,
                _ => self.lex_code()?,
            },
        };
        self.prev_kind = Some(tok.kind.clone());
        Ok(tok)
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> SyntaxResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Code mode
    // ═══════════════════════════════════════════════════════════════════════

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.cur.ch {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.peek_char() == Some('/') {
                while self.cur.ch.is_some() && self.cur.ch != Some('\n') {
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn lex_code(&mut self) -> SyntaxResult<Token> {
        self.skip_whitespace();
        let start = self.cur;

        let c = match self.cur.ch {
            Some(c) => c,
            None => {
                if self.modes.len() > 1 {
                    return Err(self.error_here("unterminated string substitution at end of input"));
                }
                return Ok(Token::new(TokenKind::Eof, "", self.span_from(start)));
            }
        };

        let kind = match c {
            c if c.is_alphabetic() || c == '_' => {
                let text = self.read_ident_text();
                Self::lookup_ident(text)
            }
            '0'..='9' => self.read_number(start)?,
            '.' if self.peek_char().map_or(false, |n| n.is_ascii_digit()) && !self.prev_produces_value() => {
                self.read_number(start)?
            }
            '"' => return self.lex_string(start),
            '#' => {
                self.bump();
                let negative = self.cur.ch == Some('-');
                if negative {
                    self.bump();
                }
                let digits_start = self.cur.pos;
                while self.cur.ch.map_or(false, |c| c.is_ascii_digit()) {
                    self.bump();
                }
                if digits_start == self.cur.pos {
                    return Err(self.error_here("expected object number after `#`"));
                }
                let n: i64 = self.input[digits_start..self.cur.pos]
                    .parse()
                    .map_err(|_| SyntaxError::lexical("object number out of range", self.span_from(start)))?;
                TokenKind::Obj(if negative { -n } else { n })
            }
            '$' => {
                self.bump();
                if !self.cur.ch.map_or(false, |c| c.is_alphabetic() || c == '_') {
                    return Err(self.error_here("expected trait name after `$`"));
                }
                TokenKind::TraitName(self.read_ident_text().to_string())
            }
            '-' => {
                let signed_number = !self.prev_produces_value()
                    && match self.peek_char() {
                        Some(d) if d.is_ascii_digit() => true,
                        Some('.') => self.peek_char2().map_or(false, |d| d.is_ascii_digit()),
                        _ => false,
                    };
                if signed_number {
                    self.read_number(start)?
                } else {
                    self.bump();
                    match self.cur.ch {
                        Some('-') => {
                            self.bump();
                            TokenKind::MinusMinus
                        }
                        Some('=') => {
                            self.bump();
                            TokenKind::MinusAssign
                        }
                        Some('>') => {
                            self.bump();
                            TokenKind::Arrow
                        }
                        _ => TokenKind::Minus,
                    }
                }
            }
            '+' => {
                self.bump();
                match self.cur.ch {
                    Some('+') => {
                        self.bump();
                        TokenKind::PlusPlus
                    }
                    Some('=') => {
                        self.bump();
                        TokenKind::PlusAssign
                    }
                    _ => TokenKind::Plus,
                }
            }
            '*' => self.with_assign(TokenKind::Star, TokenKind::StarAssign),
            '/' => self.with_assign(TokenKind::Slash, TokenKind::SlashAssign),
            '%' => self.with_assign(TokenKind::Percent, TokenKind::PercentAssign),
            '^' => self.with_assign(TokenKind::Caret, TokenKind::CaretAssign),
            '=' => self.with_assign(TokenKind::Assign, TokenKind::Eq),
            '!' => self.with_assign(TokenKind::Not, TokenKind::NotEq),
            '<' => self.with_assign(TokenKind::Lt, TokenKind::LtEq),
            '>' => self.with_assign(TokenKind::Gt, TokenKind::GtEq),
            '&' => self.doubled('&', TokenKind::And)?,
            '|' => self.doubled('|', TokenKind::Or)?,
            '.' => {
                self.bump();
                if self.cur.ch == Some('.') {
                    self.bump();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '?' => {
                self.bump();
                if self.cur.ch == Some(':') {
                    self.bump();
                    TokenKind::Elvis
                } else {
                    TokenKind::Question
                }
            }
            '{' => {
                self.bump();
                if let Some(Mode::Code { depth }) = self.modes.last_mut() {
                    *depth += 1;
                }
                TokenKind::LBrace
            }
            '}' => {
                self.bump();
                let closes_substitution =
                    self.modes.len() > 1 && self.modes.last() == Some(&Mode::Code { depth: 0 });
                if closes_substitution {
                    self.modes.pop();
                    TokenKind::InterpClose
                } else {
                    if let Some(Mode::Code { depth }) = self.modes.last_mut() {
                        *depth = depth.saturating_sub(1);
                    }
                    TokenKind::RBrace
                }
            }
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Semi),
            other => return Err(self.error_here(format!("unexpected character `{}`", other))),
        };

        Ok(self.token_from(start, kind))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    /// `op` or `op=`.
    fn with_assign(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        self.bump();
        if self.cur.ch == Some('=') {
            self.bump();
            with_eq
        } else {
            plain
        }
    }

    fn doubled(&mut self, c: char, kind: TokenKind) -> SyntaxResult<TokenKind> {
        if self.peek_char() == Some(c) {
            self.bump();
            self.bump();
            Ok(kind)
        } else {
            Err(self.error_here(format!("unexpected character `{}`", c)))
        }
    }

    fn read_ident_text(&mut self) -> &'a str {
        let input = self.input;
        let start = self.cur.pos;
        while let Some(c) = self.cur.ch {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        &input[start..self.cur.pos]
    }

    /// Look up keyword, error literal, or return identifier.
    fn lookup_ident(ident: &str) -> TokenKind {
        match ident {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "as" => TokenKind::As,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "throw" => TokenKind::Throw,
            "suspend" => TokenKind::Suspend,
            "fork" => TokenKind::Fork,
            "when" => TokenKind::When,
            "is" => TokenKind::Is,
            "fn" => TokenKind::Fn,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "ANY" => TokenKind::Any,
            _ => match ErrorKind::from_name(ident) {
                Some(kind) => TokenKind::Error(kind),
                None => TokenKind::Ident(ident.to_string()),
            },
        }
    }

    /// Read a number, with an optional leading `-` already under the cursor.
    fn read_number(&mut self, start: Cursor) -> SyntaxResult<TokenKind> {
        if self.cur.ch == Some('-') {
            self.bump();
        }
        let mut is_float = false;
        while self.cur.ch.map_or(false, |c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.cur.ch == Some('.') && self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while self.cur.ch.map_or(false, |c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.cur.ch, Some('e') | Some('E')) {
            let exp_follows = match self.peek_char() {
                Some(d) if d.is_ascii_digit() => true,
                Some('+') | Some('-') => self.peek_char2().map_or(false, |d| d.is_ascii_digit()),
                _ => false,
            };
            if exp_follows {
                is_float = true;
                self.bump();
                if matches!(self.cur.ch, Some('+') | Some('-')) {
                    self.bump();
                }
                while self.cur.ch.map_or(false, |c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        let text = &self.input[start.pos..self.cur.pos];
        if is_float {
            text.parse()
                .map(TokenKind::Float)
                .map_err(|_| SyntaxError::lexical(format!("invalid float literal `{}`", text), self.span_from(start)))
        } else {
            text.parse()
                .map(TokenKind::Int)
                .map_err(|_| SyntaxError::lexical(format!("integer literal `{}` out of range", text), self.span_from(start)))
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Strings
    // ═══════════════════════════════════════════════════════════════════════

    fn escape(c: char) -> char {
        match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        }
    }

    fn starts_substitution(&self) -> bool {
        self.cur.ch == Some('$')
            && self.peek_char().map_or(false, |c| c == '{' || c.is_alphabetic() || c == '_')
    }

    /// A string in code mode: either a plain `Str` token, or the opening of
    /// an interpolated string.
    fn lex_string(&mut self, start: Cursor) -> SyntaxResult<Token> {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.cur.ch {
                None => {
                    return Err(SyntaxError::lexical("unterminated string", self.span_from(start)));
                }
                Some('"') => {
                    self.bump();
                    return Ok(self.token_from(start, TokenKind::Str(text)));
                }
                Some('\\') => {
                    self.bump();
                    match self.cur.ch {
                        Some(c) => {
                            text.push(Self::escape(c));
                            self.bump();
                        }
                        None => {
                            return Err(SyntaxError::lexical("unterminated string", self.span_from(start)));
                        }
                    }
                }
                Some('$') if self.starts_substitution() => break,
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }

        // Substitutions present: rewind to just after the quote and switch modes.
        self.cur = start;
        self.bump();
        self.modes.push(Mode::Str);
        Ok(self.token_from(start, TokenKind::InterpStart))
    }

    fn lex_string_piece(&mut self) -> SyntaxResult<Token> {
        let start = self.cur;
        let mut text = String::new();
        loop {
            match self.cur.ch {
                None => return Err(self.error_here("unterminated string")),
                Some('"') => {
                    if !text.is_empty() {
                        return Ok(self.token_from(start, TokenKind::Str(text)));
                    }
                    self.bump();
                    self.modes.pop();
                    return Ok(self.token_from(start, TokenKind::InterpEnd));
                }
                Some('\\') => {
                    self.bump();
                    match self.cur.ch {
                        Some(c) => {
                            text.push(Self::escape(c));
                            self.bump();
                        }
                        None => return Err(self.error_here("unterminated string")),
                    }
                }
                Some('$') if self.starts_substitution() => {
                    if !text.is_empty() {
                        return Ok(self.token_from(start, TokenKind::Str(text)));
                    }
                    self.bump(); // $
                    if self.cur.ch == Some('{') {
                        self.bump();
                        self.modes.push(Mode::Code { depth: 0 });
                        return Ok(self.token_from(start, TokenKind::InterpOpen));
                    }
                    let open = self.token_from(start, TokenKind::InterpOpen);
                    let ident_start = self.cur;
                    let name = self.read_ident_text().to_string();
                    let ident = self.token_from(ident_start, TokenKind::Ident(name));
                    let close = Token::new(TokenKind::InterpClose, "", Span::point(self.cur.pos as u32, self.cur.line, self.cur.col));
                    self.pending.push_back(ident);
                    self.pending.push_back(close);
                    return Ok(open);
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }
}

/// Tokenize a complete source string.
pub fn tokenize(source: &str) -> SyntaxResult<Vec<Token>> {
    Lexer::new(source).tokenize()
}
