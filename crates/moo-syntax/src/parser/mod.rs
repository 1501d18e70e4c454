//! Parser for Moo source code.
//!
//! Recursive descent over a pre-lexed token vector. There is no error
//! recovery: the first structurally invalid construct aborts the parse.

mod expr;
mod stmt;

use crate::ast::*;
use crate::error::{SyntaxError, SyntaxResult};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};

/// Parse a complete program into its top-level block.
pub fn parse(source: &str) -> SyntaxResult<Block> {
    Parser::new(source)?.parse_program()
}

/// Parser for Moo source code.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_id: NodeId,
}

impl Parser {
    /// Create a new parser, lexing the whole source up front.
    pub fn new(source: &str) -> SyntaxResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self::from_tokens(tokens))
    }

    /// Create a parser over an existing token stream. The stream must end in `Eof`.
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let span = tokens.last().map_or_else(Span::dummy, |t| Span::point(t.span.hi, t.span.line, t.span.end_col));
            tokens.push(Token::new(TokenKind::Eof, "", span));
        }
        Self {
            tokens,
            pos: 0,
            next_id: 0,
        }
    }

    /// Parse the whole token stream as one block.
    pub fn parse_program(&mut self) -> SyntaxResult<Block> {
        let start = self.current().span;
        let mut stmts = Vec::new();
        while !self.at_eof() {
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        let span = match stmts.last() {
            Some(last) => start.to(&last.span),
            None => start,
        };
        Ok(Block { stmts, span })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Token Management
    // ═══════════════════════════════════════════════════════════════════════

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + 1).min(last)]
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.current().span
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn prev_kind(&self) -> Option<&TokenKind> {
        if self.pos == 0 {
            None
        } else {
            Some(&self.tokens[self.pos - 1].kind)
        }
    }

    /// Advance to the next token.
    fn next_token(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Check if current token matches the given kind.
    fn cur_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    /// Check if peek token matches the given kind.
    fn peek_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn at_eof(&self) -> bool {
        self.cur_is(&TokenKind::Eof)
    }

    /// Consume current token if it matches, return true if consumed.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.cur_is(kind) {
            self.next_token();
            true
        } else {
            false
        }
    }

    /// Expect current token to match, consume and return its span.
    fn expect(&mut self, kind: &TokenKind) -> SyntaxResult<Span> {
        if self.cur_is(kind) {
            let span = self.current().span;
            self.next_token();
            Ok(span)
        } else {
            Err(self.error(&format!(
                "expected `{}`, found {}",
                kind.name(),
                self.describe_current()
            )))
        }
    }

    fn expect_ident(&mut self) -> SyntaxResult<Ident> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let ident = Ident::new(name.clone(), self.current().span);
                self.next_token();
                Ok(ident)
            }
            _ => Err(self.error(&format!("expected identifier, found {}", self.describe_current()))),
        }
    }

    /// A statement ends with `;`, which may be left out after a closing
    /// brace or before one.
    fn expect_terminator(&mut self) -> SyntaxResult<()> {
        if self.eat(&TokenKind::Semi) {
            return Ok(());
        }
        if matches!(self.prev_kind(), Some(TokenKind::RBrace))
            || self.cur_is(&TokenKind::RBrace)
            || self.at_eof()
        {
            return Ok(());
        }
        Err(self.error(&format!("expected `;`, found {}", self.describe_current())))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Node Construction
    // ═══════════════════════════════════════════════════════════════════════

    fn new_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn mk_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr {
            id: self.new_id(),
            kind,
            span,
        }
    }

    fn mk_stmt(&mut self, kind: StmtKind, span: Span) -> Stmt {
        Stmt {
            id: self.new_id(),
            kind,
            span,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Error Helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn describe_current(&self) -> String {
        let tok = self.current();
        match tok.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ if tok.text.is_empty() => format!("`{}`", tok.kind.name()),
            _ => format!("`{}`", tok.text),
        }
    }

    /// Create an error at the current position.
    fn error(&self, message: &str) -> SyntaxError {
        SyntaxError::parse(message, self.current().span)
    }

    fn error_at(&self, message: &str, span: Span) -> SyntaxError {
        SyntaxError::parse(message, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(src: &str) -> Block {
        parse(src).unwrap_or_else(|e| panic!("parse failed for {:?}: {}", src, e))
    }

    fn first_expr(src: &str) -> Expr {
        let block = parse_ok(src);
        match block.stmts.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(e)) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    /// Renders an expression fully parenthesized for precedence checks.
    fn sexp(e: &Expr) -> String {
        match &e.kind {
            ExprKind::Literal(Literal::Int(n)) => n.to_string(),
            ExprKind::Literal(Literal::Bool(b)) => b.to_string(),
            ExprKind::Literal(Literal::Str(s)) => format!("{:?}", s),
            ExprKind::Literal(Literal::Null) => "null".into(),
            ExprKind::Ident(i) => i.name.clone(),
            ExprKind::Binary { op, lhs, rhs } => format!("({} {} {})", sexp(lhs), op.symbol(), sexp(rhs)),
            ExprKind::Logical { op, lhs, rhs } => {
                let sym = if *op == LogicalOp::And { "&&" } else { "||" };
                format!("({} {} {})", sexp(lhs), sym, sexp(rhs))
            }
            ExprKind::Unary { op, expr } => {
                let sym = if *op == UnaryOp::Neg { "-" } else { "!" };
                format!("({}{})", sym, sexp(expr))
            }
            ExprKind::Elvis { lhs, rhs } => format!("({} ?: {})", sexp(lhs), sexp(rhs)),
            ExprKind::Cond { cond, then_expr, else_expr } => {
                format!("({} ? {} : {})", sexp(cond), sexp(then_expr), sexp(else_expr))
            }
            ExprKind::Index { target, index } => format!("{}[{}]", sexp(target), sexp(index)),
            ExprKind::Slice { target, from, to } => format!("{}[{}..{}]", sexp(target), sexp(from), sexp(to)),
            ExprKind::Prop { target, name } => format!("{}.{}", sexp(target), name.name),
            ExprKind::TraitOf { target, name } => format!("{}.${}", sexp(target), name.name),
            ExprKind::VerbCall { target, name, args } => format!(
                "{}.{}({})",
                sexp(target),
                name.name,
                args.iter().map(sexp).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::Call { callee, args } => format!(
                "{}({})",
                sexp(callee),
                args.iter().map(sexp).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::IsType { expr, ty } => format!("({} is {})", sexp(expr), ty.name()),
            other => format!("{:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(
            sexp(&first_expr("14 * 10 + 71 / 3 ^ 3;")),
            "((14 * 10) + (71 / (3 ^ 3)))"
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(sexp(&first_expr("2 ^ 3 ^ 2;")), "(2 ^ (3 ^ 2))");
    }

    #[test]
    fn test_logical_below_comparison() {
        assert_eq!(
            sexp(&first_expr("a < 1 && b == 2 || !c;")),
            "(((a < 1) && (b == 2)) || (!c))"
        );
    }

    #[test]
    fn test_elvis_and_ternary() {
        assert_eq!(sexp(&first_expr("a ?: b ? 1 : 2;")), "(a ?: (b ? 1 : 2))");
    }

    #[test]
    fn test_in_binds_looser_than_equality() {
        assert_eq!(sexp(&first_expr("x in xs == y;")), "(x in (xs == y))");
    }

    #[test]
    fn test_suffix_chain_is_left_fold() {
        assert_eq!(
            sexp(&first_expr("a.b[c].d(e).$f;")),
            "a.b[c].d(e).$f"
        );
        assert_eq!(sexp(&first_expr("xs[1..2];")), "xs[1..2]");
    }

    #[test]
    fn test_is_type_test() {
        assert_eq!(sexp(&first_expr("x + 1 is int;")), "((x + 1) is int)");
    }

    #[test]
    fn test_assignment_forms() {
        let block = parse_ok("x = 1; xs[0] += 2; o.name = \"n\"; x++; [a, b] = pair;");
        assert!(matches!(block.stmts[0].kind, StmtKind::Assign { op: AssignOp::Assign, .. }));
        assert!(matches!(block.stmts[1].kind, StmtKind::Assign { op: AssignOp::Add, .. }));
        assert!(matches!(block.stmts[2].kind, StmtKind::Assign { .. }));
        assert!(matches!(block.stmts[3].kind, StmtKind::IncDec { increment: true, .. }));
        match &block.stmts[4].kind {
            StmtKind::Destructure { targets, .. } => {
                let names: Vec<_> = targets.iter().map(|t| t.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("expected destructure, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("1 + 2 = 3;").unwrap_err();
        assert!(err.message.contains("cannot assign"));
    }

    #[test]
    fn test_for_forms() {
        let block = parse_ok(
            "for (x in xs) {} for (v, k in m) {} for (i in 1..10) {} for (i = 0; i < 3; i++) {}",
        );
        assert!(matches!(block.stmts[0].kind, StmtKind::ForIn { key: None, .. }));
        assert!(matches!(block.stmts[1].kind, StmtKind::ForIn { key: Some(_), .. }));
        assert!(matches!(block.stmts[2].kind, StmtKind::ForRange { .. }));
        assert!(matches!(block.stmts[3].kind, StmtKind::ForClassic(_)));
    }

    #[test]
    fn test_try_statement_and_expression() {
        let block = parse_ok(
            "try { f(); } catch (E_RANGE, E_INVARG) as e { g(e); }\n\
             y = try h() catch (E_DIV) -> 0;",
        );
        match &block.stmts[0].kind {
            StmtKind::Try(t) => {
                assert_eq!(
                    t.catch.kinds,
                    vec![moo_common::ErrorKind::Range, moo_common::ErrorKind::InvArg]
                );
                assert_eq!(t.catch.name.as_ref().map(|n| n.name.as_str()), Some("e"));
            }
            other => panic!("expected try, got {:?}", other),
        }
        match &block.stmts[1].kind {
            StmtKind::Assign { value, .. } => assert!(matches!(value.kind, ExprKind::TryExpr(_))),
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_catch_any() {
        let block = parse_ok("try { f(); } catch (ANY) { } try { f(); } catch { }");
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Try(t) => assert!(t.catch.kinds.is_empty()),
                other => panic!("expected try, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_when_expression() {
        let e = first_expr("when (x) { 1, 2 -> \"low\", else -> \"high\" };");
        match e.kind {
            ExprKind::When(w) => {
                assert!(w.subject.is_some());
                assert_eq!(w.arms.len(), 1);
                assert_eq!(w.arms[0].conds.len(), 2);
                assert!(w.else_arm.is_some());
            }
            other => panic!("expected when, got {:?}", other),
        }
    }

    #[test]
    fn test_function_literals() {
        let block = parse_ok("f = fn (a, b) { return a + b; }; g = fn (x) -> x * 2;");
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Assign { value, .. } => match &value.kind {
                    ExprKind::Func(f) => assert!(!f.params.is_empty()),
                    other => panic!("expected fn, got {:?}", other),
                },
                other => panic!("expected assignment, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_fork_and_suspend() {
        let block = parse_ok("t = fork (5) { notify(user, \"hi\"); }; v = suspend(2); suspend();");
        match &block.stmts[0].kind {
            StmtKind::Assign { value, .. } => assert!(matches!(value.kind, ExprKind::Fork(_))),
            other => panic!("expected fork assignment, got {:?}", other),
        }
        match &block.stmts[2].kind {
            StmtKind::Expr(e) => assert!(matches!(e.kind, ExprKind::Suspend(None))),
            other => panic!("expected suspend, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_literals() {
        let block = parse_ok("a = [1, 2]; m = [\"k\": 1, \"j\": 2]; e = [:]; l = [];");
        let kinds: Vec<_> = block
            .stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Assign { value, .. } => match &value.kind {
                    ExprKind::List(items) => format!("list{}", items.len()),
                    ExprKind::Map(pairs) => format!("map{}", pairs.len()),
                    other => format!("{:?}", other),
                },
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(kinds, vec!["list2", "map2", "map0", "list0"]);
    }

    #[test]
    fn test_interpolated_string() {
        let e = first_expr("\"n = ${n + 1}!\";");
        match e.kind {
            ExprKind::Interp(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], InterpPart::Text("n = ".into()));
                assert!(matches!(parts[1], InterpPart::Expr(_)));
            }
            other => panic!("expected interpolation, got {:?}", other),
        }
    }

    #[test]
    fn test_error_literal_with_message() {
        let e = first_expr("E_RANGE(\"too far\");");
        assert!(matches!(e.kind, ExprKind::ErrorMsg { kind: moo_common::ErrorKind::Range, .. }));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let block = parse_ok("for (x in xs) { for (y in ys) { z = x + y; } }");
        let mut ids = Vec::new();
        fn walk_block(b: &Block, ids: &mut Vec<NodeId>) {
            for s in &b.stmts {
                ids.push(s.id);
                if let StmtKind::ForIn { body, iter, .. } = &s.kind {
                    ids.push(iter.id);
                    walk_block(body, ids);
                }
            }
        }
        walk_block(&block, &mut ids);
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }

    #[test]
    fn test_missing_paren_reports_position() {
        let err = parse("if (x { y = 1; }").unwrap_err();
        assert_eq!(err.kind, crate::SyntaxErrorKind::Parse);
        assert!(err.message.contains("expected `)`"));
        assert_eq!((err.span.line, err.span.col), (1, 7));
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("x = 1 y = 2;").unwrap_err();
        assert!(err.message.contains("expected `;`"));
    }
}
