//! Statement parsing for Moo.

use super::Parser;
use crate::ast::*;
use crate::error::SyntaxResult;
use crate::token::TokenKind;

impl Parser {
    // ═══════════════════════════════════════════════════════════════════════
    // Statement Entry Point
    // ═══════════════════════════════════════════════════════════════════════

    pub(super) fn parse_stmt(&mut self) -> SyntaxResult<Stmt> {
        match self.current().kind {
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(self.mk_stmt(StmtKind::Block(block), span))
            }
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Try if self.peek_is(&TokenKind::LBrace) => self.parse_try_stmt(),
            TokenKind::Return => {
                let start = self.expect(&TokenKind::Return)?;
                let value = if self.cur_is(&TokenKind::Semi)
                    || self.cur_is(&TokenKind::RBrace)
                    || self.at_eof()
                {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let span = start.to(&self.prev_span());
                self.expect_terminator()?;
                Ok(self.mk_stmt(StmtKind::Return(value), span))
            }
            TokenKind::Throw => {
                let start = self.expect(&TokenKind::Throw)?;
                let value = self.parse_expr()?;
                let span = start.to(&value.span);
                self.expect_terminator()?;
                Ok(self.mk_stmt(StmtKind::Throw(value), span))
            }
            TokenKind::Break => {
                let span = self.expect(&TokenKind::Break)?;
                self.expect_terminator()?;
                Ok(self.mk_stmt(StmtKind::Break, span))
            }
            TokenKind::Continue => {
                let span = self.expect(&TokenKind::Continue)?;
                self.expect_terminator()?;
                Ok(self.mk_stmt(StmtKind::Continue, span))
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.expect_terminator()?;
                Ok(stmt)
            }
        }
    }

    pub(super) fn parse_block(&mut self) -> SyntaxResult<Block> {
        let start = self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.cur_is(&TokenKind::RBrace) {
            if self.at_eof() {
                return Err(self.error("expected `}`, found end of input"));
            }
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        let end = self.expect(&TokenKind::RBrace)?;
        Ok(Block {
            stmts,
            span: start.to(&end),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Assignment / Expression
    // ═══════════════════════════════════════════════════════════════════════

    /// Destructuring, assignment, increment or bare expression, without the
    /// trailing terminator. The expression is parsed first; an assignment
    /// operator after it decides the statement kind.
    fn parse_simple_stmt(&mut self) -> SyntaxResult<Stmt> {
        let expr = self.parse_expr()?;

        let op = match self.current().kind {
            TokenKind::Assign => Some(AssignOp::Assign),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            TokenKind::PercentAssign => Some(AssignOp::Mod),
            TokenKind::CaretAssign => Some(AssignOp::Pow),
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let increment = self.cur_is(&TokenKind::PlusPlus);
                if !expr.is_assignable() {
                    return Err(self.error("cannot increment this expression"));
                }
                let span = expr.span.to(&self.current().span);
                self.next_token();
                return Ok(self.mk_stmt(StmtKind::IncDec { target: expr, increment }, span));
            }
            _ => None,
        };

        let op = match op {
            Some(op) => op,
            None => {
                let span = expr.span;
                return Ok(self.mk_stmt(StmtKind::Expr(expr), span));
            }
        };
        let op_span = self.current().span;
        self.next_token();

        if op == AssignOp::Assign {
            if let Some(targets) = destructure_targets(&expr) {
                let value = self.parse_expr()?;
                let span = expr.span.to(&value.span);
                return Ok(self.mk_stmt(StmtKind::Destructure { targets, value }, span));
            }
        }
        if !expr.is_assignable() {
            return Err(self.error_at("cannot assign to this expression", op_span));
        }
        let value = self.parse_expr()?;
        let span = expr.span.to(&value.span);
        Ok(self.mk_stmt(
            StmtKind::Assign {
                target: expr,
                op,
                value,
            },
            span,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Control Flow
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_paren_expr(&mut self) -> SyntaxResult<Expr> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        Ok(expr)
    }

    fn parse_if_stmt(&mut self) -> SyntaxResult<Stmt> {
        let start = self.expect(&TokenKind::If)?;
        let cond = self.parse_paren_expr()?;
        let then_block = self.parse_block()?;
        let mut end = then_block.span;

        let else_branch = if self.eat(&TokenKind::Else) {
            let branch = if self.cur_is(&TokenKind::If) {
                self.parse_if_stmt()?
            } else {
                let block = self.parse_block()?;
                let span = block.span;
                self.mk_stmt(StmtKind::Block(block), span)
            };
            end = branch.span;
            Some(branch)
        } else {
            None
        };

        let if_stmt = IfStmt {
            cond,
            then_block,
            else_branch,
        };
        Ok(self.mk_stmt(StmtKind::If(Box::new(if_stmt)), start.to(&end)))
    }

    fn parse_while_stmt(&mut self) -> SyntaxResult<Stmt> {
        let start = self.expect(&TokenKind::While)?;
        let cond = self.parse_paren_expr()?;
        let body = self.parse_block()?;
        let span = start.to(&body.span);
        Ok(self.mk_stmt(StmtKind::While { cond, body }, span))
    }

    fn parse_for_stmt(&mut self) -> SyntaxResult<Stmt> {
        let start = self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LParen)?;

        let iterates = matches!(self.current().kind, TokenKind::Ident(_))
            && (self.peek_is(&TokenKind::In) || self.peek_is(&TokenKind::Comma));
        if !iterates {
            return self.parse_for_classic(start);
        }

        let value = self.expect_ident()?;
        let key = if self.eat(&TokenKind::Comma) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(&TokenKind::In)?;
        let iter = self.parse_expr()?;

        if self.eat(&TokenKind::DotDot) {
            if let Some(key) = key {
                return Err(self.error_at("a range loop takes a single variable", key.span));
            }
            let to = self.parse_expr()?;
            self.expect(&TokenKind::RParen)?;
            let body = self.parse_block()?;
            let span = start.to(&body.span);
            return Ok(self.mk_stmt(
                StmtKind::ForRange {
                    var: value,
                    from: iter,
                    to,
                    body,
                },
                span,
            ));
        }

        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let span = start.to(&body.span);
        Ok(self.mk_stmt(
            StmtKind::ForIn {
                value,
                key,
                iter,
                body,
            },
            span,
        ))
    }

    fn parse_for_classic(&mut self, start: crate::token::Span) -> SyntaxResult<Stmt> {
        let init = if self.cur_is(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_simple_stmt()?)
        };
        self.expect(&TokenKind::Semi)?;
        let check = if self.cur_is(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semi)?;
        let incr = if self.cur_is(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_simple_stmt()?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let span = start.to(&body.span);
        let classic = ForClassic {
            init,
            check,
            incr,
            body,
        };
        Ok(self.mk_stmt(StmtKind::ForClassic(Box::new(classic)), span))
    }

    fn parse_try_stmt(&mut self) -> SyntaxResult<Stmt> {
        let start = self.expect(&TokenKind::Try)?;
        let body = self.parse_block()?;
        let catch_start = self.expect(&TokenKind::Catch)?;
        let kinds = self.parse_catch_kinds()?;
        let name = if self.eat(&TokenKind::As) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        let handler = self.parse_block()?;
        let span = start.to(&handler.span);
        let catch = CatchClause {
            kinds,
            name,
            span: catch_start.to(&handler.span),
            body: handler,
        };
        Ok(self.mk_stmt(StmtKind::Try(Box::new(TryStmt { body, catch })), span))
    }
}

/// `[a, b, c]` on the left of `=` names variables to unpack into.
fn destructure_targets(expr: &Expr) -> Option<Vec<Ident>> {
    match &expr.kind {
        ExprKind::List(items) if !items.is_empty() => items
            .iter()
            .map(|item| item.as_ident().cloned())
            .collect(),
        _ => None,
    }
}
