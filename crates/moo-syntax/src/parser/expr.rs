//! Expression parsing for Moo.
//!
//! One function per precedence level, lowest first:
//! fork, try, when, `is`, `&&`/`||`, `?:`, `? :`, `in`, equality,
//! relational, additive, multiplicative, `^`, unary, then primaries with
//! their suffix chain.

use moo_common::ErrorKind;

use super::Parser;
use crate::ast::*;
use crate::error::SyntaxResult;
use crate::token::{Span, TokenKind};

impl Parser {
    // ═══════════════════════════════════════════════════════════════════════
    // Expression Entry Point
    // ═══════════════════════════════════════════════════════════════════════

    pub(super) fn parse_expr(&mut self) -> SyntaxResult<Expr> {
        match self.current().kind {
            TokenKind::Fork => self.parse_fork(),
            TokenKind::Try => self.parse_try_expr(),
            TokenKind::When => self.parse_when(),
            _ => self.parse_is(),
        }
    }

    fn parse_fork(&mut self) -> SyntaxResult<Expr> {
        let start = self.expect(&TokenKind::Fork)?;
        self.expect(&TokenKind::LParen)?;
        let delay = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let span = start.to(&body.span);
        let fork = ForkExpr {
            delay,
            body,
            captured: Vec::new(),
        };
        Ok(self.mk_expr(ExprKind::Fork(Box::new(fork)), span))
    }

    fn parse_try_expr(&mut self) -> SyntaxResult<Expr> {
        let start = self.expect(&TokenKind::Try)?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::Catch)?;
        let kinds = self.parse_catch_kinds()?;
        let name = if self.eat(&TokenKind::As) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(&TokenKind::Arrow)?;
        let fallback = self.parse_expr()?;
        let span = start.to(&fallback.span);
        let try_expr = TryExpr {
            expr,
            kinds,
            name,
            fallback,
        };
        Ok(self.mk_expr(ExprKind::TryExpr(Box::new(try_expr)), span))
    }

    /// Optional `(E_X, E_Y)` list after `catch`. Empty means any kind.
    pub(super) fn parse_catch_kinds(&mut self) -> SyntaxResult<Vec<ErrorKind>> {
        let mut kinds = Vec::new();
        if !self.eat(&TokenKind::LParen) {
            return Ok(kinds);
        }
        let mut any = false;
        loop {
            match self.current().kind {
                TokenKind::Error(kind) => {
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                TokenKind::Any => any = true,
                _ => {
                    return Err(self.error(&format!(
                        "expected error kind in catch list, found {}",
                        self.describe_current()
                    )))
                }
            }
            self.next_token();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        if any {
            kinds.clear();
        }
        Ok(kinds)
    }

    fn parse_when(&mut self) -> SyntaxResult<Expr> {
        let start = self.expect(&TokenKind::When)?;
        let subject = if self.eat(&TokenKind::LParen) {
            let subject = self.parse_expr()?;
            self.expect(&TokenKind::RParen)?;
            Some(subject)
        } else {
            None
        };
        self.expect(&TokenKind::LBrace)?;

        let mut arms = Vec::new();
        let mut else_arm = None;
        while !self.cur_is(&TokenKind::RBrace) {
            if self.at_eof() {
                return Err(self.error("unterminated `when` block"));
            }
            if self.eat(&TokenKind::Else) {
                if else_arm.is_some() {
                    return Err(self.error_at("duplicate `else` arm", self.prev_span()));
                }
                self.expect(&TokenKind::Arrow)?;
                else_arm = Some(self.parse_expr()?);
            } else {
                let mut conds = vec![self.parse_expr()?];
                while self.eat(&TokenKind::Comma) {
                    conds.push(self.parse_expr()?);
                }
                self.expect(&TokenKind::Arrow)?;
                let result = self.parse_expr()?;
                arms.push(WhenArm { conds, result });
            }
            if !self.eat(&TokenKind::Comma) && !self.eat(&TokenKind::Semi) {
                break;
            }
        }
        let end = self.expect(&TokenKind::RBrace)?;
        let when = WhenExpr {
            subject,
            arms,
            else_arm,
        };
        Ok(self.mk_expr(ExprKind::When(Box::new(when)), start.to(&end)))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Binary Levels
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_is(&mut self) -> SyntaxResult<Expr> {
        let mut expr = self.parse_logical()?;
        while self.eat(&TokenKind::Is) {
            let type_name = match &self.current().kind {
                TokenKind::Ident(name) => TypeName::from_name(name),
                TokenKind::Null => Some(TypeName::Null),
                TokenKind::Fn => Some(TypeName::Fn),
                _ => None,
            };
            expr = match type_name {
                Some(ty) => {
                    let span = expr.span.to(&self.current().span);
                    self.next_token();
                    self.mk_expr(
                        ExprKind::IsType {
                            expr: Box::new(expr),
                            ty,
                        },
                        span,
                    )
                }
                None => {
                    let trait_expr = self.parse_logical()?;
                    let span = expr.span.to(&trait_expr.span);
                    self.mk_expr(
                        ExprKind::IsTrait {
                            expr: Box::new(expr),
                            trait_expr: Box::new(trait_expr),
                        },
                        span,
                    )
                }
            };
        }
        Ok(expr)
    }

    fn parse_logical(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_elvis()?;
        loop {
            let op = match self.current().kind {
                TokenKind::And => LogicalOp::And,
                TokenKind::Or => LogicalOp::Or,
                _ => break,
            };
            self.next_token();
            let rhs = self.parse_elvis()?;
            let span = lhs.span.to(&rhs.span);
            lhs = self.mk_expr(
                ExprKind::Logical {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_elvis(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_cond()?;
        while self.eat(&TokenKind::Elvis) {
            let rhs = self.parse_cond()?;
            let span = lhs.span.to(&rhs.span);
            lhs = self.mk_expr(
                ExprKind::Elvis {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_cond(&mut self) -> SyntaxResult<Expr> {
        let cond = self.parse_in()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        self.expect(&TokenKind::Colon)?;
        let else_expr = self.parse_cond()?;
        let span = cond.span.to(&else_expr.span);
        Ok(self.mk_expr(
            ExprKind::Cond {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            span,
        ))
    }

    fn parse_in(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::In) {
            let rhs = self.parse_equality()?;
            lhs = self.binary(BinaryOp::In, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.next_token();
            let rhs = self.parse_relational()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.next_token();
            let rhs = self.parse_additive()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.next_token();
            let rhs = self.parse_multiplicative()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.next_token();
            let rhs = self.parse_power()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> SyntaxResult<Expr> {
        let base = self.parse_unary()?;
        if self.eat(&TokenKind::Caret) {
            let exponent = self.parse_power()?;
            return Ok(self.binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> SyntaxResult<Expr> {
        let op = match self.current().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        let start = self.current().span;
        self.next_token();
        let expr = self.parse_unary()?;
        let span = start.to(&expr.span);
        Ok(self.mk_expr(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        ))
    }

    fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let span = lhs.span.to(&rhs.span);
        self.mk_expr(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Suffix Chain
    // ═══════════════════════════════════════════════════════════════════════

    fn parse_postfix(&mut self) -> SyntaxResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            expr = match self.current().kind {
                TokenKind::LBracket => self.parse_index_suffix(expr)?,
                TokenKind::Dot => self.parse_dot_suffix(expr)?,
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    let span = expr.span.to(&self.prev_span());
                    self.mk_expr(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    )
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    fn parse_index_suffix(&mut self, target: Expr) -> SyntaxResult<Expr> {
        self.expect(&TokenKind::LBracket)?;
        let index = self.parse_expr()?;
        if self.eat(&TokenKind::DotDot) {
            let to = self.parse_expr()?;
            let end = self.expect(&TokenKind::RBracket)?;
            let span = target.span.to(&end);
            return Ok(self.mk_expr(
                ExprKind::Slice {
                    target: Box::new(target),
                    from: Box::new(index),
                    to: Box::new(to),
                },
                span,
            ));
        }
        let end = self.expect(&TokenKind::RBracket)?;
        let span = target.span.to(&end);
        Ok(self.mk_expr(
            ExprKind::Index {
                target: Box::new(target),
                index: Box::new(index),
            },
            span,
        ))
    }

    fn parse_dot_suffix(&mut self, target: Expr) -> SyntaxResult<Expr> {
        self.expect(&TokenKind::Dot)?;
        if let TokenKind::TraitName(name) = &self.current().kind {
            let name = Ident::new(name.clone(), self.current().span);
            self.next_token();
            let span = target.span.to(&name.span);
            return Ok(self.mk_expr(
                ExprKind::TraitOf {
                    target: Box::new(target),
                    name,
                },
                span,
            ));
        }
        let name = self.expect_ident()?;
        if self.cur_is(&TokenKind::LParen) {
            let args = self.parse_args()?;
            let span = target.span.to(&self.prev_span());
            return Ok(self.mk_expr(
                ExprKind::VerbCall {
                    target: Box::new(target),
                    name,
                    args,
                },
                span,
            ));
        }
        let span = target.span.to(&name.span);
        Ok(self.mk_expr(
            ExprKind::Prop {
                target: Box::new(target),
                name,
            },
            span,
        ))
    }

    /// `( expr, ... )`
    fn parse_args(&mut self) -> SyntaxResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.cur_is(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Primary Expressions
    // ═══════════════════════════════════════════════════════════════════════

    fn literal(&mut self, lit: Literal) -> Expr {
        let span = self.current().span;
        self.next_token();
        self.mk_expr(ExprKind::Literal(lit), span)
    }

    fn parse_primary(&mut self) -> SyntaxResult<Expr> {
        let span = self.current().span;
        match self.current().kind.clone() {
            TokenKind::Int(n) => Ok(self.literal(Literal::Int(n))),
            TokenKind::Float(f) => Ok(self.literal(Literal::Float(f))),
            TokenKind::Str(s) => Ok(self.literal(Literal::Str(s))),
            TokenKind::Obj(n) => Ok(self.literal(Literal::Obj(n))),
            TokenKind::True => Ok(self.literal(Literal::Bool(true))),
            TokenKind::False => Ok(self.literal(Literal::Bool(false))),
            TokenKind::Null => Ok(self.literal(Literal::Null)),
            TokenKind::Error(kind) => {
                self.next_token();
                if !self.cur_is(&TokenKind::LParen) {
                    return Ok(self.mk_expr(ExprKind::Literal(Literal::Err(kind)), span));
                }
                self.next_token();
                let message = self.parse_expr()?;
                let end = self.expect(&TokenKind::RParen)?;
                Ok(self.mk_expr(
                    ExprKind::ErrorMsg {
                        kind,
                        message: Box::new(message),
                    },
                    span.to(&end),
                ))
            }
            TokenKind::Ident(name) => {
                self.next_token();
                Ok(self.mk_expr(ExprKind::Ident(Ident::new(name, span)), span))
            }
            TokenKind::TraitName(name) => {
                self.next_token();
                Ok(self.mk_expr(ExprKind::TraitRef(Ident::new(name, span)), span))
            }
            TokenKind::LParen => {
                self.next_token();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_collection(),
            TokenKind::InterpStart => self.parse_interpolation(),
            TokenKind::Fn => self.parse_func_lit(),
            TokenKind::Suspend => {
                self.next_token();
                self.expect(&TokenKind::LParen)?;
                let secs = if self.cur_is(&TokenKind::RParen) {
                    None
                } else {
                    Some(Box::new(self.parse_expr()?))
                };
                let end = self.expect(&TokenKind::RParen)?;
                Ok(self.mk_expr(ExprKind::Suspend(secs), span.to(&end)))
            }
            TokenKind::Fork => self.parse_fork(),
            TokenKind::Try => self.parse_try_expr(),
            TokenKind::When => self.parse_when(),
            _ => Err(self.error(&format!("expected expression, found {}", self.describe_current()))),
        }
    }

    /// `[a, b]`, `[k: v, ...]` or `[:]`.
    fn parse_collection(&mut self) -> SyntaxResult<Expr> {
        let start = self.expect(&TokenKind::LBracket)?;
        if self.cur_is(&TokenKind::Colon) && self.peek_is(&TokenKind::RBracket) {
            self.next_token();
            let end = self.expect(&TokenKind::RBracket)?;
            return Ok(self.mk_expr(ExprKind::Map(Vec::new()), start.to(&end)));
        }
        if self.cur_is(&TokenKind::RBracket) {
            let end = self.expect(&TokenKind::RBracket)?;
            return Ok(self.mk_expr(ExprKind::List(Vec::new()), start.to(&end)));
        }

        let first = self.parse_expr()?;
        if self.eat(&TokenKind::Colon) {
            let mut pairs = vec![(first, self.parse_expr()?)];
            while self.eat(&TokenKind::Comma) {
                if self.cur_is(&TokenKind::RBracket) {
                    break;
                }
                let key = self.parse_expr()?;
                self.expect(&TokenKind::Colon)?;
                pairs.push((key, self.parse_expr()?));
            }
            let end = self.expect(&TokenKind::RBracket)?;
            return Ok(self.mk_expr(ExprKind::Map(pairs), start.to(&end)));
        }

        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.cur_is(&TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        let end = self.expect(&TokenKind::RBracket)?;
        Ok(self.mk_expr(ExprKind::List(items), start.to(&end)))
    }

    fn parse_interpolation(&mut self) -> SyntaxResult<Expr> {
        let start = self.expect(&TokenKind::InterpStart)?;
        let mut parts = Vec::new();
        loop {
            match self.current().kind.clone() {
                TokenKind::Str(text) => {
                    self.next_token();
                    parts.push(InterpPart::Text(text));
                }
                TokenKind::InterpOpen => {
                    self.next_token();
                    let expr = self.parse_expr()?;
                    self.expect(&TokenKind::InterpClose)?;
                    parts.push(InterpPart::Expr(expr));
                }
                TokenKind::InterpEnd => break,
                _ => {
                    return Err(self.error(&format!(
                        "unexpected {} in string substitution",
                        self.describe_current()
                    )))
                }
            }
        }
        let end = self.expect(&TokenKind::InterpEnd)?;
        Ok(self.mk_expr(ExprKind::Interp(parts), start.to(&end)))
    }

    fn parse_func_lit(&mut self) -> SyntaxResult<Expr> {
        let start = self.expect(&TokenKind::Fn)?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.cur_is(&TokenKind::RParen) {
            loop {
                let param = self.expect_ident()?;
                if params.iter().any(|p: &Ident| p.name == param.name) {
                    return Err(self.error_at(&format!("duplicate parameter `{}`", param.name), param.span));
                }
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;

        let body = if self.eat(&TokenKind::Arrow) {
            let result = self.parse_expr()?;
            let span = result.span;
            let ret = self.mk_stmt(StmtKind::Return(Some(result)), span);
            Block {
                stmts: vec![ret],
                span,
            }
        } else {
            self.parse_block()?
        };
        let span: Span = start.to(&body.span);
        let func = FuncLit {
            params,
            body,
            captured: Vec::new(),
        };
        Ok(self.mk_expr(ExprKind::Func(Box::new(func)), span))
    }
}
