//! Expression compilation.
//!
//! Every expression leaves exactly one value on the operand stack.

use moo_common::SourcePos;
use moo_syntax::ast::{
    BinaryOp, Block, Expr, ExprKind, InterpPart, Literal, LogicalOp, Role, UnaryOp, VarId,
};
use moo_vm::instruction::catch_mask;
use moo_vm::ops::{self, BinOp, UnOp};
use moo_vm::{Opcode, Value};

use crate::coder::Coder;
use crate::error::CompileResult;
use crate::stmt::compile_block;

pub fn compile_expr(expr: &Expr, coder: &mut Coder) -> CompileResult<()> {
    let pos = expr.span.pos();

    if matches!(expr.kind, ExprKind::Unary { .. } | ExprKind::Binary { .. }) {
        if let Some(value) = fold(expr) {
            coder.emit_push(value, pos);
            return Ok(());
        }
    }

    match &expr.kind {
        // === Literals and variables ===
        ExprKind::Literal(lit) => coder.emit_push(literal_value(lit), pos),
        ExprKind::Interp(parts) => {
            for part in parts {
                match part {
                    InterpPart::Text(text) => coder.emit_push(Value::str(text), pos),
                    InterpPart::Expr(e) => compile_expr(e, coder)?,
                }
            }
            coder.emit_with(Opcode::Interpolate, parts.len() as i64, pos);
        }
        ExprKind::Ident(ident) => coder.emit_var(Opcode::GetVar, ident)?,
        ExprKind::List(items) => {
            for item in items {
                compile_expr(item, coder)?;
            }
            coder.emit_with(Opcode::MakeList, items.len() as i64, pos);
        }
        ExprKind::Map(entries) => {
            for (k, v) in entries {
                compile_expr(k, coder)?;
                compile_expr(v, coder)?;
            }
            coder.emit_with(Opcode::MakeMap, entries.len() as i64, pos);
        }
        ExprKind::TraitRef(name) => coder.emit_with(Opcode::TraitRef, name.name.as_str(), pos),
        ExprKind::ErrorMsg { kind, message } => {
            coder.emit_push(Value::err(*kind), pos);
            compile_expr(message, coder)?;
            coder.emit(Opcode::ErrMsg, pos);
        }

        // === Operators ===
        ExprKind::Unary { op, expr: operand } => {
            compile_expr(operand, coder)?;
            let opcode = match op {
                UnaryOp::Neg => Opcode::Neg,
                UnaryOp::Not => Opcode::Not,
            };
            coder.emit(opcode, pos);
        }
        ExprKind::Binary { op, lhs, rhs } => {
            compile_expr(lhs, coder)?;
            compile_expr(rhs, coder)?;
            coder.emit(binary_opcode(*op), pos);
        }
        ExprKind::Logical { op, lhs, rhs } => {
            let jump = match op {
                LogicalOp::And => Opcode::AndJump,
                LogicalOp::Or => Opcode::OrJump,
            };
            compile_short_circuit(expr, jump, lhs, rhs, coder)?;
        }
        ExprKind::Elvis { lhs, rhs } => compile_short_circuit(expr, Opcode::NullJump, lhs, rhs, coder)?,
        ExprKind::Cond { cond, then_expr, else_expr } => {
            let else_label = coder.new_label(expr.id);
            let end = coder.new_label(expr.id);
            compile_expr(cond, coder)?;
            coder.emit_jump(Opcode::JumpIfFalse, else_label, pos)?;
            compile_expr(then_expr, coder)?;
            coder.emit_jump(Opcode::Jump, end, pos)?;
            coder.bind(else_label)?;
            compile_expr(else_expr, coder)?;
            coder.bind(end)?;
        }
        ExprKind::IsType { expr: operand, ty } => {
            compile_expr(operand, coder)?;
            coder.emit_with(Opcode::IsType, ty.name(), pos);
        }
        ExprKind::IsTrait { expr: operand, trait_expr } => {
            compile_expr(operand, coder)?;
            compile_expr(trait_expr, coder)?;
            coder.emit(Opcode::IsTrait, pos);
        }

        // === Access ===
        ExprKind::Index { target, index } => {
            compile_expr(target, coder)?;
            compile_expr(index, coder)?;
            coder.emit(Opcode::Index, pos);
        }
        ExprKind::Slice { target, from, to } => {
            compile_expr(target, coder)?;
            compile_expr(from, coder)?;
            compile_expr(to, coder)?;
            coder.emit(Opcode::Slice, pos);
        }
        ExprKind::Prop { target, name } => {
            compile_expr(target, coder)?;
            coder.emit_with(Opcode::GetProp, name.name.as_str(), pos);
        }
        ExprKind::TraitOf { target, name } => {
            compile_expr(target, coder)?;
            coder.emit_with(Opcode::TraitOf, name.name.as_str(), pos);
        }

        // === Calls ===
        ExprKind::VerbCall { target, name, args } => {
            compile_expr(target, coder)?;
            compile_args(args, coder)?;
            coder.emit_with(Opcode::CallVerb, name.name.as_str(), pos);
            coder.emit_lit(Value::Int(args.len() as i64), pos);
        }
        ExprKind::Call { callee, args } => match callee.as_ident() {
            Some(ident) if ident.role == Role::Builtin => {
                compile_args(args, coder)?;
                coder.emit_with(Opcode::CallBuiltin, ident.name.as_str(), pos);
                coder.emit_lit(Value::Int(args.len() as i64), pos);
            }
            _ => {
                compile_expr(callee, coder)?;
                compile_args(args, coder)?;
                coder.emit_with(Opcode::CallValue, args.len() as i64, pos);
            }
        },
        ExprKind::Func(f) => {
            let params = f
                .params
                .iter()
                .map(crate::coder::var_of)
                .collect::<CompileResult<Vec<VarId>>>()?;
            let start = compile_inline_block(expr, &f.body, params, f.captured.clone(), coder)?;
            coder.emit(Opcode::MakeFunction, pos);
            coder.emit_addr(start, pos);
        }
        ExprKind::Fork(f) => {
            compile_expr(&f.delay, coder)?;
            let start = compile_inline_block(expr, &f.body, Vec::new(), f.captured.clone(), coder)?;
            coder.emit(Opcode::Fork, pos);
            coder.emit_addr(start, pos);
        }
        ExprKind::Suspend(secs) => {
            match secs {
                Some(e) => compile_expr(e, coder)?,
                None => coder.emit_push(Value::Null, pos),
            }
            coder.emit(Opcode::Suspend, pos);
        }

        // === Errors and pattern matching ===
        ExprKind::TryExpr(t) => {
            let handler = coder.new_label(expr.id);
            let end = coder.new_label(expr.id);
            coder.emit_with(Opcode::TryPush, catch_mask(&t.kinds), pos);
            coder.emit_label_ref(handler, pos)?;
            compile_expr(&t.expr, coder)?;
            coder.emit(Opcode::TryPop, pos);
            coder.emit_jump(Opcode::Jump, end, pos)?;
            coder.bind(handler)?;
            match &t.name {
                Some(name) => coder.emit_var(Opcode::SetVar, name)?,
                None => coder.emit(Opcode::Pop, pos),
            }
            compile_expr(&t.fallback, coder)?;
            coder.bind(end)?;
        }
        ExprKind::When(w) => {
            let end = coder.new_label(expr.id);
            let arms: Vec<_> = w.arms.iter().map(|_| coder.new_label(expr.id)).collect();

            // Dispatch: jump to the first arm with a matching value or condition.
            if let Some(subject) = &w.subject {
                compile_expr(subject, coder)?;
            }
            for (arm, label) in w.arms.iter().zip(&arms) {
                for cond in &arm.conds {
                    if w.subject.is_some() {
                        coder.emit(Opcode::Dup, cond.span.pos());
                        compile_expr(cond, coder)?;
                        coder.emit(Opcode::Eq, cond.span.pos());
                    } else {
                        compile_expr(cond, coder)?;
                    }
                    coder.emit_jump(Opcode::JumpIfTrue, *label, cond.span.pos())?;
                }
            }
            if w.subject.is_some() {
                coder.emit(Opcode::Pop, pos);
            }
            match &w.else_arm {
                Some(e) => compile_expr(e, coder)?,
                None => coder.emit_push(Value::Null, pos),
            }
            coder.emit_jump(Opcode::Jump, end, pos)?;

            for (arm, label) in w.arms.iter().zip(arms) {
                coder.bind(label)?;
                if w.subject.is_some() {
                    coder.emit(Opcode::Pop, pos);
                }
                compile_expr(&arm.result, coder)?;
                coder.emit_jump(Opcode::Jump, end, pos)?;
            }
            coder.bind(end)?;
        }
    }
    Ok(())
}

fn compile_args(args: &[Expr], coder: &mut Coder) -> CompileResult<()> {
    for arg in args {
        compile_expr(arg, coder)?;
    }
    Ok(())
}

/// `lhs; JUMP? end; rhs; end:` where the jump keeps `lhs` as the result.
fn compile_short_circuit(
    expr: &Expr,
    jump: Opcode,
    lhs: &Expr,
    rhs: &Expr,
    coder: &mut Coder,
) -> CompileResult<()> {
    let end = coder.new_label(expr.id);
    compile_expr(lhs, coder)?;
    coder.emit_jump(jump, end, expr.span.pos())?;
    compile_expr(rhs, coder)?;
    coder.bind(end)
}

/// Code a function or fork body in line, skipped by a jump, and register
/// it as a block. Returns the block's start address.
fn compile_inline_block(
    owner: &Expr,
    body: &Block,
    params: Vec<VarId>,
    captured: Vec<VarId>,
    coder: &mut Coder,
) -> CompileResult<usize> {
    let pos = owner.span.pos();
    let over = coder.new_label(owner.id);
    coder.emit_jump(Opcode::Jump, over, pos)?;

    let saved = coder.enter_function();
    let start = coder.current_pc();
    let coded = compile_block(body, coder);
    coder.emit_push(Value::Null, end_pos(body, pos));
    coder.emit(Opcode::Return, end_pos(body, pos));
    let end = coder.current_pc();
    coder.exit_function(saved);
    coded?;

    coder.bind(over)?;
    coder.add_block(moo_vm::Block {
        start,
        end,
        params,
        captured,
    });
    Ok(start)
}

fn end_pos(body: &Block, fallback: SourcePos) -> SourcePos {
    body.stmts.last().map_or(fallback, |s| s.span.pos())
}

// ═══════════════════════════════════════════════════════════════════════════
// Constant folding
// ═══════════════════════════════════════════════════════════════════════════

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::str(s),
        Literal::Obj(o) => Value::Obj(*o),
        Literal::Err(kind) => Value::err(*kind),
    }
}

/// Evaluate an operator tree over scalar literals. Operations that would
/// raise at runtime are left unfolded.
pub(crate) fn fold(expr: &Expr) -> Option<Value> {
    match &expr.kind {
        ExprKind::Literal(
            lit @ (Literal::Null | Literal::Bool(_) | Literal::Int(_) | Literal::Float(_) | Literal::Str(_)),
        ) => Some(literal_value(lit)),
        ExprKind::Unary { op, expr } => ops::unary(unary_op(*op), &fold(expr)?).ok(),
        ExprKind::Binary { op, lhs, rhs } => ops::binary(binary_op(*op), &fold(lhs)?, &fold(rhs)?).ok(),
        _ => None,
    }
}

fn unary_op(op: UnaryOp) -> UnOp {
    match op {
        UnaryOp::Neg => UnOp::Neg,
        UnaryOp::Not => UnOp::Not,
    }
}

fn binary_op(op: BinaryOp) -> BinOp {
    match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Mod => BinOp::Mod,
        BinaryOp::Pow => BinOp::Pow,
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::NotEq => BinOp::Ne,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::LtEq => BinOp::Le,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::GtEq => BinOp::Ge,
        BinaryOp::In => BinOp::In,
    }
}

pub(crate) fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Pow => Opcode::Pow,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::NotEq => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::LtEq => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::GtEq => Opcode::Ge,
        BinaryOp::In => Opcode::In,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_syntax::ast::StmtKind;
    use moo_syntax::parse;

    fn folded(source: &str) -> Option<Value> {
        let block = parse(source).unwrap();
        match &block.stmts[0].kind {
            StmtKind::Expr(e) => fold(e),
            other => panic!("expected an expression, got {:?}", other),
        }
    }

    #[test]
    fn test_fold_arithmetic() {
        assert_eq!(folded("14 * 10 + 71 / 3 ^ 3;"), Some(Value::Int(142)));
        assert_eq!(folded("-(2 + 3);"), Some(Value::Int(-5)));
        assert_eq!(folded("\"a\" + \"b\";"), Some(Value::str("ab")));
        assert_eq!(folded("!false;"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_fold_skips_runtime_errors() {
        assert_eq!(folded("1 / 0;"), None);
        assert_eq!(folded("1 + \"a\";"), None);
        assert_eq!(folded("\"ab\" * 9223372036854775807;"), None);
    }

    #[test]
    fn test_fold_skips_non_literals() {
        assert_eq!(folded("x + 1;"), None);
        assert_eq!(folded("#1 == #1;"), None);
    }
}
