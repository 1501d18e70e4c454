//! Statement compilation.

use moo_syntax::ast::{BinaryOp, Block, Expr, ExprKind, Stmt, StmtKind};
use moo_vm::instruction::catch_mask;
use moo_vm::{Opcode, Value};

use crate::coder::{var_of, Coder};
use crate::error::{CompileError, CompileResult};
use crate::expr::{binary_opcode, compile_expr};

pub fn compile_block(block: &Block, coder: &mut Coder) -> CompileResult<()> {
    for stmt in &block.stmts {
        compile_stmt(stmt, coder)?;
    }
    Ok(())
}

/// Compile a statement. Statements leave the operand stack as they found it.
pub fn compile_stmt(stmt: &Stmt, coder: &mut Coder) -> CompileResult<()> {
    let pos = stmt.span.pos();
    match &stmt.kind {
        StmtKind::Block(block) => compile_block(block, coder)?,

        // === Conditionals and loops ===
        StmtKind::If(s) => {
            compile_expr(&s.cond, coder)?;
            let else_label = coder.new_label(stmt.id);
            coder.emit_jump(Opcode::JumpIfFalse, else_label, pos)?;
            compile_block(&s.then_block, coder)?;
            match &s.else_branch {
                Some(other) => {
                    let end = coder.new_label(stmt.id);
                    coder.emit_jump(Opcode::Jump, end, pos)?;
                    coder.bind(else_label)?;
                    compile_stmt(other, coder)?;
                    coder.bind(end)?;
                }
                None => coder.bind(else_label)?,
            }
        }
        StmtKind::While { cond, body } => {
            let head = coder.new_label(stmt.id);
            let end = coder.new_label(stmt.id);
            coder.bind(head)?;
            compile_expr(cond, coder)?;
            coder.emit_jump(Opcode::JumpIfFalse, end, pos)?;
            coder.enter_loop(end, head);
            compile_block(body, coder)?;
            coder.exit_loop();
            coder.emit_jump(Opcode::Jump, head, pos)?;
            coder.bind(end)?;
        }
        StmtKind::ForIn { value, key, iter, body } => {
            // Stack while looping: [collection, next index].
            compile_expr(iter, coder)?;
            coder.emit_push(Value::Int(0), pos);
            let head = coder.new_label(stmt.id);
            let done = coder.new_label(stmt.id);
            coder.bind(head)?;
            coder.emit(Opcode::IterNext, pos);
            coder.emit_lit(Value::Int(var_of(value)? as i64), pos);
            let key_id = match key {
                Some(key) => var_of(key)? as i64,
                None => -1,
            };
            coder.emit_lit(Value::Int(key_id), pos);
            coder.emit_label_ref(done, pos)?;
            coder.enter_loop(done, head);
            compile_block(body, coder)?;
            coder.exit_loop();
            coder.emit_jump(Opcode::Jump, head, pos)?;
            coder.bind(done)?;
            coder.emit(Opcode::Pop, pos);
            coder.emit(Opcode::Pop, pos);
        }
        StmtKind::ForRange { var, from, to, body } => {
            // Stack while looping: [next value, last value].
            compile_expr(from, coder)?;
            compile_expr(to, coder)?;
            let head = coder.new_label(stmt.id);
            let done = coder.new_label(stmt.id);
            coder.bind(head)?;
            coder.emit(Opcode::RangeNext, pos);
            coder.emit_lit(Value::Int(var_of(var)? as i64), pos);
            coder.emit_label_ref(done, pos)?;
            coder.enter_loop(done, head);
            compile_block(body, coder)?;
            coder.exit_loop();
            coder.emit_jump(Opcode::Jump, head, pos)?;
            coder.bind(done)?;
            coder.emit(Opcode::Pop, pos);
            coder.emit(Opcode::Pop, pos);
        }
        StmtKind::ForClassic(f) => {
            if let Some(init) = &f.init {
                compile_stmt(init, coder)?;
            }
            let head = coder.new_label(stmt.id);
            let cont = coder.new_label(stmt.id);
            let end = coder.new_label(stmt.id);
            coder.bind(head)?;
            if let Some(check) = &f.check {
                compile_expr(check, coder)?;
                coder.emit_jump(Opcode::JumpIfFalse, end, pos)?;
            }
            coder.enter_loop(end, cont);
            compile_block(&f.body, coder)?;
            coder.exit_loop();
            coder.bind(cont)?;
            if let Some(incr) = &f.incr {
                compile_stmt(incr, coder)?;
            }
            coder.emit_jump(Opcode::Jump, head, pos)?;
            coder.bind(end)?;
        }

        // === Errors ===
        StmtKind::Try(t) => {
            let handler = coder.new_label(stmt.id);
            let end = coder.new_label(stmt.id);
            coder.emit_with(Opcode::TryPush, catch_mask(&t.catch.kinds), pos);
            coder.emit_label_ref(handler, pos)?;
            coder.enter_try();
            compile_block(&t.body, coder)?;
            coder.exit_try();
            coder.emit(Opcode::TryPop, pos);
            coder.emit_jump(Opcode::Jump, end, pos)?;

            // The handler runs with the error value pushed.
            coder.bind(handler)?;
            let catch_pos = t.catch.span.pos();
            match &t.catch.name {
                Some(name) => coder.emit_var(Opcode::SetVar, name)?,
                None => coder.emit(Opcode::Pop, catch_pos),
            }
            compile_block(&t.catch.body, coder)?;
            coder.bind(end)?;
        }
        StmtKind::Throw(e) => {
            compile_expr(e, coder)?;
            coder.emit(Opcode::Throw, pos);
        }

        // === Jumps ===
        StmtKind::Return(value) => {
            match value {
                Some(e) => compile_expr(e, coder)?,
                None => coder.emit_push(Value::Null, pos),
            }
            coder.emit(Opcode::Return, pos);
        }
        StmtKind::Break | StmtKind::Continue => {
            let is_break = matches!(stmt.kind, StmtKind::Break);
            let Some(labels) = coder.current_loop() else {
                let word = if is_break { "break" } else { "continue" };
                return Err(CompileError::semantic(format!("`{}` outside a loop", word), stmt.span));
            };
            for _ in labels.try_depth..coder.try_depth() {
                coder.emit(Opcode::TryPop, pos);
            }
            let target = if is_break { labels.brk } else { labels.cont };
            coder.emit_jump(Opcode::Jump, target, pos)?;
        }

        // === Assignment ===
        StmtKind::Destructure { targets, value } => {
            compile_expr(value, coder)?;
            for (i, target) in targets.iter().enumerate() {
                coder.emit(Opcode::Dup, pos);
                coder.emit_push(Value::Int(i as i64), pos);
                coder.emit(Opcode::Index, pos);
                coder.emit_var(Opcode::SetVar, target)?;
            }
            coder.emit(Opcode::Pop, pos);
        }
        StmtKind::Assign { target, op, value } => {
            compile_update(target, op.binary_op(), Rhs::Expr(value), coder)?;
        }
        StmtKind::IncDec { target, increment } => {
            let op = if *increment { BinaryOp::Add } else { BinaryOp::Sub };
            compile_update(target, Some(op), Rhs::One, coder)?;
        }
        StmtKind::Expr(e) => {
            compile_expr(e, coder)?;
            coder.emit(Opcode::Pop, pos);
        }
    }
    Ok(())
}

/// Right-hand side of an assignment.
enum Rhs<'a> {
    Expr(&'a Expr),
    /// The implicit operand of `++` and `--`.
    One,
}

fn compile_rhs(rhs: &Rhs<'_>, coder: &mut Coder, target: &Expr) -> CompileResult<()> {
    match rhs {
        Rhs::Expr(e) => compile_expr(e, coder),
        Rhs::One => {
            coder.emit_push(Value::Int(1), target.span.pos());
            Ok(())
        }
    }
}

/// Store into a variable, element or property, applying `op` to the old
/// value first when it is a compound assignment.
fn compile_update(target: &Expr, op: Option<BinaryOp>, rhs: Rhs<'_>, coder: &mut Coder) -> CompileResult<()> {
    let pos = target.span.pos();
    match &target.kind {
        ExprKind::Ident(ident) => {
            if let Some(op) = op {
                coder.emit_var(Opcode::GetVar, ident)?;
                compile_rhs(&rhs, coder, target)?;
                coder.emit(binary_opcode(op), pos);
            } else {
                compile_rhs(&rhs, coder, target)?;
            }
            coder.emit_var(Opcode::SetVar, ident)?;
        }
        ExprKind::Index { target: coll, index } => {
            compile_expr(coll, coder)?;
            compile_expr(index, coder)?;
            if let Some(op) = op {
                coder.emit(Opcode::Dup2, pos);
                coder.emit(Opcode::Index, pos);
                compile_rhs(&rhs, coder, target)?;
                coder.emit(binary_opcode(op), pos);
            } else {
                compile_rhs(&rhs, coder, target)?;
            }
            coder.emit(Opcode::IndexSet, pos);
        }
        ExprKind::Prop { target: obj, name } => {
            compile_expr(obj, coder)?;
            if let Some(op) = op {
                coder.emit(Opcode::Dup, pos);
                coder.emit_with(Opcode::GetProp, name.name.as_str(), pos);
                compile_rhs(&rhs, coder, target)?;
                coder.emit(binary_opcode(op), pos);
            } else {
                compile_rhs(&rhs, coder, target)?;
            }
            coder.emit_with(Opcode::SetProp, name.name.as_str(), pos);
        }
        _ => return Err(CompileError::semantic("cannot assign to this expression", target.span)),
    }
    Ok(())
}
