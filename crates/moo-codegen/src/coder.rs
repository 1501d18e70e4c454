//! Bytecode emission state.
//!
//! [`Coder`] owns the code vector being built, the label arena for jumps,
//! the blocks registered for function literals and fork bodies, and the
//! loop stack used to resolve `break` and `continue`. Statement and
//! expression lowering live in `stmt` and `expr`.

use indexmap::IndexMap;
use moo_common::SourcePos;
use moo_syntax::ast::{Ident, NodeId, VarId};
use moo_vm::{Block, Executable, Opcode, Value, VmWord};

use crate::error::{CompileError, CompileResult};
use crate::labels::{Label, LabelArena};

/// Jump targets of an enclosing loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopLabels {
    pub brk: Label,
    pub cont: Label,
    /// Open `try` regions when the loop was entered.
    pub try_depth: usize,
}

/// Loop state hidden while coding a function or fork body.
pub(crate) struct SavedScope {
    loops: Vec<LoopLabels>,
    try_depth: usize,
}

#[derive(Debug, Default)]
pub struct Coder {
    code: Vec<VmWord>,
    labels: LabelArena,
    blocks: Vec<Block>,
    loops: Vec<LoopLabels>,
    try_depth: usize,
}

impl Coder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current_pc(&self) -> usize {
        self.code.len()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Emission
    // ═══════════════════════════════════════════════════════════════════════

    pub fn emit(&mut self, op: Opcode, pos: SourcePos) {
        self.code.push(VmWord::op(op, pos));
    }

    pub fn emit_lit(&mut self, value: Value, pos: SourcePos) {
        self.code.push(VmWord::lit(value, pos));
    }

    /// `op` followed by one literal operand.
    pub fn emit_with(&mut self, op: Opcode, operand: impl Into<Value>, pos: SourcePos) {
        self.emit(op, pos);
        self.emit_lit(operand.into(), pos);
    }

    pub fn emit_push(&mut self, value: Value, pos: SourcePos) {
        self.emit_with(Opcode::Push, value, pos);
    }

    /// A variable opcode (`GETVAR`, `SETVAR`, ...) on `ident`'s slot.
    pub fn emit_var(&mut self, op: Opcode, ident: &Ident) -> CompileResult<()> {
        let id = var_of(ident)?;
        self.emit_with(op, Value::Int(id as i64), ident.span.pos());
        Ok(())
    }

    /// An address operand referring to `label`.
    pub fn emit_label_ref(&mut self, label: Label, pos: SourcePos) -> CompileResult<()> {
        let at = self.current_pc();
        let addr = self.labels.reference(label, at)?;
        self.code.push(VmWord::addr(addr, pos));
        Ok(())
    }

    pub fn emit_addr(&mut self, addr: usize, pos: SourcePos) {
        self.code.push(VmWord::addr(addr, pos));
    }

    pub fn emit_jump(&mut self, op: Opcode, label: Label, pos: SourcePos) -> CompileResult<()> {
        self.emit(op, pos);
        self.emit_label_ref(label, pos)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Labels
    // ═══════════════════════════════════════════════════════════════════════

    pub fn new_label(&mut self, owner: NodeId) -> Label {
        self.labels.new_label(owner)
    }

    /// Bind `label` to the current position.
    pub fn bind(&mut self, label: Label) -> CompileResult<()> {
        let pc = self.current_pc();
        self.labels.bind(label, pc, &mut self.code)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Loops, try regions and blocks
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) fn enter_loop(&mut self, brk: Label, cont: Label) {
        self.loops.push(LoopLabels {
            brk,
            cont,
            try_depth: self.try_depth,
        });
    }

    pub(crate) fn exit_loop(&mut self) {
        self.loops.pop();
    }

    pub(crate) fn current_loop(&self) -> Option<LoopLabels> {
        self.loops.last().copied()
    }

    pub(crate) fn try_depth(&self) -> usize {
        self.try_depth
    }

    pub(crate) fn enter_try(&mut self) {
        self.try_depth += 1;
    }

    pub(crate) fn exit_try(&mut self) {
        self.try_depth = self.try_depth.saturating_sub(1);
    }

    /// A function body starts with no enclosing loops or handlers.
    pub(crate) fn enter_function(&mut self) -> SavedScope {
        SavedScope {
            loops: std::mem::take(&mut self.loops),
            try_depth: std::mem::replace(&mut self.try_depth, 0),
        }
    }

    pub(crate) fn exit_function(&mut self, saved: SavedScope) {
        self.loops = saved.loops;
        self.try_depth = saved.try_depth;
    }

    pub(crate) fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Check every jump resolved and wrap the code up as an executable.
    pub fn finish(self, name: &str, symbols: IndexMap<String, VarId>) -> CompileResult<Executable> {
        self.labels.check_all_bound()?;
        let mut exe = Executable::new(name);
        exe.code = self.code;
        exe.symbols = symbols;
        exe.blocks = self.blocks;
        exe.verify().map_err(CompileError::Internal)?;
        Ok(exe)
    }
}

pub(crate) fn var_of(ident: &Ident) -> CompileResult<VarId> {
    ident
        .var_id()
        .ok_or_else(|| CompileError::Internal(format!("`{}` was not bound to a variable", ident.name)))
}
