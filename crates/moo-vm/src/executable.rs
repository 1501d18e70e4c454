//! Compiled code units.

use std::fmt::Write as _;
use std::rc::Rc;

use hashbrown::HashSet;
use indexmap::IndexMap;

use crate::instruction::{VmWord, Word};

/// Dense variable slot index.
pub type VarId = u32;

pub const VAR_THIS: VarId = 0;
pub const VAR_USER: VarId = 1;
pub const VAR_ARGS: VarId = 2;

/// A function literal or fork body coded inline in its parent.
///
/// `start..end` is skipped by an unconditional jump in normal control
/// flow; the body only runs once sliced out by [`Executable::block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub start: usize,
    pub end: usize,
    pub params: Vec<VarId>,
    pub captured: Vec<VarId>,
}

/// Bytecode plus the tables needed to run it.
#[derive(Debug, Clone, Default)]
pub struct Executable {
    pub name: String,
    pub code: Vec<VmWord>,
    pub symbols: IndexMap<String, VarId>,
    pub blocks: Vec<Block>,
    pub source: Option<Rc<str>>,
}

impl Executable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Number of variable slots a frame needs.
    pub fn var_count(&self) -> usize {
        self.symbols.values().map(|id| *id as usize + 1).max().unwrap_or(0).max(3)
    }

    pub fn var_name(&self, id: VarId) -> Option<&str> {
        self.symbols.iter().find(|(_, v)| **v == id).map(|(k, _)| k.as_str())
    }

    /// Index of the block beginning at `start`.
    pub fn block_at(&self, start: usize) -> Option<usize> {
        self.blocks.iter().position(|b| b.start == start)
    }

    /// Slice block `i` into a standalone executable with addresses rebased
    /// to zero. Blocks nested inside it come along, rebased the same way.
    pub fn block(&self, i: usize) -> Option<Executable> {
        let block = self.blocks.get(i)?;
        let (start, end) = (block.start, block.end);
        if start > end || end > self.code.len() {
            return None;
        }

        let code = self.code[start..end]
            .iter()
            .map(|w| match w.word {
                Word::Addr(a) => VmWord::addr(a.saturating_sub(start), w.pos),
                _ => w.clone(),
            })
            .collect();
        let blocks = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(j, b)| *j != i && b.start >= start && b.end <= end)
            .map(|(_, b)| Block {
                start: b.start - start,
                end: b.end - start,
                params: b.params.clone(),
                captured: b.captured.clone(),
            })
            .collect();

        Some(Executable {
            name: format!("{}@{}", self.name, start),
            code,
            symbols: self.symbols.clone(),
            blocks,
            source: self.source.clone(),
        })
    }

    /// Text of 1-indexed source line `n`, when the source is attached.
    pub fn source_line(&self, n: u32) -> Option<&str> {
        let source = self.source.as_deref()?;
        source.lines().nth((n as usize).checked_sub(1)?)
    }

    /// Every address referenced by a jump operand.
    pub fn jump_targets(&self) -> HashSet<usize> {
        self.code.iter().filter_map(VmWord::as_addr).collect()
    }

    /// Check that each opcode has its operands and every address lies in `[0, len]`.
    pub fn verify(&self) -> Result<(), String> {
        let len = self.code.len();
        let mut pc = 0;
        while pc < len {
            let op = self.code[pc]
                .opcode()
                .ok_or_else(|| format!("expected opcode at {}", pc))?;
            let argc = op.arg_count();
            if pc + argc >= len {
                return Err(format!("{} at {} is missing operands", op.name(), pc));
            }
            for arg in &self.code[pc + 1..pc + 1 + argc] {
                if arg.opcode().is_some() {
                    return Err(format!("{} at {} has an opcode as operand", op.name(), pc));
                }
            }
            pc += 1 + argc;
        }
        for (i, w) in self.code.iter().enumerate() {
            if let Word::Addr(a) = w.word {
                if a > len {
                    return Err(format!("address {} at {} is outside [0, {}]", a, i, len));
                }
            }
        }
        for b in &self.blocks {
            if b.start > b.end || b.end > len {
                return Err(format!("block {}..{} is outside [0, {}]", b.start, b.end, len));
            }
        }
        Ok(())
    }

    /// Human-readable listing, one instruction per line.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let targets = self.jump_targets();
        let mut pc = 0;
        while pc < self.code.len() {
            let word = &self.code[pc];
            let marker = if targets.contains(&pc) { ">" } else { " " };
            match word.word {
                Word::Op(op) => {
                    let _ = write!(out, "{}{:5}  {:<10}", marker, pc, op.name());
                    let argc = op.arg_count();
                    for arg in self.code.iter().skip(pc + 1).take(argc) {
                        match &arg.word {
                            Word::Lit(v) => {
                                let _ = write!(out, " {}", v.literal());
                            }
                            Word::Addr(a) => {
                                let _ = write!(out, " @{}", a);
                            }
                            Word::Op(op) => {
                                let _ = write!(out, " ?{}", op.name());
                            }
                        }
                    }
                    if !word.pos.is_none() {
                        let _ = write!(out, "    ; line {}", word.pos.line);
                    }
                    out.push('\n');
                    pc += 1 + argc;
                }
                _ => {
                    let _ = writeln!(out, "{}{:5}  <stray operand>", marker, pc);
                    pc += 1;
                }
            }
        }
        for (i, b) in self.blocks.iter().enumerate() {
            let _ = writeln!(out, "block {}: {}..{} params {:?} captures {:?}", i, b.start, b.end, b.params, b.captured);
        }
        out
    }
}
