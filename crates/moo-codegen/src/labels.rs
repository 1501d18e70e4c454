//! Forward-jump resolution.
//!
//! A [`Label`] is a handle into a [`LabelArena`]. Jumps to a label that is
//! not bound yet emit a placeholder address and register a patch; binding
//! the label rewrites every placeholder. Jumps to a bound label emit its
//! address directly.

use moo_syntax::ast::NodeId;
use moo_vm::{VmWord, Word};

use crate::error::CompileError;

/// Address written before a label is bound.
const PLACEHOLDER: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(u32);

#[derive(Debug)]
struct Slot {
    /// Node whose code created the label, for error messages.
    owner: NodeId,
    addr: Option<usize>,
    patches: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct LabelArena {
    slots: Vec<Slot>,
}

impl LabelArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self, owner: NodeId) -> Label {
        self.slots.push(Slot {
            owner,
            addr: None,
            patches: Vec::new(),
        });
        Label(self.slots.len() as u32 - 1)
    }

    fn slot(&mut self, label: Label) -> Result<&mut Slot, CompileError> {
        self.slots
            .get_mut(label.0 as usize)
            .ok_or_else(|| CompileError::Internal(format!("unknown label {}", label.0)))
    }

    pub fn addr(&self, label: Label) -> Option<usize> {
        self.slots.get(label.0 as usize).and_then(|s| s.addr)
    }

    /// The address to write at code index `at` for a jump to `label`.
    pub fn reference(&mut self, label: Label, at: usize) -> Result<usize, CompileError> {
        let slot = self.slot(label)?;
        match slot.addr {
            Some(addr) => Ok(addr),
            None => {
                slot.patches.push(at);
                Ok(PLACEHOLDER)
            }
        }
    }

    /// Fix `label` at `addr` and patch every jump already emitted to it.
    pub fn bind(&mut self, label: Label, addr: usize, code: &mut [VmWord]) -> Result<(), CompileError> {
        let slot = self.slot(label)?;
        if slot.addr.is_some() {
            return Err(CompileError::Internal(format!(
                "label {} of node {} bound twice",
                label.0, slot.owner
            )));
        }
        slot.addr = Some(addr);
        for at in std::mem::take(&mut slot.patches) {
            match code.get_mut(at) {
                Some(w) if matches!(w.word, Word::Addr(PLACEHOLDER)) => w.word = Word::Addr(addr),
                _ => return Err(CompileError::Internal(format!("no jump placeholder at {}", at))),
            }
        }
        Ok(())
    }

    /// Every label that was jumped to must have been bound.
    pub fn check_all_bound(&self) -> Result<(), CompileError> {
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.addr.is_none() && !slot.patches.is_empty() {
                return Err(CompileError::Internal(format!(
                    "label {} of node {} has {} unresolved jumps",
                    i,
                    slot.owner,
                    slot.patches.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_common::SourcePos;
    use moo_vm::Opcode;

    fn jump(code: &mut Vec<VmWord>, labels: &mut LabelArena, label: Label) {
        code.push(VmWord::op(Opcode::Jump, SourcePos::NONE));
        let at = code.len();
        let addr = labels.reference(label, at).unwrap();
        code.push(VmWord::addr(addr, SourcePos::NONE));
    }

    #[test]
    fn test_forward_jumps_are_patched() {
        let mut labels = LabelArena::new();
        let mut code = Vec::new();
        let end = labels.new_label(7);
        jump(&mut code, &mut labels, end);
        jump(&mut code, &mut labels, end);
        assert!(labels.check_all_bound().is_err());

        labels.bind(end, 4, &mut code).unwrap();
        assert_eq!(code[1].as_addr(), Some(4));
        assert_eq!(code[3].as_addr(), Some(4));
        labels.check_all_bound().unwrap();
    }

    #[test]
    fn test_backward_jump_uses_known_address() {
        let mut labels = LabelArena::new();
        let mut code = Vec::new();
        let head = labels.new_label(1);
        labels.bind(head, 0, &mut code).unwrap();
        jump(&mut code, &mut labels, head);
        assert_eq!(code[1].as_addr(), Some(0));
        assert_eq!(labels.addr(head), Some(0));
    }

    #[test]
    fn test_double_bind_is_internal_error() {
        let mut labels = LabelArena::new();
        let l = labels.new_label(3);
        labels.bind(l, 0, &mut []).unwrap();
        assert!(matches!(labels.bind(l, 1, &mut []), Err(CompileError::Internal(_))));
    }

    #[test]
    fn test_unreferenced_label_may_stay_unbound() {
        let mut labels = LabelArena::new();
        labels.new_label(0);
        labels.check_all_bound().unwrap();
    }
}
