//! Peephole optimizer.
//!
//! One forward scan over the instruction stream. At each instruction the
//! rules below are tried in order; the first that matches rewrites it
//! together with at most one following instruction:
//!
//! 1. `SETVAR x; GETVAR x` → `TEEVAR x`
//! 2. `PUSH 0; EQ` → `EQZERO` and `PUSH 0; NE` → `NEZERO`
//! 3. `CALLVERB n a; POP` → `CALLVERB_ n a`
//! 4. `BUILTIN n a; POP` → `BUILTIN_ n a`
//! 5. `NOT; IFFALSE L` → `IFTRUE L`
//! 6. `PUSH v; POP` → nothing
//! 7. `JUMP L` where `L` is the next instruction → nothing
//!
//! An instruction that is a jump destination or a block boundary is never
//! folded into the one before it. Jump operands and block bounds are
//! remapped once the scan is done.

use hashbrown::HashSet;
use moo_vm::{Executable, Opcode, Value, VmWord, Word};
use tracing::debug;

enum Rewrite {
    /// Emit `op` with these operand words in place of `width` words.
    Replace {
        op: Opcode,
        operands: Vec<VmWord>,
        width: usize,
    },
    /// Drop `width` words.
    Remove { width: usize },
}

/// Optimize `exe` in place. Returns the number of rewrites applied.
pub fn optimize(exe: &mut Executable) -> usize {
    if let Err(err) = exe.verify() {
        debug!(error = %err, "not optimizing malformed code");
        return 0;
    }

    let mut protected = exe.jump_targets();
    for block in &exe.blocks {
        protected.insert(block.start);
        protected.insert(block.end);
    }
    let code = std::mem::take(&mut exe.code);
    let len = code.len();

    let mut out: Vec<VmWord> = Vec::with_capacity(len);
    // Old address → new address; removed words map to the next survivor.
    let mut map = vec![0usize; len + 1];
    let mut rewrites = 0;
    let mut pc = 0;
    while pc < len {
        let Some(op) = code[pc].opcode() else {
            // verify() rules this out.
            break;
        };
        let width = 1 + op.arg_count();
        match rewrite(&code, pc, op, width, &protected) {
            Some(Rewrite::Replace { op: new_op, operands, width: consumed }) => {
                map[pc..pc + consumed].fill(out.len());
                out.push(VmWord::op(new_op, code[pc].pos));
                out.extend(operands);
                rewrites += 1;
                pc += consumed;
            }
            Some(Rewrite::Remove { width: consumed }) => {
                map[pc..pc + consumed].fill(out.len());
                rewrites += 1;
                pc += consumed;
            }
            None => {
                for word in &code[pc..pc + width] {
                    map[pc] = out.len();
                    out.push(word.clone());
                    pc += 1;
                }
            }
        }
    }
    map[len] = out.len();

    for word in &mut out {
        if let Word::Addr(a) = word.word {
            word.word = Word::Addr(map[a.min(len)]);
        }
    }
    for block in &mut exe.blocks {
        block.start = map[block.start];
        block.end = map[block.end];
    }
    debug!(name = %exe.name, before = len, after = out.len(), rewrites, "peephole pass");
    exe.code = out;
    rewrites
}

fn rewrite(code: &[VmWord], pc: usize, op: Opcode, width: usize, protected: &HashSet<usize>) -> Option<Rewrite> {
    let next = pc + width;

    // Rule 7 needs no second instruction.
    if op == Opcode::Jump && code[pc + 1].as_addr() == Some(next) {
        return Some(Rewrite::Remove { width });
    }

    if next >= code.len() || protected.contains(&next) {
        return None;
    }
    let next_op = code[next].opcode()?;
    let next_width = 1 + next_op.arg_count();
    let total = width + next_width;
    let operands = |from: usize, n: usize| code[from..from + n].to_vec();

    match (op, next_op) {
        (Opcode::SetVar, Opcode::GetVar) if same_lit(&code[pc + 1], &code[next + 1]) => Some(Rewrite::Replace {
            op: Opcode::TeeVar,
            operands: operands(pc + 1, 1),
            width: total,
        }),
        (Opcode::Push, Opcode::Eq | Opcode::Ne) if is_int_zero(&code[pc + 1]) => Some(Rewrite::Replace {
            op: if next_op == Opcode::Eq { Opcode::EqZero } else { Opcode::NeZero },
            operands: Vec::new(),
            width: total,
        }),
        (Opcode::CallVerb, Opcode::Pop) => Some(Rewrite::Replace {
            op: Opcode::CallVerbDiscard,
            operands: operands(pc + 1, 2),
            width: total,
        }),
        (Opcode::CallBuiltin, Opcode::Pop) => Some(Rewrite::Replace {
            op: Opcode::CallBuiltinDiscard,
            operands: operands(pc + 1, 2),
            width: total,
        }),
        (Opcode::Not, Opcode::JumpIfFalse) => Some(Rewrite::Replace {
            op: Opcode::JumpIfTrue,
            operands: operands(next + 1, 1),
            width: total,
        }),
        (Opcode::Push, Opcode::Pop) => Some(Rewrite::Remove { width: total }),
        _ => None,
    }
}

fn same_lit(a: &VmWord, b: &VmWord) -> bool {
    match (a.as_lit(), b.as_lit()) {
        (Some(x), Some(y)) => x.as_int().is_some() && x.as_int() == y.as_int(),
        _ => false,
    }
}

fn is_int_zero(w: &VmWord) -> bool {
    matches!(w.as_lit(), Some(Value::Int(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_common::SourcePos;
    use moo_vm::Block;

    fn op(o: Opcode) -> VmWord {
        VmWord::op(o, SourcePos::NONE)
    }

    fn lit(v: i64) -> VmWord {
        VmWord::lit(Value::Int(v), SourcePos::NONE)
    }

    fn addr(a: usize) -> VmWord {
        VmWord::addr(a, SourcePos::NONE)
    }

    fn exe(code: Vec<VmWord>) -> Executable {
        let mut exe = Executable::new("test");
        exe.code = code;
        exe
    }

    fn opcodes(exe: &Executable) -> Vec<Opcode> {
        exe.code.iter().filter_map(VmWord::opcode).collect()
    }

    #[test]
    fn test_set_get_becomes_tee() {
        let mut e = exe(vec![op(Opcode::Push), lit(5), op(Opcode::SetVar), lit(3), op(Opcode::GetVar), lit(3)]);
        assert_eq!(optimize(&mut e), 1);
        assert_eq!(opcodes(&e), vec![Opcode::Push, Opcode::TeeVar]);
        assert_eq!(e.code[3].as_lit(), Some(&Value::Int(3)));
    }

    #[test]
    fn test_different_variables_are_not_fused() {
        let mut e = exe(vec![op(Opcode::SetVar), lit(3), op(Opcode::GetVar), lit(4)]);
        assert_eq!(optimize(&mut e), 0);
    }

    #[test]
    fn test_compare_with_zero() {
        let mut e = exe(vec![
            op(Opcode::GetVar),
            lit(3),
            op(Opcode::Push),
            lit(0),
            op(Opcode::Ne),
        ]);
        optimize(&mut e);
        assert_eq!(opcodes(&e), vec![Opcode::GetVar, Opcode::NeZero]);
    }

    #[test]
    fn test_not_iffalse_becomes_iftrue_and_jumps_are_remapped() {
        // 0: GETVAR 3; 2: NOT; 3: IFFALSE @7; 5: PUSH 1; 7: PUSH 2
        let mut e = exe(vec![
            op(Opcode::GetVar),
            lit(3),
            op(Opcode::Not),
            op(Opcode::JumpIfFalse),
            addr(7),
            op(Opcode::Push),
            lit(1),
            op(Opcode::Push),
            lit(2),
        ]);
        optimize(&mut e);
        assert_eq!(
            opcodes(&e),
            vec![Opcode::GetVar, Opcode::JumpIfTrue, Opcode::Push, Opcode::Push]
        );
        assert_eq!(e.code[3].as_addr(), Some(6));
        e.verify().unwrap();
    }

    #[test]
    fn test_jump_target_is_never_consumed() {
        // 0: JUMP @4; 2: PUSH 1; 4: POP. The POP is a jump target.
        let mut e = exe(vec![op(Opcode::Jump), addr(4), op(Opcode::Push), lit(1), op(Opcode::Pop)]);
        assert_eq!(optimize(&mut e), 0);
        assert_eq!(e.len(), 5);
    }

    #[test]
    fn test_jump_to_next_is_removed() {
        // 0: JUMP @2; 2: PUSH 1; 4: JUMP @0
        let mut e = exe(vec![op(Opcode::Jump), addr(2), op(Opcode::Push), lit(1), op(Opcode::Jump), addr(0)]);
        optimize(&mut e);
        assert_eq!(opcodes(&e), vec![Opcode::Push, Opcode::Jump]);
        // The removed jump was the loop head; it now lands on the PUSH.
        assert_eq!(e.code[3].as_addr(), Some(0));
    }

    #[test]
    fn test_block_boundaries_are_respected_and_remapped() {
        // 0: PUSH 7; 2: POP; 3: JUMP @8; block 5..8 { 5: PUSH 1; 7: RETURN }; 8: POP
        let mut e = exe(vec![
            op(Opcode::Push),
            lit(7),
            op(Opcode::Pop),
            op(Opcode::Jump),
            addr(8),
            op(Opcode::Push),
            lit(1),
            op(Opcode::Return),
            op(Opcode::Pop),
        ]);
        e.blocks.push(Block {
            start: 5,
            end: 8,
            params: vec![],
            captured: vec![],
        });
        optimize(&mut e);
        // PUSH 7; POP goes away, RETURN; POP straddles the block end and stays.
        assert_eq!(opcodes(&e), vec![Opcode::Jump, Opcode::Push, Opcode::Return, Opcode::Pop]);
        assert_eq!(e.blocks[0].start, 2);
        assert_eq!(e.blocks[0].end, 5);
        assert_eq!(e.code[1].as_addr(), Some(5));
        e.verify().unwrap();
    }
}
