//! Bytecode words and opcodes.
//!
//! A program is a flat vector of [`VmWord`]s. Each opcode word is followed
//! by exactly [`Opcode::arg_count`] operand words, which are either literal
//! values or jump addresses.

use moo_common::{ErrorKind, SourcePos};
use num_enum::TryFromPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::Value;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    // === STACK ===
    /// `lit` → push it.
    Push = 0,
    Pop,
    Dup,
    /// Duplicate the top two entries.
    Dup2,

    // === VARIABLES ===
    GetVar,
    /// Pop and store.
    SetVar,
    /// Store without popping.
    TeeVar,

    // === CONSTRUCTION ===
    /// `n`: pop n values into a list.
    MakeList,
    /// `n`: pop n key/value pairs into a map.
    MakeMap,
    /// `n`: pop n values and concatenate their string forms.
    Interpolate,
    /// `addr`: capture the block starting at addr as a function value.
    MakeFunction,
    /// `[err, msg]` → error value carrying msg.
    ErrMsg,

    // === ACCESS ===
    /// `[coll, idx]` → element
    Index,
    /// `[coll, idx, val]` → (nothing)
    IndexSet,
    /// `[coll, from, to]` → sub-range, inclusive
    Slice,
    /// `name`: `[obj]` → property
    GetProp,
    /// `name`: `[obj, val]` → (nothing)
    SetProp,
    /// `name` → the trait value
    TraitRef,
    /// `name`: `[obj]` → the trait if obj carries it
    TraitOf,

    // === ARITHMETIC / LOGIC ===
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Neg,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    EqZero,
    NeZero,
    /// `type name`: `[v]` → bool
    IsType,
    /// `[v, trait]` → bool
    IsTrait,

    // === CONTROL FLOW ===
    Jump,
    /// Pop; jump when false.
    JumpIfFalse,
    /// Pop; jump when true.
    JumpIfTrue,
    /// Jump keeping the top when false, else pop it.
    AndJump,
    /// Jump keeping the top when true, else pop it.
    OrJump,
    /// Jump keeping the top when not null, else pop it.
    NullJump,
    /// `value var, key var, done`: `[coll, idx]` advance or jump to done.
    IterNext,
    /// `var, done`: `[cur, end]` advance or jump to done.
    RangeNext,

    // === ERRORS ===
    /// `kinds mask, handler`
    TryPush,
    TryPop,
    Throw,

    // === CALLS ===
    /// `name, argc`: `[target, args...]` → result
    CallVerb,
    CallVerbDiscard,
    /// `argc`: `[fn, args...]` → result
    CallValue,
    /// `name, argc`: `[args...]` → result
    CallBuiltin,
    CallBuiltinDiscard,
    /// `addr`: `[delay]` → task id, schedules the block as a new task
    Fork,
    /// `[secs | null]` → resume value
    Suspend,
    Return,
}

impl Opcode {
    /// Number of operand words that follow this opcode.
    pub fn arg_count(self) -> usize {
        match self {
            Opcode::Push
            | Opcode::GetVar
            | Opcode::SetVar
            | Opcode::TeeVar
            | Opcode::MakeList
            | Opcode::MakeMap
            | Opcode::Interpolate
            | Opcode::MakeFunction
            | Opcode::GetProp
            | Opcode::SetProp
            | Opcode::TraitRef
            | Opcode::TraitOf
            | Opcode::IsType
            | Opcode::Jump
            | Opcode::JumpIfFalse
            | Opcode::JumpIfTrue
            | Opcode::AndJump
            | Opcode::OrJump
            | Opcode::NullJump
            | Opcode::CallValue
            | Opcode::Fork => 1,
            Opcode::RangeNext
            | Opcode::TryPush
            | Opcode::CallVerb
            | Opcode::CallVerbDiscard
            | Opcode::CallBuiltin
            | Opcode::CallBuiltinDiscard => 2,
            Opcode::IterNext => 3,
            _ => 0,
        }
    }

    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        Self::try_from(v).ok()
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Dup => "DUP",
            Opcode::Dup2 => "DUP2",
            Opcode::GetVar => "GETVAR",
            Opcode::SetVar => "SETVAR",
            Opcode::TeeVar => "TEEVAR",
            Opcode::MakeList => "MAKELIST",
            Opcode::MakeMap => "MAKEMAP",
            Opcode::Interpolate => "INTERP",
            Opcode::MakeFunction => "MAKEFN",
            Opcode::ErrMsg => "ERRMSG",
            Opcode::Index => "INDEX",
            Opcode::IndexSet => "INDEXSET",
            Opcode::Slice => "SLICE",
            Opcode::GetProp => "GETPROP",
            Opcode::SetProp => "SETPROP",
            Opcode::TraitRef => "TRAIT",
            Opcode::TraitOf => "TRAITOF",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Pow => "POW",
            Opcode::Neg => "NEG",
            Opcode::Not => "NOT",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Lt => "LT",
            Opcode::Le => "LE",
            Opcode::Gt => "GT",
            Opcode::Ge => "GE",
            Opcode::In => "IN",
            Opcode::EqZero => "EQZERO",
            Opcode::NeZero => "NEZERO",
            Opcode::IsType => "ISTYPE",
            Opcode::IsTrait => "ISTRAIT",
            Opcode::Jump => "JUMP",
            Opcode::JumpIfFalse => "IFFALSE",
            Opcode::JumpIfTrue => "IFTRUE",
            Opcode::AndJump => "AND",
            Opcode::OrJump => "OR",
            Opcode::NullJump => "IFNULL",
            Opcode::IterNext => "ITERNEXT",
            Opcode::RangeNext => "RANGENEXT",
            Opcode::TryPush => "TRY",
            Opcode::TryPop => "ENDTRY",
            Opcode::Throw => "THROW",
            Opcode::CallVerb => "CALLVERB",
            Opcode::CallVerbDiscard => "CALLVERB_",
            Opcode::CallValue => "CALLFN",
            Opcode::CallBuiltin => "BUILTIN",
            Opcode::CallBuiltinDiscard => "BUILTIN_",
            Opcode::Fork => "FORK",
            Opcode::Suspend => "SUSPEND",
            Opcode::Return => "RETURN",
        }
    }
}

/// The payload of one bytecode cell.
#[derive(Debug, Clone)]
pub enum Word {
    Op(Opcode),
    Lit(Value),
    Addr(usize),
}

/// One bytecode cell tagged with the source position that produced it.
#[derive(Debug, Clone)]
pub struct VmWord {
    pub word: Word,
    pub pos: SourcePos,
}

impl VmWord {
    pub fn op(op: Opcode, pos: SourcePos) -> Self {
        Self {
            word: Word::Op(op),
            pos,
        }
    }

    pub fn lit(value: Value, pos: SourcePos) -> Self {
        Self {
            word: Word::Lit(value),
            pos,
        }
    }

    pub fn addr(addr: usize, pos: SourcePos) -> Self {
        Self {
            word: Word::Addr(addr),
            pos,
        }
    }

    pub fn opcode(&self) -> Option<Opcode> {
        match self.word {
            Word::Op(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_addr(&self) -> Option<usize> {
        match self.word {
            Word::Addr(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_lit(&self) -> Option<&Value> {
        match &self.word {
            Word::Lit(v) => Some(v),
            _ => None,
        }
    }
}

/// Bit set of error kinds a `try` region handles. Zero means every kind.
pub fn catch_mask(kinds: &[ErrorKind]) -> i64 {
    kinds.iter().fold(0i64, |mask, kind| mask | (1i64 << (*kind as u8)))
}

pub fn mask_catches(mask: i64, kind: ErrorKind) -> bool {
    mask == 0 || mask & (1i64 << (kind as u8)) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for i in 0..=u8::MAX {
            if let Some(op) = Opcode::from_u8(i) {
                assert_eq!(op as u8, i);
            }
        }
        assert_eq!(Opcode::from_u8(Opcode::Return as u8), Some(Opcode::Return));
        assert_eq!(Opcode::from_u8(250), None);
    }

    #[test]
    fn test_arg_counts() {
        assert_eq!(Opcode::Pop.arg_count(), 0);
        assert_eq!(Opcode::Jump.arg_count(), 1);
        assert_eq!(Opcode::CallVerb.arg_count(), 2);
        assert_eq!(Opcode::IterNext.arg_count(), 3);
    }

    #[test]
    fn test_catch_mask() {
        let mask = catch_mask(&[ErrorKind::Range, ErrorKind::InvArg]);
        assert!(mask_catches(mask, ErrorKind::Range));
        assert!(mask_catches(mask, ErrorKind::InvArg));
        assert!(!mask_catches(mask, ErrorKind::Type));
        assert!(mask_catches(catch_mask(&[]), ErrorKind::User9));
    }
}
