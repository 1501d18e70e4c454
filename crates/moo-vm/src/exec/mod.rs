//! Opcode helpers too large to live inline in the dispatch loop.

pub mod builtins;
pub mod collection;
pub mod verbs;

use crate::frame::CallRequest;
use crate::value::Value;
use crate::vm::Wait;

/// Result of a call the interpreter can complete without a new frame,
/// or the instruction to make one.
#[derive(Debug)]
pub enum Flow {
    Value(Value),
    Call(CallRequest),
    Suspend(Wait),
}
