//! Activation records.

use std::rc::Rc;

use moo_common::{ErrorKind, SourcePos};

use crate::error::{RuntimeError, TraceEntry};
use crate::executable::{Executable, VarId, VAR_ARGS, VAR_THIS, VAR_USER};
use crate::instruction::mask_catches;
use crate::value::{Value, NOTHING};

/// An active `try` region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    /// Error kinds caught, see [`crate::instruction::catch_mask`].
    pub mask: i64,
    /// Address of the catch code.
    pub addr: usize,
    /// Operand stack depth when the region was entered.
    pub depth: usize,
}

/// What a frame should run and with which bindings.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub code: Rc<Executable>,
    pub this: Value,
    pub args: Vec<Value>,
    /// Parameter slots of a function value; `None` for verbs, which only see `args`.
    pub params: Option<Vec<VarId>>,
    pub captured: Vec<(VarId, Value)>,
    /// Shown in stack traces.
    pub name: String,
}

#[derive(Debug)]
pub struct Frame {
    pub exe: Rc<Executable>,
    pub pc: usize,
    /// Address of the opcode being executed.
    pub op_start: usize,
    pub stack: Vec<Value>,
    pub vars: Vec<Option<Value>>,
    pub handlers: Vec<Handler>,
    pub name: String,
    /// The pending call or suspend was a statement; drop its result on resume.
    pub discard_result: bool,
}

impl Frame {
    /// A top-level frame with `this`, `user` and an empty `args` bound.
    pub fn new(exe: Rc<Executable>, this: Value, user: Value) -> Self {
        let name = exe.name.clone();
        let mut frame = Self::bare(exe, name);
        frame.set_var(VAR_THIS, this);
        frame.set_var(VAR_USER, user);
        frame.set_var(VAR_ARGS, Value::list(Vec::new()));
        frame
    }

    fn bare(exe: Rc<Executable>, name: String) -> Self {
        let slots = exe.var_count();
        Self {
            exe,
            pc: 0,
            op_start: 0,
            stack: Vec::new(),
            vars: vec![None; slots],
            handlers: Vec::new(),
            name,
            discard_result: false,
        }
    }

    /// Bind a call's receiver, arguments and captures into a fresh frame.
    pub fn for_call(req: CallRequest, user: Value) -> Result<Self, RuntimeError> {
        if let Some(params) = &req.params {
            if params.len() != req.args.len() {
                return Err(RuntimeError::invalid_arg(format!(
                    "{} expects {} argument{}, got {}",
                    req.name,
                    params.len(),
                    if params.len() == 1 { "" } else { "s" },
                    req.args.len()
                )));
            }
        }

        let mut frame = Self::bare(req.code, req.name);
        frame.set_var(VAR_THIS, req.this);
        frame.set_var(VAR_USER, user);
        frame.set_var(VAR_ARGS, Value::list(req.args.clone()));
        // Captures may rebind `args`; parameters shadow captures.
        for (id, value) in req.captured {
            frame.set_var(id, value);
        }
        if let Some(params) = req.params {
            for (id, value) in params.into_iter().zip(req.args) {
                frame.set_var(id, value);
            }
        }
        Ok(frame)
    }

    pub fn get_var(&self, id: VarId) -> Option<&Value> {
        self.vars.get(id as usize).and_then(Option::as_ref)
    }

    pub fn set_var(&mut self, id: VarId, value: Value) {
        let slot = id as usize;
        if slot >= self.vars.len() {
            self.vars.resize(slot + 1, None);
        }
        self.vars[slot] = Some(value);
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::system("operand stack underflow"))
    }

    /// Pop `n` values, returned in push order.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        if n > self.stack.len() {
            return Err(RuntimeError::system("operand stack underflow"));
        }
        let at = self.stack.len() - n;
        Ok(self.stack.split_off(at))
    }

    pub fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::system("operand stack underflow"))
    }

    pub fn this(&self) -> Value {
        self.get_var(VAR_THIS).cloned().unwrap_or(Value::Obj(NOTHING))
    }

    /// Source position of the current opcode.
    pub fn pos(&self) -> SourcePos {
        self.exe
            .code
            .get(self.op_start)
            .map_or(SourcePos::NONE, |w| w.pos)
    }

    /// Route `err` to the innermost handler that catches its kind.
    ///
    /// Handlers that do not match are discarded. On success the operand
    /// stack is cut back to the handler's depth, the error value is pushed
    /// and execution continues at the catch code.
    pub fn catch(&mut self, err: &RuntimeError) -> bool {
        while let Some(handler) = self.handlers.pop() {
            if mask_catches(handler.mask, err.kind) {
                self.stack.truncate(handler.depth);
                self.stack.push(err.to_value());
                self.pc = handler.addr;
                self.discard_result = false;
                return true;
            }
        }
        false
    }

    pub fn trace_entry(&self) -> TraceEntry {
        let pos = self.pos();
        TraceEntry {
            name: self.name.clone(),
            pos,
            line: if pos.is_none() {
                None
            } else {
                self.exe.source_line(pos.line).map(str::to_string)
            },
        }
    }

    pub fn var_not_found(&self, id: VarId) -> RuntimeError {
        match self.exe.var_name(id) {
            Some(name) => RuntimeError::new(ErrorKind::VarNf, format!("variable `{}` not found", name)),
            None => RuntimeError::bare(ErrorKind::VarNf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::catch_mask;

    fn request(params: Option<Vec<VarId>>, args: Vec<Value>) -> CallRequest {
        CallRequest {
            code: Rc::new(Executable::new("f")),
            this: Value::Obj(4),
            args,
            params,
            captured: vec![(5, Value::Int(9))],
            name: "f".into(),
        }
    }

    #[test]
    fn test_for_call_binds_everything() {
        let frame = Frame::for_call(request(Some(vec![3, 4]), vec![Value::Int(1), Value::Int(2)]), Value::Obj(7)).unwrap();
        assert_eq!(frame.get_var(VAR_THIS), Some(&Value::Obj(4)));
        assert_eq!(frame.get_var(VAR_USER), Some(&Value::Obj(7)));
        assert_eq!(frame.get_var(3), Some(&Value::Int(1)));
        assert_eq!(frame.get_var(4), Some(&Value::Int(2)));
        assert_eq!(frame.get_var(5), Some(&Value::Int(9)));
        assert_eq!(frame.get_var(VAR_ARGS).and_then(Value::length), Some(2));
    }

    #[test]
    fn test_function_arity_is_checked() {
        let err = Frame::for_call(request(Some(vec![3]), vec![]), Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvArg);
        assert!(Frame::for_call(request(None, vec![Value::Int(1)]), Value::Null).is_ok());
    }

    #[test]
    fn test_catch_skips_non_matching_handlers() {
        let mut frame = Frame::new(Rc::new(Executable::new("t")), Value::Null, Value::Null);
        frame.handlers.push(Handler { mask: 0, addr: 10, depth: 0 });
        frame.handlers.push(Handler {
            mask: catch_mask(&[ErrorKind::Range]),
            addr: 20,
            depth: 1,
        });
        frame.stack = vec![Value::Int(1), Value::Int(2), Value::Int(3)];

        assert!(frame.catch(&RuntimeError::bare(ErrorKind::Type)));
        assert_eq!(frame.pc, 10);
        assert_eq!(frame.stack.len(), 1);
        assert!(matches!(frame.stack[0], Value::Err(_)));
        assert!(frame.handlers.is_empty());
        assert!(!frame.catch(&RuntimeError::bare(ErrorKind::Type)));
    }
}
