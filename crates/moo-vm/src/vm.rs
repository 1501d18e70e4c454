//! The interpreter loop.

use std::rc::Rc;

use moo_common::ErrorKind;

use crate::connection::InputMode;
use crate::context::Context;
use crate::error::RuntimeError;
use crate::exec::{builtins, collection, verbs, Flow};
use crate::executable::VarId;
use crate::frame::{CallRequest, Frame, Handler};
use crate::instruction::{Opcode, VmWord, Word};
use crate::ops::{self, BinOp, UnOp};
use crate::value::{Function, MapKey, Value};
use crate::world::World;

/// Why [`execute`] handed control back.
#[derive(Debug)]
pub enum Signal {
    /// The frame finished with this value.
    Return(Value),
    /// Push a frame for this call, then resume the current one with its result.
    Call(CallRequest),
    /// Park the whole task.
    Suspend(Wait),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wait {
    Seconds(f64),
    /// Until explicitly resumed.
    Forever,
    Input(InputMode),
}

impl Wait {
    /// `suspend(x)`: null waits forever, a number waits that many seconds.
    pub fn from_value(value: &Value) -> Result<Wait, RuntimeError> {
        match value {
            Value::Null | Value::Void => Ok(Wait::Forever),
            Value::Int(_) | Value::Float(_) => {
                let secs = value.as_number().unwrap_or(0.0);
                if secs < 0.0 || secs.is_nan() {
                    Err(RuntimeError::invalid_arg(format!("cannot suspend for {} seconds", value)))
                } else {
                    Ok(Wait::Seconds(secs))
                }
            }
            other => Err(RuntimeError::type_mismatch(format!(
                "suspend expects a number of seconds, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Run `frame` until it returns, calls out or suspends.
///
/// `resume` is the result of the call or suspension the frame was parked
/// on. It is pushed unless that call was a statement.
pub fn execute(
    frame: &mut Frame,
    ctx: &mut Context,
    world: &mut dyn World,
    resume: Option<Value>,
) -> Result<Signal, RuntimeError> {
    if let Some(value) = resume {
        if !frame.discard_result {
            frame.push(value);
        }
    }
    frame.discard_result = false;

    let exe = Rc::clone(&frame.exe);
    let code = exe.code.as_slice();
    loop {
        if frame.pc >= code.len() {
            return Ok(Signal::Return(Value::Null));
        }
        frame.op_start = frame.pc;
        match step(code, frame, ctx, world) {
            Ok(None) => {}
            Ok(Some(signal)) => return Ok(signal),
            Err(err) => return Err(err.located(frame.pos())),
        }
        if frame.stack.len() > ctx.config.max_stack {
            return Err(RuntimeError::new(ErrorKind::Resource, "operand stack overflow").located(frame.pos()));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Operand decoding
// ═══════════════════════════════════════════════════════════════════════════

fn malformed(at: usize) -> RuntimeError {
    RuntimeError::system(format!("malformed bytecode at {}", at))
}

fn word(code: &[VmWord], at: usize) -> Result<&Word, RuntimeError> {
    code.get(at).map(|w| &w.word).ok_or_else(|| malformed(at))
}

fn lit(code: &[VmWord], at: usize) -> Result<&Value, RuntimeError> {
    match word(code, at)? {
        Word::Lit(v) => Ok(v),
        _ => Err(malformed(at)),
    }
}

fn addr(code: &[VmWord], at: usize) -> Result<usize, RuntimeError> {
    match word(code, at)? {
        Word::Addr(a) => Ok(*a),
        _ => Err(malformed(at)),
    }
}

fn int(code: &[VmWord], at: usize) -> Result<i64, RuntimeError> {
    lit(code, at)?.as_int().ok_or_else(|| malformed(at))
}

fn var(code: &[VmWord], at: usize) -> Result<VarId, RuntimeError> {
    VarId::try_from(int(code, at)?).map_err(|_| malformed(at))
}

fn name(code: &[VmWord], at: usize) -> Result<&str, RuntimeError> {
    lit(code, at)?.as_str().ok_or_else(|| malformed(at))
}

fn count(code: &[VmWord], at: usize) -> Result<usize, RuntimeError> {
    usize::try_from(int(code, at)?).map_err(|_| malformed(at))
}

// ═══════════════════════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════════════════════

fn step(
    code: &[VmWord],
    frame: &mut Frame,
    ctx: &mut Context,
    world: &mut dyn World,
) -> Result<Option<Signal>, RuntimeError> {
    ctx.tick()?;
    let at = frame.pc;
    let op = match word(code, at)? {
        Word::Op(op) => *op,
        _ => return Err(malformed(at)),
    };
    frame.pc = at + 1 + op.arg_count();
    let a = at + 1;

    match op {
        Opcode::Push => frame.push(lit(code, a)?.clone()),
        Opcode::Pop => {
            frame.pop()?;
        }
        Opcode::Dup => {
            let top = frame.peek()?.clone();
            frame.push(top);
        }
        Opcode::Dup2 => {
            let pair = frame.pop_n(2)?;
            frame.stack.extend(pair.iter().cloned());
            frame.stack.extend(pair);
        }

        Opcode::GetVar => {
            let id = var(code, a)?;
            let value = frame.get_var(id).cloned().ok_or_else(|| frame.var_not_found(id))?;
            frame.push(value);
        }
        Opcode::SetVar => {
            let value = frame.pop()?;
            frame.set_var(var(code, a)?, value);
        }
        Opcode::TeeVar => {
            let value = frame.peek()?.clone();
            frame.set_var(var(code, a)?, value);
        }

        Opcode::MakeList => {
            let items = frame.pop_n(count(code, a)?)?;
            frame.push(Value::list(items));
        }
        Opcode::MakeMap => {
            let flat = frame.pop_n(count(code, a)? * 2)?;
            let mut entries = indexmap::IndexMap::with_capacity(flat.len() / 2);
            let mut it = flat.into_iter();
            while let (Some(k), Some(v)) = (it.next(), it.next()) {
                let key = MapKey::from_value(&k).ok_or_else(|| {
                    RuntimeError::type_mismatch(format!("{} cannot be a map key", k.type_name()))
                })?;
                entries.insert(key, v);
            }
            frame.push(Value::map(entries));
        }
        Opcode::Interpolate => {
            let parts = frame.pop_n(count(code, a)?)?;
            let text: String = parts.iter().map(|p| p.to_string()).collect();
            frame.push(Value::from(text));
        }
        Opcode::MakeFunction => {
            let function = make_function(frame, addr(code, a)?)?;
            frame.push(Value::Fun(Rc::new(function)));
        }
        Opcode::ErrMsg => {
            let message = frame.pop()?;
            match frame.pop()? {
                Value::Err(err) => frame.push(Value::err_msg(err.kind, message.to_string())),
                other => {
                    return Err(RuntimeError::type_mismatch(format!(
                        "expected an error kind, got {}",
                        other.type_name()
                    )))
                }
            }
        }

        Opcode::Index => {
            let idx = frame.pop()?;
            let coll = frame.pop()?;
            frame.push(collection::index(&coll, &idx)?);
        }
        Opcode::IndexSet => {
            let value = frame.pop()?;
            let idx = frame.pop()?;
            let coll = frame.pop()?;
            collection::index_set(&coll, &idx, value)?;
        }
        Opcode::Slice => {
            let to = frame.pop()?;
            let from = frame.pop()?;
            let coll = frame.pop()?;
            frame.push(collection::slice(&coll, &from, &to)?);
        }
        Opcode::GetProp => {
            let target = frame.pop()?;
            frame.push(get_property(world, &target, name(code, a)?)?);
        }
        Opcode::SetProp => {
            let value = frame.pop()?;
            let target = frame.pop()?;
            set_property(world, &target, name(code, a)?, value)?;
        }
        Opcode::TraitRef => {
            let trait_name = name(code, a)?;
            if !world.trait_exists(trait_name) {
                return Err(RuntimeError::new(
                    ErrorKind::TraitNf,
                    format!("trait `{}` not found", trait_name),
                ));
            }
            frame.push(Value::Trait(Rc::from(trait_name)));
        }
        Opcode::TraitOf => {
            let trait_name = name(code, a)?;
            let target = frame.pop()?;
            let found = match &target {
                Value::Obj(o) => world.has_trait(*o, trait_name),
                Value::Trait(t) => &**t == trait_name,
                other => {
                    return Err(RuntimeError::type_mismatch(format!(
                        "{} has no traits",
                        other.type_name()
                    )))
                }
            };
            if !found {
                return Err(RuntimeError::new(
                    ErrorKind::TraitNf,
                    format!("{} does not carry trait `{}`", target, trait_name),
                ));
            }
            frame.push(Value::Trait(Rc::from(trait_name)));
        }

        Opcode::Add => binary(frame, BinOp::Add)?,
        Opcode::Sub => binary(frame, BinOp::Sub)?,
        Opcode::Mul => binary(frame, BinOp::Mul)?,
        Opcode::Div => binary(frame, BinOp::Div)?,
        Opcode::Mod => binary(frame, BinOp::Mod)?,
        Opcode::Pow => binary(frame, BinOp::Pow)?,
        Opcode::Eq => binary(frame, BinOp::Eq)?,
        Opcode::Ne => binary(frame, BinOp::Ne)?,
        Opcode::Lt => binary(frame, BinOp::Lt)?,
        Opcode::Le => binary(frame, BinOp::Le)?,
        Opcode::Gt => binary(frame, BinOp::Gt)?,
        Opcode::Ge => binary(frame, BinOp::Ge)?,
        Opcode::In => binary(frame, BinOp::In)?,
        Opcode::Neg => unary(frame, UnOp::Neg)?,
        Opcode::Not => unary(frame, UnOp::Not)?,
        Opcode::EqZero => {
            let v = frame.pop()?;
            frame.push(Value::Bool(v.equals(&Value::Int(0))));
        }
        Opcode::NeZero => {
            let v = frame.pop()?;
            frame.push(Value::Bool(!v.equals(&Value::Int(0))));
        }
        Opcode::IsType => {
            let type_name = name(code, a)?;
            let v = frame.pop()?;
            let is = if type_name == "null" {
                v.is_null()
            } else {
                v.type_name() == type_name
            };
            frame.push(Value::Bool(is));
        }
        Opcode::IsTrait => {
            let t = frame.pop()?;
            let v = frame.pop()?;
            let Value::Trait(trait_name) = &t else {
                return Err(RuntimeError::type_mismatch(format!("{} is not a trait", t.type_name())));
            };
            let is = match &v {
                Value::Obj(o) => world.has_trait(*o, trait_name),
                Value::Trait(other) => other == trait_name,
                _ => false,
            };
            frame.push(Value::Bool(is));
        }

        Opcode::Jump => frame.pc = addr(code, a)?,
        Opcode::JumpIfFalse => {
            if !frame.pop()?.is_truthy() {
                frame.pc = addr(code, a)?;
            }
        }
        Opcode::JumpIfTrue => {
            if frame.pop()?.is_truthy() {
                frame.pc = addr(code, a)?;
            }
        }
        Opcode::AndJump | Opcode::OrJump | Opcode::NullJump => {
            let top = frame.peek()?;
            let jump = match op {
                Opcode::AndJump => !top.is_truthy(),
                Opcode::OrJump => top.is_truthy(),
                _ => !top.is_null(),
            };
            if jump {
                frame.pc = addr(code, a)?;
            } else {
                frame.pop()?;
            }
        }
        Opcode::IterNext => {
            let value_var = var(code, a)?;
            let key_var = int(code, a + 1)?;
            let done = addr(code, a + 2)?;
            let idx = frame.pop()?;
            let coll = frame.peek()?.clone();
            let i = idx.as_int().ok_or_else(|| malformed(at))?;
            match collection::nth(&coll, i)? {
                Some((key, value)) => {
                    frame.push(Value::Int(i + 1));
                    frame.set_var(value_var, value);
                    if let Ok(k) = VarId::try_from(key_var) {
                        frame.set_var(k, key);
                    }
                }
                None => {
                    frame.push(idx);
                    frame.pc = done;
                }
            }
        }
        Opcode::RangeNext => {
            let id = var(code, a)?;
            let done = addr(code, a + 1)?;
            let end = frame.pop()?;
            let cur = frame.pop()?;
            let (Some(c), Some(e)) = (cur.as_int(), end.as_int()) else {
                return Err(RuntimeError::type_mismatch(format!(
                    "range bounds must be ints, got {} and {}",
                    cur.type_name(),
                    end.type_name()
                )));
            };
            if c <= e {
                frame.set_var(id, Value::Int(c));
                frame.push(Value::Int(c + 1));
                frame.push(end);
            } else {
                frame.push(cur);
                frame.push(end);
                frame.pc = done;
            }
        }

        Opcode::TryPush => {
            let mask = int(code, a)?;
            let handler = addr(code, a + 1)?;
            frame.handlers.push(Handler {
                mask,
                addr: handler,
                depth: frame.stack.len(),
            });
        }
        Opcode::TryPop => {
            frame.handlers.pop();
        }
        Opcode::Throw => match frame.pop()? {
            Value::Err(err) => return Err(RuntimeError::from_value(&err)),
            other => {
                return Err(RuntimeError::type_mismatch(format!(
                    "can only throw errors, got {}",
                    other.type_name()
                )))
            }
        },

        Opcode::CallVerb | Opcode::CallVerbDiscard => {
            let verb = name(code, a)?;
            let args = frame.pop_n(count(code, a + 1)?)?;
            let target = frame.pop()?;
            let discard = op == Opcode::CallVerbDiscard;
            match call_verb(ctx, world, target, verb, args)? {
                Flow::Value(v) => {
                    if !discard {
                        frame.push(v);
                    }
                }
                Flow::Call(req) => {
                    frame.discard_result = discard;
                    return Ok(Some(Signal::Call(req)));
                }
                Flow::Suspend(wait) => {
                    frame.discard_result = discard;
                    return Ok(Some(Signal::Suspend(wait)));
                }
            }
        }
        Opcode::CallValue => {
            let args = frame.pop_n(count(code, a)?)?;
            match frame.pop()? {
                Value::Fun(f) => {
                    return Ok(Some(Signal::Call(CallRequest {
                        code: f.code.clone(),
                        this: f.this.clone(),
                        args,
                        params: Some(f.params.clone()),
                        captured: f.captured.clone(),
                        name: "fn".into(),
                    })))
                }
                other => {
                    return Err(RuntimeError::type_mismatch(format!(
                        "{} is not callable",
                        other.type_name()
                    )))
                }
            }
        }
        Opcode::CallBuiltin | Opcode::CallBuiltinDiscard => {
            let builtin = name(code, a)?;
            let args = frame.pop_n(count(code, a + 1)?)?;
            let discard = op == Opcode::CallBuiltinDiscard;
            match builtins::call(builtin, args, ctx, world)? {
                Flow::Value(v) => {
                    if !discard {
                        frame.push(v);
                    }
                }
                Flow::Call(req) => {
                    frame.discard_result = discard;
                    return Ok(Some(Signal::Call(req)));
                }
                Flow::Suspend(wait) => {
                    frame.discard_result = discard;
                    return Ok(Some(Signal::Suspend(wait)));
                }
            }
        }
        Opcode::Fork => {
            let delay = frame.pop()?;
            let secs = match Wait::from_value(&delay)? {
                Wait::Seconds(s) => s,
                _ => 0.0,
            };
            let function = make_function(frame, addr(code, a)?)?;
            let id = ctx.fork(secs, Rc::new(function));
            frame.push(Value::Task(id));
        }
        Opcode::Suspend => {
            let wait = Wait::from_value(&frame.pop()?)?;
            return Ok(Some(Signal::Suspend(wait)));
        }
        Opcode::Return => return Ok(Some(Signal::Return(frame.pop()?))),
    }
    Ok(None)
}

fn binary(frame: &mut Frame, op: BinOp) -> Result<(), RuntimeError> {
    let b = frame.pop()?;
    let a = frame.pop()?;
    let result = ops::binary(op, &a, &b).map_err(|kind| match kind {
        ErrorKind::Div => RuntimeError::bare(ErrorKind::Div),
        kind => RuntimeError::new(
            kind,
            format!("cannot apply {} to {} and {}", op.symbol(), a.type_name(), b.type_name()),
        ),
    })?;
    frame.push(result);
    Ok(())
}

fn unary(frame: &mut Frame, op: UnOp) -> Result<(), RuntimeError> {
    let a = frame.pop()?;
    let result = ops::unary(op, &a).map_err(|kind| {
        RuntimeError::new(kind, format!("cannot apply {} to {}", op.symbol(), a.type_name()))
    })?;
    frame.push(result);
    Ok(())
}

/// Capture the block at `start` with the current values of its free variables.
fn make_function(frame: &Frame, start: usize) -> Result<Function, RuntimeError> {
    let index = frame
        .exe
        .block_at(start)
        .ok_or_else(|| RuntimeError::system(format!("no code block at {}", start)))?;
    let code = frame
        .exe
        .block(index)
        .ok_or_else(|| RuntimeError::system(format!("code block {} is out of range", index)))?;
    let block = &frame.exe.blocks[index];
    let captured = block
        .captured
        .iter()
        .filter_map(|id| frame.get_var(*id).map(|v| (*id, v.clone())))
        .collect();
    Ok(Function {
        code: Rc::new(code),
        params: block.params.clone(),
        captured,
        this: frame.this(),
    })
}

fn get_property(world: &dyn World, target: &Value, prop: &str) -> Result<Value, RuntimeError> {
    match target {
        Value::Obj(o) => world.get_property(*o, prop).map_err(|kind| match kind {
            ErrorKind::PropNf => RuntimeError::new(kind, format!("property `{}` not found on #{}", prop, o)),
            ErrorKind::InvObj => RuntimeError::new(kind, format!("#{} is not a valid object", o)),
            kind => RuntimeError::bare(kind),
        }),
        Value::Trait(t) => world.get_trait_property(t, prop).ok_or_else(|| {
            RuntimeError::new(ErrorKind::PropNf, format!("property `{}` not found on ${}", prop, t))
        }),
        other => Err(RuntimeError::type_mismatch(format!(
            "{} has no properties",
            other.type_name()
        ))),
    }
}

fn set_property(world: &mut dyn World, target: &Value, prop: &str, value: Value) -> Result<(), RuntimeError> {
    match target {
        Value::Obj(o) => world.set_property(*o, prop, value).map_err(|kind| match kind {
            ErrorKind::InvObj => RuntimeError::new(kind, format!("#{} is not a valid object", o)),
            kind => RuntimeError::bare(kind),
        }),
        other => Err(RuntimeError::type_mismatch(format!(
            "cannot set a property on {}",
            other.type_name()
        ))),
    }
}

fn call_verb(
    ctx: &mut Context,
    world: &mut dyn World,
    target: Value,
    verb: &str,
    args: Vec<Value>,
) -> Result<Flow, RuntimeError> {
    match &target {
        Value::Obj(o) => {
            if !world.valid(*o) {
                return Err(RuntimeError::new(ErrorKind::InvObj, format!("#{} is not a valid object", o)));
            }
            let code = world.find_verb(*o, verb).ok_or_else(|| {
                RuntimeError::new(ErrorKind::VerbNf, format!("verb `{}` not found on #{}", verb, o))
            })?;
            Ok(Flow::Call(CallRequest {
                code,
                name: format!("#{}:{}", o, verb),
                this: Value::Obj(*o),
                args,
                params: None,
                captured: Vec::new(),
            }))
        }
        Value::Trait(t) => {
            let code = world.find_trait_verb(t, verb).ok_or_else(|| {
                RuntimeError::new(ErrorKind::VerbNf, format!("verb `{}` not found on ${}", verb, t))
            })?;
            Ok(Flow::Call(CallRequest {
                code,
                name: format!("${}:{}", t, verb),
                this: Value::Trait(t.clone()),
                args,
                params: None,
                captured: Vec::new(),
            }))
        }
        _ => verbs::call(&target, verb, args, ctx, world).map(Flow::Value),
    }
}
