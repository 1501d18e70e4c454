//! Builtin functions: calls to names that are not variables.

use moo_common::ErrorKind;
use tracing::info;

use super::Flow;
use crate::connection::InputMode;
use crate::context::Context;
use crate::error::RuntimeError;
use crate::value::{ErrValue, Value};
use crate::vm::Wait;
use crate::world::World;

/// Names the interpreter answers itself. Anything else goes to the host.
pub const BUILTINS: &[&str] = &[
    "len", "typeof", "tostr", "toint", "tofloat", "notify", "print", "min", "max", "abs",
    "random", "time", "raise", "task_id", "cancel", "valid", "read_line", "read_lines", "suspend",
];

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), RuntimeError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(RuntimeError::invalid_arg(format!(
            "{}() takes {} argument{}, got {}",
            name,
            expected,
            if expected == "1" { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn number(name: &str, v: &Value) -> Result<f64, RuntimeError> {
    v.as_number()
        .ok_or_else(|| RuntimeError::type_mismatch(format!("{}() expects a number, got {}", name, v.type_name())))
}

pub fn call(
    name: &str,
    args: Vec<Value>,
    ctx: &mut Context,
    world: &mut dyn World,
) -> Result<Flow, RuntimeError> {
    let value = match name {
        "len" => {
            arity(name, &args, 1, 1)?;
            let n = args[0].length().ok_or_else(|| {
                RuntimeError::type_mismatch(format!("{} has no length", args[0].type_name()))
            })?;
            Value::Int(n as i64)
        }
        "typeof" => {
            arity(name, &args, 1, 1)?;
            Value::str(args[0].type_name())
        }
        "tostr" => Value::from(args.iter().map(|v| v.to_string()).collect::<String>()),
        "toint" => {
            arity(name, &args, 1, 1)?;
            to_int(&args[0])?
        }
        "tofloat" => {
            arity(name, &args, 1, 1)?;
            to_float(&args[0])?
        }
        "notify" => {
            arity(name, &args, 2, 2)?;
            let Value::Obj(obj) = args[0] else {
                return Err(RuntimeError::type_mismatch(format!(
                    "notify() expects an object, got {}",
                    args[0].type_name()
                )));
            };
            world.notify(obj, &args[1].to_string());
            Value::Null
        }
        "print" => {
            let text: String = args.iter().map(|v| v.to_string()).collect();
            if !ctx.send(&text) {
                info!(task = ctx.task_id, "{}", text);
            }
            Value::Null
        }
        "min" | "max" => extreme(name, &args)?,
        "abs" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Int(n) => Value::Int(n.wrapping_abs()),
                other => Value::Float(number(name, other)?.abs()),
            }
        }
        "random" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Value::Float(fastrand::f64()),
                Some(Value::Int(n)) if *n > 0 => Value::Int(fastrand::i64(1..=*n)),
                Some(other) => {
                    return Err(RuntimeError::invalid_arg(format!(
                        "random() expects a positive int, got {}",
                        other
                    )))
                }
            }
        }
        "time" => {
            arity(name, &args, 0, 0)?;
            Value::Int((ctx.now_ms / 1000) as i64)
        }
        "raise" => {
            arity(name, &args, 1, 2)?;
            let Value::Err(err) = &args[0] else {
                return Err(RuntimeError::type_mismatch(format!(
                    "raise() expects an error, got {}",
                    args[0].type_name()
                )));
            };
            let err = match args.get(1) {
                Some(message) => ErrValue::with_message(err.kind, message.to_string()),
                None => err.clone(),
            };
            return Err(RuntimeError::from_value(&err));
        }
        "task_id" => {
            arity(name, &args, 0, 0)?;
            Value::Task(ctx.task_id)
        }
        "cancel" => {
            arity(name, &args, 1, 1)?;
            let id = match &args[0] {
                Value::Task(id) => Some(*id),
                Value::Int(n) => u64::try_from(*n).ok().filter(|id| *id > 0),
                _ => None,
            };
            let Some(id) = id else {
                return Err(RuntimeError::type_mismatch(format!(
                    "cancel() expects a task, got {}",
                    args[0].type_name()
                )));
            };
            ctx.cancels.push(id);
            Value::Null
        }
        "valid" => {
            arity(name, &args, 1, 1)?;
            Value::Bool(matches!(args[0], Value::Obj(o) if world.valid(o)))
        }
        "read_line" | "read_lines" => {
            arity(name, &args, 0, 0)?;
            if ctx.connection.is_none() {
                return Err(RuntimeError::invalid_arg(format!("{}() needs a connection", name)));
            }
            let mode = if name == "read_line" { InputMode::Line } else { InputMode::Lines };
            return Ok(Flow::Suspend(Wait::Input(mode)));
        }
        "suspend" => {
            arity(name, &args, 0, 1)?;
            let wait = Wait::from_value(args.first().unwrap_or(&Value::Null))?;
            return Ok(Flow::Suspend(wait));
        }
        _ => match world.call_builtin(name, &args) {
            Some(Ok(value)) => value,
            Some(Err(kind)) => return Err(RuntimeError::bare(kind)),
            None => {
                return Err(RuntimeError::new(
                    ErrorKind::VerbNf,
                    format!("unknown builtin `{}`", name),
                ))
            }
        },
    };
    Ok(Flow::Value(value))
}

fn to_int(v: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Int(match v {
        Value::Int(n) => *n,
        Value::Float(f) => *f as i64,
        Value::Bool(b) => i64::from(*b),
        Value::Obj(o) => *o,
        Value::Task(t) => *t as i64,
        Value::Err(e) => i64::from(e.kind as u8),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .or_else(|_| s.trim().parse::<f64>().map(|f| f as i64))
            .map_err(|_| RuntimeError::invalid_arg(format!("cannot convert {} to int", v.literal())))?,
        other => {
            return Err(RuntimeError::type_mismatch(format!(
                "cannot convert {} to int",
                other.type_name()
            )))
        }
    }))
}

fn to_float(v: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Float(match v {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RuntimeError::invalid_arg(format!("cannot convert {} to float", v.literal())))?,
        other => {
            return Err(RuntimeError::type_mismatch(format!(
                "cannot convert {} to float",
                other.type_name()
            )))
        }
    }))
}

/// `min`/`max` over the arguments, or over the single list argument.
fn extreme(name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
    let items: Vec<Value> = match args {
        [Value::List(items)] => items.borrow().clone(),
        _ => args.to_vec(),
    };
    let mut it = items.into_iter();
    let mut best = it
        .next()
        .ok_or_else(|| RuntimeError::invalid_arg(format!("{}() needs at least one value", name)))?;
    for v in it {
        let ord = v.compare(&best).ok_or_else(|| {
            RuntimeError::type_mismatch(format!(
                "{}() cannot compare {} with {}",
                name,
                v.type_name(),
                best.type_name()
            ))
        })?;
        if (name == "min" && ord.is_lt()) || (name == "max" && ord.is_gt()) {
            best = v;
        }
    }
    Ok(best)
}
