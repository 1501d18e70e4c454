//! Verbs on lists, maps and strings.

use moo_common::ErrorKind;

use crate::context::Context;
use crate::error::RuntimeError;
use crate::value::{MapKey, Value};
use crate::world::World;

fn arity(verb: &str, args: &[Value], n: usize) -> Result<(), RuntimeError> {
    if args.len() != n {
        return Err(RuntimeError::invalid_arg(format!(
            "{}() takes {} argument{}, got {}",
            verb,
            n,
            if n == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn no_verb(target: &Value, verb: &str) -> RuntimeError {
    RuntimeError::new(
        ErrorKind::VerbNf,
        format!("{} has no verb `{}`", target.type_name(), verb),
    )
}

fn text_arg<'a>(verb: &str, v: &'a Value) -> Result<&'a str, RuntimeError> {
    v.as_str().ok_or_else(|| {
        RuntimeError::type_mismatch(format!("{}() expects a str, got {}", verb, v.type_name()))
    })
}

pub fn call(
    target: &Value,
    verb: &str,
    args: Vec<Value>,
    ctx: &mut Context,
    world: &mut dyn World,
) -> Result<Value, RuntimeError> {
    match target {
        Value::List(_) => list_verb(target, verb, args, ctx, world),
        Value::Map(_) => map_verb(target, verb, args),
        Value::Str(_) => str_verb(target, verb, args),
        _ => Err(no_verb(target, verb)),
    }
}

fn list_verb(
    target: &Value,
    verb: &str,
    args: Vec<Value>,
    ctx: &mut Context,
    world: &mut dyn World,
) -> Result<Value, RuntimeError> {
    let Value::List(items) = target else {
        return Err(no_verb(target, verb));
    };
    match verb {
        "length" => {
            arity(verb, &args, 0)?;
            Ok(Value::Int(items.borrow().len() as i64))
        }
        "push" => {
            arity(verb, &args, 1)?;
            items.borrow_mut().extend(args);
            Ok(target.clone())
        }
        "pop" => {
            arity(verb, &args, 0)?;
            items
                .borrow_mut()
                .pop()
                .ok_or_else(|| RuntimeError::range("pop() on an empty list"))
        }
        "contains" => {
            arity(verb, &args, 1)?;
            Ok(Value::Bool(items.borrow().iter().any(|v| v.equals(&args[0]))))
        }
        "index_of" => {
            arity(verb, &args, 1)?;
            let at = items.borrow().iter().position(|v| v.equals(&args[0]));
            Ok(Value::Int(at.map_or(-1, |i| i as i64)))
        }
        "join" => {
            if args.len() > 1 {
                arity(verb, &args, 1)?;
            }
            let sep = match args.first() {
                Some(v) => text_arg(verb, v)?.to_string(),
                None => String::new(),
            };
            let parts: Vec<String> = items.borrow().iter().map(|v| v.to_string()).collect();
            Ok(Value::from(parts.join(&sep)))
        }
        "map" | "filter" => {
            arity(verb, &args, 1)?;
            let Value::Fun(function) = &args[0] else {
                return Err(RuntimeError::type_mismatch(format!(
                    "{}() expects a function, got {}",
                    verb,
                    args[0].type_name()
                )));
            };
            // Snapshot so the callback may modify the list.
            let snapshot = items.borrow().clone();
            let mut out = Vec::with_capacity(snapshot.len());
            for item in snapshot {
                let result = ctx.call_function(function, vec![item.clone()], world)?;
                if verb == "map" {
                    out.push(result);
                } else if result.is_truthy() {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
        "reverse" => {
            arity(verb, &args, 0)?;
            Ok(Value::list(items.borrow().iter().rev().cloned().collect()))
        }
        _ => Err(no_verb(target, verb)),
    }
}

fn key(v: &Value) -> Result<MapKey, RuntimeError> {
    MapKey::from_value(v)
        .ok_or_else(|| RuntimeError::type_mismatch(format!("{} cannot be a map key", v.type_name())))
}

fn map_verb(target: &Value, verb: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let Value::Map(entries) = target else {
        return Err(no_verb(target, verb));
    };
    match verb {
        "keys" => {
            arity(verb, &args, 0)?;
            Ok(Value::list(entries.borrow().keys().map(MapKey::to_value).collect()))
        }
        "values" => {
            arity(verb, &args, 0)?;
            Ok(Value::list(entries.borrow().values().cloned().collect()))
        }
        "has" => {
            arity(verb, &args, 1)?;
            Ok(Value::Bool(entries.borrow().contains_key(&key(&args[0])?)))
        }
        "delete" => {
            arity(verb, &args, 1)?;
            let removed = entries.borrow_mut().shift_remove(&key(&args[0])?);
            Ok(removed.unwrap_or(Value::Null))
        }
        "length" => {
            arity(verb, &args, 0)?;
            Ok(Value::Int(entries.borrow().len() as i64))
        }
        _ => Err(no_verb(target, verb)),
    }
}

fn str_verb(target: &Value, verb: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let Value::Str(s) = target else {
        return Err(no_verb(target, verb));
    };
    match verb {
        "length" => {
            arity(verb, &args, 0)?;
            Ok(Value::Int(s.chars().count() as i64))
        }
        "upper" => {
            arity(verb, &args, 0)?;
            Ok(Value::from(s.to_uppercase()))
        }
        "lower" => {
            arity(verb, &args, 0)?;
            Ok(Value::from(s.to_lowercase()))
        }
        "trim" => {
            arity(verb, &args, 0)?;
            Ok(Value::str(s.trim()))
        }
        "split" => {
            let parts: Vec<Value> = match args.as_slice() {
                [] => s.split_whitespace().map(Value::str).collect(),
                [sep] => {
                    let sep = text_arg(verb, sep)?;
                    if sep.is_empty() {
                        return Err(RuntimeError::invalid_arg("split() separator is empty"));
                    }
                    s.split(sep).map(Value::str).collect()
                }
                _ => return Err(RuntimeError::invalid_arg("split() takes at most 1 argument")),
            };
            Ok(Value::list(parts))
        }
        "contains" => {
            arity(verb, &args, 1)?;
            Ok(Value::Bool(s.contains(text_arg(verb, &args[0])?)))
        }
        "index_of" => {
            arity(verb, &args, 1)?;
            let needle = text_arg(verb, &args[0])?;
            let at = s.find(needle).map_or(-1, |byte| s[..byte].chars().count() as i64);
            Ok(Value::Int(at))
        }
        _ => Err(no_verb(target, verb)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_verbs_keep_order() {
        let map = Value::empty_map();
        if let Value::Map(m) = &map {
            m.borrow_mut().insert(MapKey::Str("b".into()), Value::Int(2));
            m.borrow_mut().insert(MapKey::Str("a".into()), Value::Int(1));
        }
        let keys = map_verb(&map, "keys", vec![]).unwrap();
        assert_eq!(keys, Value::list(vec![Value::str("b"), Value::str("a")]));
        assert_eq!(map_verb(&map, "delete", vec![Value::str("b")]).unwrap(), Value::Int(2));
        assert_eq!(map_verb(&map, "has", vec![Value::str("b")]).unwrap(), Value::Bool(false));
        assert_eq!(map_verb(&map, "length", vec![]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_str_verbs() {
        let s = Value::str("  Hello World ");
        assert_eq!(str_verb(&s, "trim", vec![]).unwrap(), Value::str("Hello World"));
        assert_eq!(
            str_verb(&s, "split", vec![]).unwrap(),
            Value::list(vec![Value::str("Hello"), Value::str("World")])
        );
        assert_eq!(str_verb(&s, "index_of", vec![Value::str("W")]).unwrap(), Value::Int(8));
        assert_eq!(str_verb(&s, "index_of", vec![Value::str("z")]).unwrap(), Value::Int(-1));
        assert_eq!(str_verb(&Value::str("ab"), "upper", vec![]).unwrap(), Value::str("AB"));
        assert_eq!(str_verb(&s, "nope", vec![]).unwrap_err().kind, ErrorKind::VerbNf);
    }

    #[test]
    fn test_str_split_with_separator() {
        let parts = str_verb(&Value::str("a,b,,c"), "split", vec![Value::str(",")]).unwrap();
        assert_eq!(parts.length(), Some(4));
        assert!(str_verb(&Value::str("a"), "split", vec![Value::str("")]).is_err());
    }
}
