//! Indexing, slicing and iteration. Indices are zero-based; slices include
//! both ends.

use moo_common::ErrorKind;

use crate::error::RuntimeError;
use crate::value::{MapKey, Value};

fn position(idx: &Value) -> Result<i64, RuntimeError> {
    idx.as_int()
        .ok_or_else(|| RuntimeError::type_mismatch(format!("index must be an int, got {}", idx.type_name())))
}

fn in_bounds(i: i64, len: usize) -> Result<usize, RuntimeError> {
    usize::try_from(i)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| RuntimeError::range(format!("index {} out of range", i)))
}

fn map_key(idx: &Value) -> Result<MapKey, RuntimeError> {
    MapKey::from_value(idx)
        .ok_or_else(|| RuntimeError::type_mismatch(format!("{} cannot be a map key", idx.type_name())))
}

pub fn index(coll: &Value, idx: &Value) -> Result<Value, RuntimeError> {
    match coll {
        Value::List(items) => {
            let items = items.borrow();
            let i = in_bounds(position(idx)?, items.len())?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let i = position(idx)?;
            let c = usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .ok_or_else(|| RuntimeError::range(format!("index {} out of range", i)))?;
            Ok(Value::from(c.to_string()))
        }
        Value::Map(entries) => {
            let key = map_key(idx)?;
            entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| RuntimeError::range(format!("key {} not found", idx.literal())))
        }
        other => Err(RuntimeError::type_mismatch(format!("cannot index {}", other.type_name()))),
    }
}

/// Store in place; every holder of the collection sees the change.
pub fn index_set(coll: &Value, idx: &Value, value: Value) -> Result<(), RuntimeError> {
    match coll {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = in_bounds(position(idx)?, items.len())?;
            items[i] = value;
            Ok(())
        }
        Value::Map(entries) => {
            let key = map_key(idx)?;
            entries.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(RuntimeError::type_mismatch(format!(
            "cannot assign into {}",
            other.type_name()
        ))),
    }
}

/// `coll[from..to]`. An empty result needs `from == to + 1`.
pub fn slice(coll: &Value, from: &Value, to: &Value) -> Result<Value, RuntimeError> {
    let (from, to) = (position(from)?, position(to)?);
    let len = coll
        .length()
        .ok_or_else(|| RuntimeError::type_mismatch(format!("cannot slice {}", coll.type_name())))?;
    if from < 0 || to < from - 1 || to >= len as i64 {
        return Err(RuntimeError::range(format!("range {}..{} out of bounds", from, to)));
    }
    let (start, end) = (from as usize, (to + 1) as usize);
    match coll {
        Value::List(items) => Ok(Value::list(items.borrow()[start..end].to_vec())),
        Value::Str(s) => Ok(Value::from(s.chars().skip(start).take(end - start).collect::<String>())),
        other => Err(RuntimeError::new(
            ErrorKind::Type,
            format!("cannot slice {}", other.type_name()),
        )),
    }
}

/// The `(key, value)` pair at iteration step `i`, or `None` past the end.
/// Lists and strings yield their index as the key.
pub fn nth(coll: &Value, i: i64) -> Result<Option<(Value, Value)>, RuntimeError> {
    let Ok(at) = usize::try_from(i) else {
        return Ok(None);
    };
    Ok(match coll {
        Value::List(items) => items.borrow().get(at).map(|v| (Value::Int(i), v.clone())),
        Value::Map(entries) => entries
            .borrow()
            .get_index(at)
            .map(|(k, v)| (k.to_value(), v.clone())),
        Value::Str(s) => s.chars().nth(at).map(|c| (Value::Int(i), Value::from(c.to_string()))),
        other => {
            return Err(RuntimeError::type_mismatch(format!(
                "cannot iterate over {}",
                other.type_name()
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[i64]) -> Value {
        Value::list(items.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn test_out_of_range_message_names_index() {
        let err = index(&list(&[1, 2]), &Value::Int(666)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Range);
        assert_eq!(err.message.as_deref(), Some("index 666 out of range"));
        assert!(index(&list(&[1, 2]), &Value::Int(-1)).is_err());
    }

    #[test]
    fn test_index_set_is_shared() {
        let a = list(&[1, 2, 3]);
        let b = a.clone();
        index_set(&a, &Value::Int(1), Value::Int(20)).unwrap();
        assert_eq!(index(&b, &Value::Int(1)).unwrap(), Value::Int(20));
    }

    #[test]
    fn test_slices_are_inclusive() {
        assert_eq!(slice(&list(&[1, 2, 3, 4]), &Value::Int(1), &Value::Int(2)).unwrap(), list(&[2, 3]));
        assert_eq!(slice(&list(&[1, 2]), &Value::Int(1), &Value::Int(0)).unwrap(), list(&[]));
        assert_eq!(
            slice(&Value::str("hello"), &Value::Int(1), &Value::Int(3)).unwrap(),
            Value::str("ell")
        );
        assert!(slice(&list(&[1, 2]), &Value::Int(0), &Value::Int(2)).is_err());
    }

    #[test]
    fn test_missing_map_key() {
        let err = index(&Value::empty_map(), &Value::str("k")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Range);
        assert!(index(&Value::empty_map(), &Value::list(vec![])).is_err());
    }

    #[test]
    fn test_nth_over_map_yields_keys() {
        let map = Value::empty_map();
        index_set(&map, &Value::str("a"), Value::Int(1)).unwrap();
        let (k, v) = nth(&map, 0).unwrap().unwrap();
        assert_eq!(k, Value::str("a"));
        assert_eq!(v, Value::Int(1));
        assert!(nth(&map, 1).unwrap().is_none());
        assert!(nth(&Value::Int(1), 0).is_err());
    }
}
