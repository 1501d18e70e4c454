//! Runtime values.
//!
//! Lists and maps are shared and mutable: copying a `Value` copies the
//! handle, so an in-place update through one variable is visible through
//! every other reference. Maps keep insertion order.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use moo_common::ErrorKind;

use crate::executable::{Executable, VarId};

/// Object number. `#-1` is the null object.
pub type ObjId = i64;

/// Scheduler task id.
pub type TaskId = u64;

pub const NOTHING: ObjId = -1;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<IndexMap<MapKey, Value>>>;

#[derive(Clone)]
pub enum Value {
    /// Result of statements and of code that produced nothing.
    Void,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(ListRef),
    Map(MapRef),
    Obj(ObjId),
    /// A trait, by name.
    Trait(Rc<str>),
    Fun(Rc<Function>),
    Task(TaskId),
    Err(ErrValue),
}

/// An error as a first-class value.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrValue {
    pub kind: ErrorKind,
    pub message: Option<Rc<str>>,
}

impl ErrValue {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, message: None }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<Rc<str>>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for ErrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.kind, msg),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A closure: a code block sliced out of its defining executable plus the
/// variables it captured when the literal was evaluated.
#[derive(Debug)]
pub struct Function {
    pub code: Rc<Executable>,
    pub params: Vec<VarId>,
    pub captured: Vec<(VarId, Value)>,
    /// `this` at the point the literal was evaluated.
    pub this: Value,
}

/// The subset of values usable as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Str(Rc<str>),
    Bool(bool),
    Obj(ObjId),
    Trait(Rc<str>),
    Err(ErrorKind),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<MapKey> {
        Some(match value {
            Value::Int(n) => MapKey::Int(*n),
            Value::Str(s) => MapKey::Str(s.clone()),
            Value::Bool(b) => MapKey::Bool(*b),
            Value::Obj(o) => MapKey::Obj(*o),
            Value::Trait(t) => MapKey::Trait(t.clone()),
            Value::Err(e) => MapKey::Err(e.kind),
            _ => return None,
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Int(n) => Value::Int(*n),
            MapKey::Str(s) => Value::Str(s.clone()),
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Obj(o) => Value::Obj(*o),
            MapKey::Trait(t) => Value::Trait(t.clone()),
            MapKey::Err(k) => Value::Err(ErrValue::new(*k)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Construction
// ═══════════════════════════════════════════════════════════════════════════

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<MapKey, Value>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn empty_map() -> Value {
        Value::map(IndexMap::new())
    }

    pub fn err(kind: ErrorKind) -> Value {
        Value::Err(ErrValue::new(kind))
    }

    pub fn err_msg(kind: ErrorKind, message: impl Into<Rc<str>>) -> Value {
        Value::Err(ErrValue::with_message(kind, message))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Inspection
// ═══════════════════════════════════════════════════════════════════════════

impl Value {
    /// Name used by `typeof` and `is`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Obj(_) => "obj",
            Value::Trait(_) => "trait",
            Value::Fun(_) => "fn",
            Value::Task(_) => "task",
            Value::Err(_) => "err",
        }
    }

    /// Only `null`, void and `false` are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Void | Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Void)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Number of elements for collections and characters for strings.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.borrow().len()),
            Value::Map(m) => Some(m.borrow().len()),
            _ => None,
        }
    }

    /// Structural equality. Numbers compare across int/float, lists and
    /// maps compare element-wise, functions by identity, errors by kind.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Void | Value::Null, Value::Void | Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_number() == other.as_number()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).map_or(false, |w| v.equals(w)))
            }
            (Value::Obj(a), Value::Obj(b)) => a == b,
            (Value::Trait(a), Value::Trait(b)) => a == b,
            (Value::Fun(a), Value::Fun(b)) => Rc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => a == b,
            (Value::Err(a), Value::Err(b)) => a.kind == b.kind,
            _ => false,
        }
    }

    /// Ordering for `< <= > >=`. `None` for incomparable types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_number()?.partial_cmp(&other.as_number()?)
            }
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Obj(a), Value::Obj(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Source-like rendering: strings quoted, used inside collections.
    pub fn literal(&self) -> String {
        match self {
            Value::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '$' => out.push_str("\\$"),
                        c => out.push(c),
                    }
                }
                out.push('"');
                out
            }
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

/// `tostr` rendering: strings bare, everything else as a literal.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => Ok(()),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.literal())?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                let entries = entries.borrow();
                if entries.is_empty() {
                    return f.write_str("[:]");
                }
                f.write_str("[")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k.to_value().literal(), v.literal())?;
                }
                f.write_str("]")
            }
            Value::Obj(o) => write!(f, "#{}", o),
            Value::Trait(t) => write!(f, "${}", t),
            Value::Fun(func) => write!(f, "fn/{}", func.params.len()),
            Value::Task(id) => write!(f, "task#{}", id),
            Value::Err(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("<void>"),
            other => f.write_str(&other.literal()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Void.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::str("").is_truthy());
        assert!(Value::list(vec![]).is_truthy());
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert!(!Value::Int(2).equals(&Value::str("2")));
    }

    #[test]
    fn test_lists_are_shared() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::List(items) = &a {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(b.length(), Some(2));
        assert!(a.equals(&Value::list(vec![Value::Int(1), Value::Int(2)])));
    }

    #[test]
    fn test_errors_compare_by_kind() {
        let a = Value::err_msg(ErrorKind::Range, "index 3 out of range");
        assert!(a.equals(&Value::err(ErrorKind::Range)));
        assert_eq!(a.to_string(), "E_RANGE: index 3 out of range");
    }

    #[test]
    fn test_rendering() {
        let mut entries = IndexMap::new();
        entries.insert(MapKey::Str("a".into()), Value::list(vec![Value::Int(1), Value::str("x")]));
        let map = Value::map(entries);
        assert_eq!(map.to_string(), "[\"a\": [1, \"x\"]]");
        assert_eq!(Value::empty_map().to_string(), "[:]");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Obj(-1).to_string(), "#-1");
        assert_eq!(Value::str("hi").to_string(), "hi");
    }

    #[test]
    fn test_map_keys() {
        assert!(MapKey::from_value(&Value::Float(1.0)).is_none());
        assert!(MapKey::from_value(&Value::list(vec![])).is_none());
        let key = MapKey::from_value(&Value::Obj(5)).unwrap();
        assert!(key.to_value().equals(&Value::Obj(5)));
    }
}
