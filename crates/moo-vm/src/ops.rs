//! Per-type operators.
//!
//! Each operator returns `None` when it is not defined for the operand
//! types. [`binary`] and [`unary`] wrap them with the division-by-zero
//! check and map failures to error kinds; the interpreter and the
//! compiler's constant folder both go through these two functions.

use std::cmp::Ordering;

use moo_common::ErrorKind;

use crate::value::{MapKey, Value};

/// Longest string `str * n` may build.
pub const MAX_REPEAT_LEN: usize = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
        }
    }
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

impl Value {
    pub fn add(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.wrapping_add(*b))),
            (Value::Str(a), Value::Str(b)) => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                Some(Value::from(s))
            }
            (Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Some(Value::list(items))
            }
            (Value::Map(a), Value::Map(b)) => {
                let mut entries = a.borrow().clone();
                for (k, v) in b.borrow().iter() {
                    entries.insert(k.clone(), v.clone());
                }
                Some(Value::map(entries))
            }
            _ => float_op(self, other, |a, b| a + b),
        }
    }

    pub fn sub(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.wrapping_sub(*b))),
            _ => float_op(self, other, |a, b| a - b),
        }
    }

    pub fn mul(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.wrapping_mul(*b))),
            _ => float_op(self, other, |a, b| a * b),
        }
    }

    /// Integer division truncates. The divisor must already be known non-zero.
    pub fn div(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.wrapping_div(*b))),
            _ => float_op(self, other, |a, b| a / b),
        }
    }

    pub fn rem(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(a.wrapping_rem(*b))),
            _ => float_op(self, other, |a, b| a % b),
        }
    }

    pub fn pow(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) if *b >= 0 => {
                let exp = u32::try_from(*b).unwrap_or(u32::MAX);
                Some(Value::Int(a.wrapping_pow(exp)))
            }
            _ => float_op(self, other, f64::powf),
        }
    }

    pub fn neg(&self) -> Option<Value> {
        match self {
            Value::Int(n) => Some(Value::Int(n.wrapping_neg())),
            Value::Float(f) => Some(Value::Float(-f)),
            _ => None,
        }
    }

    /// `item in self`.
    pub fn contains(&self, item: &Value) -> Option<bool> {
        match self {
            Value::List(items) => Some(items.borrow().iter().any(|v| v.equals(item))),
            Value::Map(entries) => {
                Some(MapKey::from_value(item).map_or(false, |k| entries.borrow().contains_key(&k)))
            }
            Value::Str(s) => item.as_str().map(|needle| s.contains(needle)),
            _ => None,
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Value::Int(n) => *n == 0,
            Value::Float(f) => *f == 0.0,
            _ => false,
        }
    }
}

fn float_op(a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Some(Value::Float(f(a.as_number()?, b.as_number()?)))
        }
        _ => None,
    }
}

/// `s * n`. Errors are `E_TYPE` for a negative count and `E_RESOURCE`
/// when the result would exceed [`MAX_REPEAT_LEN`].
fn repeat(s: &str, n: i64) -> Result<Value, ErrorKind> {
    let count = usize::try_from(n).map_err(|_| ErrorKind::Type)?;
    match s.len().checked_mul(count) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::from(s.repeat(count))),
        _ => Err(ErrorKind::Resource),
    }
}

fn ordered(a: &Value, b: &Value, test: fn(Ordering) -> bool) -> Result<Value, ErrorKind> {
    a.compare(b).map(|ord| Value::Bool(test(ord))).ok_or(ErrorKind::Type)
}

/// Apply a binary operator.
pub fn binary(op: BinOp, a: &Value, b: &Value) -> Result<Value, ErrorKind> {
    match op {
        BinOp::Add => a.add(b).ok_or(ErrorKind::Type),
        BinOp::Sub => a.sub(b).ok_or(ErrorKind::Type),
        BinOp::Mul => match (a, b) {
            (Value::Str(s), Value::Int(n)) => repeat(s, *n),
            _ => a.mul(b).ok_or(ErrorKind::Type),
        },
        BinOp::Div | BinOp::Mod => {
            if a.as_number().is_some() && b.is_zero() {
                return Err(ErrorKind::Div);
            }
            let result = if op == BinOp::Div { a.div(b) } else { a.rem(b) };
            result.ok_or(ErrorKind::Type)
        }
        BinOp::Pow => a.pow(b).ok_or(ErrorKind::Type),
        BinOp::Eq => Ok(Value::Bool(a.equals(b))),
        BinOp::Ne => Ok(Value::Bool(!a.equals(b))),
        BinOp::Lt => ordered(a, b, Ordering::is_lt),
        BinOp::Le => ordered(a, b, Ordering::is_le),
        BinOp::Gt => ordered(a, b, Ordering::is_gt),
        BinOp::Ge => ordered(a, b, Ordering::is_ge),
        BinOp::In => b.contains(a).map(Value::Bool).ok_or(ErrorKind::Type),
    }
}

/// Apply a unary operator.
pub fn unary(op: UnOp, a: &Value) -> Result<Value, ErrorKind> {
    match op {
        UnOp::Neg => a.neg().ok_or(ErrorKind::Type),
        UnOp::Not => Ok(Value::Bool(!a.is_truthy())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    #[test]
    fn test_precedence_example_pieces() {
        // 14 * 10 + 71 / 3 ^ 3
        let pow = binary(BinOp::Pow, &int(3), &int(3)).unwrap();
        let div = binary(BinOp::Div, &int(71), &pow).unwrap();
        let mul = binary(BinOp::Mul, &int(14), &int(10)).unwrap();
        assert_eq!(binary(BinOp::Add, &mul, &div).unwrap(), int(142));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(binary(BinOp::Div, &int(1), &int(0)), Err(ErrorKind::Div));
        assert_eq!(binary(BinOp::Mod, &int(1), &int(0)), Err(ErrorKind::Div));
        assert_eq!(binary(BinOp::Div, &Value::Float(1.0), &int(0)), Err(ErrorKind::Div));
        assert_eq!(binary(BinOp::Div, &Value::str("a"), &int(0)), Err(ErrorKind::Type));
    }

    #[test]
    fn test_string_repetition_is_bounded() {
        assert_eq!(binary(BinOp::Mul, &Value::str("ab"), &int(3)).unwrap(), Value::str("ababab"));
        assert_eq!(binary(BinOp::Mul, &Value::str("ab"), &int(0)).unwrap(), Value::str(""));
        assert_eq!(binary(BinOp::Mul, &Value::str("ab"), &int(-1)), Err(ErrorKind::Type));
        assert_eq!(binary(BinOp::Mul, &Value::str("ab"), &int(i64::MAX)), Err(ErrorKind::Resource));
        let limit = i64::try_from(MAX_REPEAT_LEN).unwrap();
        assert_eq!(binary(BinOp::Mul, &Value::str("a"), &int(limit + 1)), Err(ErrorKind::Resource));
        assert_eq!(binary(BinOp::Mul, &Value::str(""), &int(i64::MAX)).unwrap(), Value::str(""));
    }

    #[test]
    fn test_mixed_arithmetic_promotes_to_float() {
        assert_eq!(binary(BinOp::Add, &int(1), &Value::Float(0.5)).unwrap(), Value::Float(1.5));
        assert_eq!(binary(BinOp::Pow, &int(2), &int(-1)).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_type_mismatch() {
        assert_eq!(binary(BinOp::Sub, &Value::str("a"), &int(1)), Err(ErrorKind::Type));
        assert_eq!(binary(BinOp::Lt, &Value::Null, &int(1)), Err(ErrorKind::Type));
        assert_eq!(unary(UnOp::Neg, &Value::str("a")), Err(ErrorKind::Type));
    }

    #[test]
    fn test_concatenation_and_membership() {
        assert_eq!(
            binary(BinOp::Add, &Value::str("ab"), &Value::str("cd")).unwrap(),
            Value::str("abcd")
        );
        let list = Value::list(vec![int(1), int(2)]);
        assert_eq!(binary(BinOp::In, &int(2), &list).unwrap(), Value::Bool(true));
        assert_eq!(
            binary(BinOp::In, &Value::str("ell"), &Value::str("hello")).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_list_addition_copies() {
        let a = Value::list(vec![int(1)]);
        let b = Value::list(vec![int(2)]);
        let c = binary(BinOp::Add, &a, &b).unwrap();
        assert_eq!(c.length(), Some(2));
        assert_eq!(a.length(), Some(1));
    }
}
