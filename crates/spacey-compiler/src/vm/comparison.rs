//! Equality and relational comparison (E5 Sections 11.8.5, 11.9.3, 11.9.6).

use std::cmp::Ordering;
use std::rc::Rc;

use crate::runtime::value::Value;

/// Strict equality comparison (`===`).
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        // NaN != NaN, +0 == -0
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Abstract equality comparison (`==`), with type coercion.
pub fn abstract_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,

        (Value::Number(n), Value::String(_)) => *n == b.to_number(),
        (Value::String(_), Value::Number(n)) => a.to_number() == *n,

        (Value::Boolean(_), _) => abstract_equals(&Value::Number(a.to_number()), b),
        (_, Value::Boolean(_)) => abstract_equals(a, &Value::Number(b.to_number())),

        (Value::Number(_) | Value::String(_), Value::Object(_)) => abstract_equals(a, &b.to_primitive()),
        (Value::Object(_), Value::Number(_) | Value::String(_)) => abstract_equals(&a.to_primitive(), b),

        _ => strict_equals(a, b),
    }
}

/// Abstract relational comparison `a < b`.
///
/// Returns `None` when either side converts to NaN ("undefined" in the
/// algorithm), which every relational operator treats as false.
pub fn less_than(a: &Value, b: &Value) -> Option<bool> {
    let pa = a.to_primitive();
    let pb = b.to_primitive();

    if let (Value::String(x), Value::String(y)) = (&pa, &pb) {
        // Strings compare by UTF-16 code units.
        return Some(x.encode_utf16().cmp(y.encode_utf16()) == Ordering::Less);
    }

    let x = pa.to_number();
    let y = pb.to_number();
    if x.is_nan() || y.is_nan() {
        None
    } else {
        Some(x < y)
    }
}
