//! Helpers for inspecting instance values the way BSON sees them.

use chrono::DateTime;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::convert::TryFrom;

/// The BSON type name that best describes `value`, for error messages.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => "int",
            Some(_) => "long",
            None if n.is_u64() => "number",
            None => "double",
        },
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(obj) => {
            if obj.len() == 1 && obj.contains_key("$numberDecimal") {
                "decimal"
            } else if obj.len() == 1 && obj.contains_key("$date") {
                "date"
            } else {
                "object"
            }
        }
    }
}

/// Equality as used by `enum` and `uniqueItems`: numbers compare by value,
/// so `1`, `1.0` and `{"$numberDecimal": "1.0"}` are the same.
pub fn equal(a: &Value, b: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_decimal(a), as_decimal(b)) {
        return compare(&a, &b) == Ordering::Equal;
    }

    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, a)| b.get(key).map_or(false, |b| equal(a, b)))
        }
        _ => a == b,
    }
}

/// Indices of the first pair of equal elements, if any.
pub fn first_duplicate(items: &[Value]) -> Option<(usize, usize)> {
    for (i, a) in items.iter().enumerate() {
        for (j, b) in items.iter().enumerate().skip(i + 1) {
            if equal(a, b) {
                return Some((i, j));
            }
        }
    }

    None
}

pub fn compare(a: &Number, b: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a.cmp(&b);
    }

    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a.cmp(&b);
    }

    // serde_json numbers are always finite, so the comparison is total.
    let a = a.as_f64().unwrap_or(0.0);
    let b = b.as_f64().unwrap_or(0.0);
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

pub fn is_multiple_of(value: &Number, divisor: &Number) -> bool {
    if let (Some(v), Some(d)) = (value.as_i64(), divisor.as_i64()) {
        return d != 0 && v % d == 0;
    }

    let (v, d) = match (value.as_f64(), divisor.as_f64()) {
        (Some(v), Some(d)) if d != 0.0 => (v, d),
        _ => return false,
    };

    let quotient = v / d;
    quotient.is_finite() && (quotient - quotient.round()).abs() < 1e-9
}

/// Reads a decimal, either a plain JSON number or the extended JSON form
/// `{"$numberDecimal": "12.50"}`.
pub fn as_decimal(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::Object(obj) if obj.len() == 1 => {
            let digits = obj.get("$numberDecimal")?.as_str()?.trim();
            if let Ok(i) = digits.parse::<i64>() {
                return Some(Number::from(i));
            }

            digits.parse::<f64>().ok().and_then(Number::from_f64)
        }
        _ => None,
    }
}

/// Accepts RFC 3339 strings and the extended JSON forms `{"$date": "<rfc3339>"}`,
/// `{"$date": <millis>}` and `{"$date": {"$numberLong": "<millis>"}}`.
pub fn is_date(value: &Value) -> bool {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).is_ok(),
        Value::Object(obj) if obj.len() == 1 => match obj.get("$date") {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s).is_ok(),
            Some(Value::Number(n)) => n.is_i64() || n.is_u64(),
            Some(Value::Object(long)) if long.len() == 1 => long
                .get("$numberLong")
                .and_then(Value::as_str)
                .map_or(false, |millis| millis.parse::<i64>().is_ok()),
            _ => false,
        },
        _ => false,
    }
}
