//! Conversion of resolved JSON values to the types callers ask for.
//!
//! | Target            | Accepts                                              |
//! |-------------------|------------------------------------------------------|
//! | `String`          | any scalar, strings as-is, others as JSON text       |
//! | `bool`            | booleans, permissive strings, numbers (zero = false) |
//! | `i64`             | integers, floats truncated toward zero, decimal text |
//! | `f64`             | numbers, decimal text                                |
//! | `Vec<String>`     | arrays, each element in textual form                 |
//! | `Map`             | objects                                              |
//!
//! Integers are kept exactly as decoded, so `i64` lookups of large integers
//! do not lose precision. Reading such a value as `f64` rounds it to the
//! nearest representable float (above 2^53 not every integer is
//! representable), and floats outside the `i64` range fail to convert.
//! Floats are decoded with correct rounding (serde_json `float_roundtrip`),
//! so a float literal always maps to the nearest representable value.

use crate::errors::FlagError;
use serde_json::{Map, Number, Value};

/// A type a resolved flag value can be converted to.
pub trait FromFlagValue: Sized {
    /// Name of the target type, used in coercion errors.
    const TARGET: &'static str;

    fn from_flag_value(value: Value) -> Result<Self, FlagError>;
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch<T: FromFlagValue>(value: &Value) -> FlagError {
    FlagError::Coercion {
        target: T::TARGET,
        found: kind_of(value),
    }
}

impl FromFlagValue for Value {
    const TARGET: &'static str = "json";

    fn from_flag_value(value: Value) -> Result<Self, FlagError> {
        Ok(value)
    }
}

impl FromFlagValue for String {
    const TARGET: &'static str = "string";

    fn from_flag_value(value: Value) -> Result<Self, FlagError> {
        match value {
            Value::Array(_) | Value::Object(_) => Err(mismatch::<Self>(&value)),
            scalar => Ok(canonical_string(scalar)),
        }
    }
}

impl FromFlagValue for bool {
    const TARGET: &'static str = "bool";

    fn from_flag_value(value: Value) -> Result<Self, FlagError> {
        match &value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => parse_bool(s).ok_or_else(|| mismatch::<Self>(&value)),
            Value::Number(n) => Ok(!is_zero(n)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn is_zero(n: &Number) -> bool {
    if let Some(i) = n.as_i64() {
        i == 0
    } else if let Some(u) = n.as_u64() {
        u == 0
    } else {
        n.as_f64() == Some(0.0)
    }
}

impl FromFlagValue for i64 {
    const TARGET: &'static str = "int";

    fn from_flag_value(value: Value) -> Result<Self, FlagError> {
        let converted = match &value {
            Value::Number(n) => number_to_i64(n),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        };
        converted.ok_or_else(|| mismatch::<Self>(&value))
    }
}

fn number_to_i64(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    // Integers above i64::MAX
    if n.is_u64() {
        return None;
    }

    let f = n.as_f64()?.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl FromFlagValue for f64 {
    const TARGET: &'static str = "float";

    fn from_flag_value(value: Value) -> Result<Self, FlagError> {
        let converted = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        };
        converted.ok_or_else(|| mismatch::<Self>(&value))
    }
}

impl FromFlagValue for Vec<String> {
    const TARGET: &'static str = "string list";

    fn from_flag_value(value: Value) -> Result<Self, FlagError> {
        match value {
            Value::Array(items) => Ok(items.into_iter().map(canonical_string).collect()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// Strings as-is, everything else as JSON text.
fn canonical_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl FromFlagValue for Map<String, Value> {
    const TARGET: &'static str = "map";

    fn from_flag_value(value: Value) -> Result<Self, FlagError> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}
