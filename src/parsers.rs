//! Set/get parser functions.
//!
//! A parser converts between representations on one side of the value
//! pipeline. The built-in conversions mirror what lab code usually needs:
//! coercing user input to the integer or float the device expects, or turning
//! a device reply back into a string or boolean.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Shared parser function.
pub type Parser = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Names of the built-in parsers, usable from configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// See [`int`].
    Int,
    /// See [`float`].
    Float,
    /// See [`string`].
    String,
    /// See [`boolean`].
    Bool,
}

impl ParserKind {
    /// The parser function for this kind.
    pub fn parser(self) -> Parser {
        match self {
            ParserKind::Int => Arc::new(int),
            ParserKind::Float => Arc::new(float),
            ParserKind::String => Arc::new(string),
            ParserKind::Bool => Arc::new(boolean),
        }
    }
}

/// Integer conversion.
///
/// Integers pass through, floats are truncated toward zero, booleans become
/// `0`/`1` and numeric strings are parsed (an integral float string such as
/// `"42.0"` is accepted too).
pub fn int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else {
                float_to_int(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::from(i));
            }
            match trimmed.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 => float_to_int(f),
                _ => Err(format!("invalid literal for int: {:?}", s)),
            }
        }
        other => Err(format!("cannot convert {} to int", other)),
    }
}

/// Float conversion.
pub fn float(value: &Value) -> Result<Value, String> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
        .ok_or_else(|| format!("cannot convert {} to float", value))
}

/// String conversion. Strings pass through unchanged, everything else is
/// rendered in its JSON form.
pub fn string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value.clone()),
        other => Ok(Value::String(other.to_string())),
    }
}

/// Boolean conversion.
///
/// Accepts booleans, the numbers `0`/`1` and the strings `"true"`, `"false"`,
/// `"on"`, `"off"`, `"1"`, `"0"` (case insensitive).
pub fn boolean(value: &Value) -> Result<Value, String> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Some(false),
            Some(f) if f == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "on" | "1" => Some(true),
            "false" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(Value::Bool)
        .ok_or_else(|| format!("cannot convert {} to bool", value))
}

fn float_to_int(f: f64) -> Result<Value, String> {
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Ok(Value::from(f.trunc() as i64))
    } else {
        Err(format!("cannot convert {} to int", f))
    }
}
