//! Parameter value maps and JSON coercion helpers.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{SfError, SfResult};
use crate::ids::ParameterId;

/// Current value of each tunable parameter, keyed by parameter id.
pub type ParameterValues = BTreeMap<ParameterId, Value>;

/// Coarse JSON type tag, used in validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Read a value as `f64`, accepting numeric strings such as `"99"` or `" 3.5 "`.
pub fn coerce_number(what: &str, value: &Value) -> SfResult<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let number = number.ok_or_else(|| SfError::TypeMismatch {
        what: what.to_string(),
        expected: "number",
        found: ValueKind::of(value).as_str(),
    })?;

    if !number.is_finite() {
        return Err(SfError::NonFinite {
            what: what.to_string(),
        });
    }
    Ok(number)
}

/// Read a value as `bool`, accepting `"true"`/`"false"` strings.
pub fn coerce_bool(what: &str, value: &Value) -> SfResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(SfError::TypeMismatch {
            what: what.to_string(),
            expected: "bool",
            found: ValueKind::of(other).as_str(),
        }),
    }
}

/// Build a JSON number, rejecting NaN and infinities.
pub fn number_value(what: &str, number: f64) -> SfResult<Value> {
    serde_json::Number::from_f64(number)
        .map(Value::Number)
        .ok_or_else(|| SfError::NonFinite {
            what: what.to_string(),
        })
}
