/*!
Attribute values.

Actors, cells and the model itself carry free-form attributes. They are
stored as a small closed set of scalar values, so that they can be compared
in selections, turned into numeric arrays for reporting, and written to the
state file.
 */

use rustc_hash::FxHashMap;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Named attributes of one entity.
pub type Attributes = FxHashMap<String, Value>;

impl Value {
    /// Numeric view of the value. Booleans count as 0 and 1, text and null
    /// have no numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1. } else { 0. }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Null | Value::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0. => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /**
    Truthiness as used by selections: `false`, zero, NaN, the empty string
    and null are false, everything else is true.

    ```rust
    # use abses::value::Value;
    assert!(Value::Int(3).truthy());
    assert!(!Value::Float(f64::NAN).truthy());
    assert!(!Value::Text(String::new()).truthy());
    ```
     */
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0. && !f.is_nan(),
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// Loose equality used when matching selections: equal values, equal
    /// numbers of different representation, or equal string forms.
    pub fn matches(&self, other: &Value) -> bool {
        if self == other {
            return true;
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            if a == b {
                return true;
            }
        }
        self.to_string() == other.to_string()
    }

    /// Convert a JSON setting into an attribute value. Arrays and objects
    /// are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::from(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

/// Integers beyond `i64::MAX` become floats rather than wrap around.
impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::from(i as u64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_across_representations() {
        assert!(Value::Int(1).matches(&Value::Float(1.)));
        assert!(Value::Int(1).matches(&Value::Text("1".into())));
        assert!(Value::Bool(true).matches(&Value::Text("True".into())));
        assert!(!Value::Int(1).matches(&Value::Int(2)));
    }

    #[test]
    fn test_from_json() {
        let v = serde_json::json!({"a": 1, "b": 0.5, "c": "x", "d": [1, 2]});
        assert_eq!(Value::from_json(&v["a"]), Value::Int(1));
        assert_eq!(Value::from_json(&v["b"]), Value::Float(0.5));
        assert_eq!(Value::from_json(&v["c"]), Value::Text("x".into()));
        assert_eq!(Value::from_json(&v["d"]), Value::Text("[1,2]".into()));
        assert_eq!(Value::from_json(&v["missing"]), Value::Null);
    }

    #[test]
    fn test_large_unsigned_stay_positive() {
        assert_eq!(Value::from(7u64), Value::Int(7));
        assert_eq!(Value::from(i64::MAX as u64), Value::Int(i64::MAX));
        let big = Value::from(u64::MAX);
        assert_eq!(big, Value::Float(u64::MAX as f64));
        assert!(big.as_f64().unwrap() > 0.);
    }
}
