//! The value lattice that may cross the sandbox boundary.
//!
//! Every argument a sandboxed script passes to a host tool, and every value a
//! host tool returns into the script, is converted through [`Value`]. The
//! lattice is deliberately closed: anything outside it (functions, userdata,
//! open handles) fails conversion with a [`MarshalError`] instead of leaking
//! a host or interpreter object across the boundary.

use std::fmt;

/// Maximum nesting depth accepted when marshalling values in either
/// direction. Cyclic structures are undefined behaviour for the boundary;
/// the depth guard turns them into a clean error instead of exhausting the
/// host stack.
pub const MAX_MARSHAL_DEPTH: usize = 32;

/// An owned value crossing the sandbox boundary.
///
/// Strings are byte strings: UTF-8 is expected but never validated, so
/// whatever bytes the script produced round-trip unchanged. `Map` preserves
/// insertion order on the host side; enumeration order of mappings coming
/// out of the interpreter follows its table iteration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Build a string value from UTF-8 text.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into().into_bytes())
    }

    /// Build a string value from raw bytes.
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Value::Str(b.into())
    }

    /// The string payload, if this is a valid-UTF-8 string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
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
        Value::Str(s.into_bytes())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{}", crate::interp::format_float(*n)),
            Value::Str(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Conversion failure at the sandbox boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
    /// The value (or one of its children) is not part of the lattice.
    #[error("TypeError: unsupported type for sandbox: {0}")]
    UnsupportedType(String),

    /// Nesting deeper than [`MAX_MARSHAL_DEPTH`], usually a cyclic structure.
    #[error("value nesting exceeds the sandbox marshalling depth limit")]
    DepthExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_helpers() {
        let v = Value::str("hello");
        assert_eq!(v.as_str(), Some("hello"));
        assert_eq!(v.type_name(), "string");

        let raw = Value::bytes(vec![0xff, 0xfe]);
        assert_eq!(raw.as_str(), None);
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(0.5), Value::Float(0.5));
        assert_eq!(Value::from("x"), Value::Str(b"x".to_vec()));
        assert_eq!(
            Value::from(vec![Value::Int(1)]),
            Value::List(vec![Value::Int(1)])
        );
    }

    #[test]
    fn test_is_nil() {
        assert!(Value::Nil.is_nil());
        assert!(!Value::Int(0).is_nil());
    }

    #[test]
    fn test_display() {
        let v = Value::List(vec![Value::Int(1), Value::str("a"), Value::Nil]);
        assert_eq!(v.to_string(), "[1, a, nil]");

        let m = Value::Map(vec![(Value::str("k"), Value::Bool(false))]);
        assert_eq!(m.to_string(), "{k = false}");
    }

    #[test]
    fn test_unsupported_type_message() {
        let err = MarshalError::UnsupportedType("function".to_string());
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported type for sandbox: function"
        );
    }

    #[test]
    fn test_map_preserves_insertion_order() {
        let m = Value::Map(vec![
            (Value::str("z"), Value::Int(1)),
            (Value::str("a"), Value::Int(2)),
        ]);
        match m {
            Value::Map(entries) => {
                assert_eq!(entries[0].0, Value::str("z"));
                assert_eq!(entries[1].0, Value::str("a"));
            }
            _ => unreachable!(),
        }
    }
}
