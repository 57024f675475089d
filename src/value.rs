// ABOUTME: The runtime value algebra and its canonical string form

use std::fmt;

use crate::ast::Type;

/// `num` is a single type whose runtime representation is either an
/// integer or a float; arithmetic promotes to float whenever either
/// operand is float (see the numeric-semantics design decision).
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Nothing,
    /// Elements are untyped: any slot may hold any `Value`, including
    /// another array.
    Array(Vec<Value>),
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Int(_) | Value::Float(_) => Type::Num,
            Value::Bool(_) => Type::Bool,
            Value::Str(_) => Type::Str,
            Value::Nothing => Type::Nil,
            Value::Array(_) => Type::Arr,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    /// The canonical string form used by both string concatenation
    /// (`+`) and `say`: numbers as their decimal literal, booleans as
    /// `true`/`false`, `nothing` literally, arrays recursively as
    /// `[e1, e2, ...]`.
    pub fn canonical_string(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.clone(),
            Value::Nothing => "nothing".to_string(),
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(Value::canonical_string).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Nothing, Value::Nothing) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_canonical_string() {
        assert_eq!(Value::Int(42).canonical_string(), "42");
    }

    #[test]
    fn test_bool_canonical_string() {
        assert_eq!(Value::Bool(true).canonical_string(), "true");
        assert_eq!(Value::Bool(false).canonical_string(), "false");
    }

    #[test]
    fn test_nothing_canonical_string() {
        assert_eq!(Value::Nothing.canonical_string(), "nothing");
    }

    #[test]
    fn test_array_canonical_string_recurses() {
        let arr = Value::Array(vec![Value::Int(1), Value::Array(vec![Value::Bool(true)])]);
        assert_eq!(arr.canonical_string(), "[1, [true]]");
    }

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Int(1).type_of(), Type::Num);
        assert_eq!(Value::Float(1.0).type_of(), Type::Num);
        assert_eq!(Value::Nothing.type_of(), Type::Nil);
    }

    #[test]
    fn test_int_float_equality_is_numeric() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
    }
}
