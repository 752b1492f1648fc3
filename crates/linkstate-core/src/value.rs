//! Variable values
//!
//! A variable holds one nullable value. The payload is a tagged union rather
//! than a dynamically typed scalar; `Value::None` is the explicit null/unset
//! marker and is distinct from an empty key list.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::Key;

/// Payload of a named variable.
#[derive(Clone)]
pub enum Value {
    /// Null / unset marker.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A list of row keys (filter results, selections).
    Keys(Vec<Key>),
    /// Host-defined payload, compared by pointer identity.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap a host-defined payload.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Value {
        Value::Opaque(Arc::new(value))
    }

    /// `Some(keys)` becomes `Value::Keys`, `None` becomes the null marker.
    pub fn from_keys(keys: Option<Vec<Key>>) -> Value {
        match keys {
            Some(keys) => Value::Keys(keys),
            None => Value::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Borrow the key list, if this value holds one.
    pub fn as_keys(&self) -> Option<&[Key]> {
        match self {
            Value::Keys(keys) => Some(keys.as_slice()),
            _ => None,
        }
    }

    /// Clone the key list out, if this value holds one.
    pub fn into_keys(self) -> Option<Vec<Key>> {
        match self {
            Value::Keys(keys) => Some(keys),
            _ => None,
        }
    }

    /// Downcast an opaque payload to a concrete shared type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Value::Opaque(any) => Arc::clone(any).downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Keys(a), Value::Keys(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Keys(keys) => f.debug_tuple("Keys").field(keys).finish(),
            Value::Opaque(_) => f.write_str("Opaque(..)"),
        }
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
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Key>> for Value {
    fn from(keys: Vec<Key>) -> Self {
        Value::Keys(keys)
    }
}
