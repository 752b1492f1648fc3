//! Row keys
//!
//! A key identifies one logical data row and is used to correlate filter and
//! selection state across independent consumers. Keys are opaque scalars with
//! a strict total order: integers sort numerically and before all strings,
//! strings sort lexicographically (case sensitive).

use std::fmt;

/// Opaque row key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// String form of the key, if it is a string key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s.as_str()),
            Key::Int(_) => None,
        }
    }

    /// Integer form of the key, if it is an integer key.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(n) => Some(*n),
            Key::Str(_) => None,
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "Key({n})"),
            Key::Str(s) => write!(f, "Key({s:?})"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

/// Convert a slice of key-like values into owned keys.
pub fn keys<T: Into<Key> + Clone>(items: &[T]) -> Vec<Key> {
    items.iter().cloned().map(Into::into).collect()
}
