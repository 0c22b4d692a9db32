//! Flat, top-level store keys.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::error::{value_type_name, Result, StoreError};

static NEXT_SYMBOL: AtomicUsize = AtomicUsize::new(0);

/// A unique key identity.
///
/// Two symbols are only equal if one is a clone of the other, regardless of
/// their descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: usize,
    description: Option<String>,
}

impl Symbol {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: Some(description.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A store key: either a string name or a [`Symbol`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Symbol(Symbol),
}

impl Key {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(name) => Some(name),
            Key::Symbol(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Symbol(symbol) => match symbol.description() {
                Some(description) => write!(f, "Symbol({description})"),
                None => f.write_str("Symbol()"),
            },
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}

impl From<&Symbol> for Key {
    fn from(symbol: &Symbol) -> Self {
        Key::Symbol(symbol.clone())
    }
}

/// Anything that may be used where a key is expected.
///
/// Conversion from a dynamic JSON value fails with
/// [`StoreError::InvalidKeyType`] unless the value is a string.
pub trait AsKey {
    fn to_key(&self) -> Result<Key>;
}

impl AsKey for Key {
    fn to_key(&self) -> Result<Key> {
        Ok(self.clone())
    }
}

impl AsKey for str {
    fn to_key(&self) -> Result<Key> {
        Ok(Key::from(self))
    }
}

impl AsKey for String {
    fn to_key(&self) -> Result<Key> {
        Ok(Key::Name(self.clone()))
    }
}

impl AsKey for Symbol {
    fn to_key(&self) -> Result<Key> {
        Ok(Key::Symbol(self.clone()))
    }
}

impl AsKey for Value {
    fn to_key(&self) -> Result<Key> {
        match self {
            Value::String(name) => Ok(Key::Name(name.clone())),
            other => Err(StoreError::InvalidKeyType {
                found: value_type_name(other),
            }),
        }
    }
}
