//! Dynamic value model for the DAW RPC boundary.
//!
//! The DAW exposes a dynamically-typed object tree; a property read can yield
//! a scalar, a list (`tracks`, `sends`, `clip_slots`), a structured map (some
//! color shapes), or a handle to another remote object (`mixer_device`, the
//! clip inside a slot). `RemoteValue` is the closed set of those shapes.
//!
//! Accessors are coercing where the DAW is known to be loose: numeric
//! properties arrive as either integers or floats depending on host version,
//! so `as_f64` accepts both.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::rpc::RemoteObject;

/// Shared handle to a remote object.
pub type ObjectRef = Arc<dyn RemoteObject>;

/// A value read from or written to a remote property.
#[derive(Clone, Default)]
pub enum RemoteValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RemoteValue>),
    Map(BTreeMap<String, RemoteValue>),
    Object(ObjectRef),
}

impl RemoteValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RemoteValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RemoteValue::Bool(b) => Some(*b),
            // Some hosts report toggles as 0/1.
            RemoteValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RemoteValue::Int(i) => Some(*i),
            RemoteValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RemoteValue::Float(f) => Some(*f),
            RemoteValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RemoteValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RemoteValue]> {
        match self {
            RemoteValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, RemoteValue>> {
        match self {
            RemoteValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            RemoteValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteValue::Null => "null",
            RemoteValue::Bool(_) => "bool",
            RemoteValue::Int(_) => "int",
            RemoteValue::Float(_) => "float",
            RemoteValue::Str(_) => "str",
            RemoteValue::List(_) => "list",
            RemoteValue::Map(_) => "map",
            RemoteValue::Object(_) => "object",
        }
    }
}

impl fmt::Debug for RemoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteValue::Null => write!(f, "Null"),
            RemoteValue::Bool(b) => write!(f, "Bool({})", b),
            RemoteValue::Int(i) => write!(f, "Int({})", i),
            RemoteValue::Float(v) => write!(f, "Float({})", v),
            RemoteValue::Str(s) => write!(f, "Str({:?})", s),
            RemoteValue::List(items) => f.debug_tuple("List").field(items).finish(),
            RemoteValue::Map(m) => f.debug_tuple("Map").field(m).finish(),
            RemoteValue::Object(o) => write!(f, "Object({})", o.id()),
        }
    }
}

impl PartialEq for RemoteValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RemoteValue::Null, RemoteValue::Null) => true,
            (RemoteValue::Bool(a), RemoteValue::Bool(b)) => a == b,
            (RemoteValue::Int(a), RemoteValue::Int(b)) => a == b,
            (RemoteValue::Float(a), RemoteValue::Float(b)) => a == b,
            (RemoteValue::Str(a), RemoteValue::Str(b)) => a == b,
            (RemoteValue::List(a), RemoteValue::List(b)) => a == b,
            (RemoteValue::Map(a), RemoteValue::Map(b)) => a == b,
            // Remote objects are identified by their stable id, not by pointer.
            (RemoteValue::Object(a), RemoteValue::Object(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl From<bool> for RemoteValue {
    fn from(b: bool) -> Self {
        RemoteValue::Bool(b)
    }
}

impl From<i64> for RemoteValue {
    fn from(i: i64) -> Self {
        RemoteValue::Int(i)
    }
}

impl From<f64> for RemoteValue {
    fn from(f: f64) -> Self {
        RemoteValue::Float(f)
    }
}

impl From<&str> for RemoteValue {
    fn from(s: &str) -> Self {
        RemoteValue::Str(s.to_string())
    }
}

impl From<String> for RemoteValue {
    fn from(s: String) -> Self {
        RemoteValue::Str(s)
    }
}

impl From<Vec<RemoteValue>> for RemoteValue {
    fn from(items: Vec<RemoteValue>) -> Self {
        RemoteValue::List(items)
    }
}

impl From<ObjectRef> for RemoteValue {
    fn from(o: ObjectRef) -> Self {
        RemoteValue::Object(o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(RemoteValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(RemoteValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(RemoteValue::Float(2.9).as_i64(), Some(2));
        assert_eq!(RemoteValue::Str("3".into()).as_f64(), None);
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(RemoteValue::Bool(true).as_bool(), Some(true));
        assert_eq!(RemoteValue::Int(1).as_bool(), Some(true));
        assert_eq!(RemoteValue::Int(0).as_bool(), Some(false));
        assert_eq!(RemoteValue::Null.as_bool(), None);
    }

    #[test]
    fn test_default_is_null() {
        assert!(RemoteValue::default().is_null());
    }
}
