//! Host values and object handles.

use std::fmt;

/// Handle to a host object.
///
/// Handles are generational: once the object is torn down its slot may be
/// reused, but the old handle stays detectably stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    /// Index into the object heap.
    pub index: u32,
    /// Generation for use-after-free detection.
    pub generation: u32,
}

impl Handle {
    /// Create a new handle.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A dynamically typed host value.
///
/// `Value::Object` does not own a reference by itself. The runtime's calling
/// convention decides ownership: arguments passed to a call are borrowed,
/// values returned from a call or attribute lookup carry a new reference the
/// caller must release with [`HostRuntime::decref`](crate::HostRuntime::decref).
/// Cloning a `Value` never touches reference counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// The absent value.
    #[default]
    None,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    Str(String),
    /// A heap object.
    Object(Handle),
}

impl Value {
    /// Short name of the value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Object(_) => "object",
        }
    }

    /// The handle, if this is an object.
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Value::Object(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Value::Object(handle)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(Value::None.kind_name(), "none");
        assert_eq!(Value::from(3i64).kind_name(), "int");
        assert_eq!(Value::from("x").kind_name(), "str");
        assert_eq!(Value::from(Handle::new(1, 0)).kind_name(), "object");
    }

    #[test]
    fn accessors() {
        let h = Handle::new(4, 2);
        assert_eq!(Value::Object(h).as_handle(), Some(h));
        assert_eq!(Value::Int(7).as_handle(), None);
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert!(Value::default().is_none());
        assert_eq!(h.to_string(), "#4.2");
    }
}
