//! Host object kinds stored on the heap.

use std::any::Any;
use std::ptr::NonNull;

use rustc_hash::FxHashMap;

use super::KeepAlive;
use super::storage::Storage;
use crate::{Handle, NativeFn, TypeDescriptor, Value};

/// Attribute table. Every `Value::Object` stored here owns one reference.
pub(crate) type Attrs = FxHashMap<String, Value>;

pub(crate) enum HostObject {
    Scope(ScopeObject),
    Type(Box<TypeObject>),
    Instance(InstanceObject),
    Function(FunctionObject),
    Property(PropertyObject),
}

impl HostObject {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            HostObject::Scope(_) => "scope",
            HostObject::Type(_) => "type",
            HostObject::Instance(_) => "instance",
            HostObject::Function(_) => "function",
            HostObject::Property(_) => "property",
        }
    }

    pub(crate) fn attrs(&self) -> Option<&Attrs> {
        match self {
            HostObject::Scope(s) => Some(&s.attrs),
            HostObject::Type(t) => Some(&t.attrs),
            HostObject::Instance(i) => i.dict.as_ref(),
            HostObject::Function(_) | HostObject::Property(_) => None,
        }
    }

    pub(crate) fn attrs_mut(&mut self) -> Option<&mut Attrs> {
        match self {
            HostObject::Scope(s) => Some(&mut s.attrs),
            HostObject::Type(t) => Some(&mut t.attrs),
            HostObject::Instance(i) => i.dict.as_mut(),
            HostObject::Function(_) | HostObject::Property(_) => None,
        }
    }
}

/// A module-like namespace.
pub(crate) struct ScopeObject {
    pub(crate) name: String,
    pub(crate) attrs: Attrs,
}

impl ScopeObject {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            attrs: Attrs::default(),
        }
    }
}

/// A bound type.
pub(crate) struct TypeObject {
    pub(crate) descriptor: TypeDescriptor,
    /// Enclosing scope. Not owned: the scope owns the type.
    pub(crate) scope: Handle,
    /// Base type. Owned.
    pub(crate) base: Option<Handle>,
    pub(crate) attrs: Attrs,
    pub(crate) doc: Option<String>,
    pub(crate) supplement: Option<Box<dyn Any>>,
    /// Host-derived subclasses. Not owned.
    pub(crate) subclasses: Vec<Handle>,
}

/// An instance of a bound type.
pub(crate) struct InstanceObject {
    /// The instance's type. Owned unless `owns_type` is false.
    pub(crate) ty: Handle,
    /// Enum entries are held by their type and do not hold it back.
    pub(crate) owns_type: bool,
    pub(crate) payload: NonNull<u8>,
    pub(crate) storage: Storage,
    /// The payload holds a constructed value.
    pub(crate) ready: bool,
    /// The instance owns the payload and destructs it at teardown.
    pub(crate) destruct: bool,
    /// The payload holds the class's alias type rather than the bound type.
    pub(crate) alias: bool,
    /// Keeps the owner of a borrowed payload alive. Owned, never destructed
    /// through this instance.
    pub(crate) parent: Option<Handle>,
    pub(crate) keep_alive: Vec<KeepAlive>,
    pub(crate) dict: Option<Attrs>,
}

/// A named callable with ordered overloads.
pub(crate) struct FunctionObject {
    pub(crate) name: String,
    /// Receives the instance as first argument when called through one.
    pub(crate) is_method: bool,
    pub(crate) overloads: Vec<NativeFn>,
}

/// A computed attribute.
pub(crate) struct PropertyObject {
    pub(crate) name: String,
    pub(crate) getter: Option<NativeFn>,
    pub(crate) setter: Option<NativeFn>,
    /// Reached through the type rather than an instance.
    pub(crate) is_static: bool,
}

/// Handles owned by an attribute table.
pub(crate) fn owned_handles(attrs: Attrs) -> impl Iterator<Item = Handle> {
    attrs.into_values().filter_map(|v| v.as_handle())
}
