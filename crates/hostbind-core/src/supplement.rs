//! Supplement regions: per-type storage reserved at registration.

use std::any::{Any, TypeId};
use std::fmt;

use crate::Handle;

/// Request to reserve a supplement region on a type.
///
/// The region is created from `init` when the type object is created and
/// lives as long as the type object. It is read back with
/// [`HostRuntime::type_supplement`](crate::HostRuntime::type_supplement).
#[derive(Clone, Copy)]
pub struct SupplementSpec {
    /// Size of the region's value in bytes.
    pub size: usize,
    /// Identity of the region's value type.
    pub type_id: TypeId,
    /// Creates the default-initialized region.
    pub init: fn() -> Box<dyn Any>,
}

impl SupplementSpec {
    /// A region holding a default-initialized `S`.
    pub(crate) fn with_default<S: Default + 'static>() -> Self {
        Self {
            size: size_of::<S>(),
            type_id: TypeId::of::<S>(),
            init: default_box::<S>,
        }
    }

    /// Whether the region holds an `S`.
    pub fn is<S: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<S>()
    }
}

fn default_box<S: Default + 'static>() -> Box<dyn Any> {
    Box::new(S::default())
}

impl fmt::Debug for SupplementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupplementSpec")
            .field("size", &self.size)
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

/// One registered enum value.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumEntry {
    pub name: String,
    /// The value widened to `i64`.
    pub value: i64,
    pub doc: Option<String>,
    /// The host instance representing the value. Owned by the type's
    /// attribute of the same name.
    pub object: Handle,
}

/// Supplement region of every enum type: the entry table.
#[derive(Debug, Default, Clone)]
pub struct EnumSupplement {
    pub is_signed: bool,
    /// Entries in declaration order.
    pub entries: Vec<EnumEntry>,
    /// Scope the enum was registered in; target of `export_values`.
    pub scope: Option<Handle>,
}

impl EnumSupplement {
    pub fn entry_by_name(&self, name: &str) -> Option<&EnumEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entry_by_value(&self, value: i64) -> Option<&EnumEntry> {
        self.entries.iter().find(|e| e.value == value)
    }
}
