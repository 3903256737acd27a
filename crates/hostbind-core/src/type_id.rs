//! Native type identity.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a native Rust type.
///
/// Wraps [`TypeId`] together with the type's name for diagnostics. Equality
/// and hashing only look at the `TypeId`.
#[derive(Clone, Copy)]
pub struct NativeTypeId {
    id: TypeId,
    name: &'static str,
}

impl NativeTypeId {
    /// Identity of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name, as reported by `std::any::type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this identity is that of `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for NativeTypeId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NativeTypeId {}

impl Hash for NativeTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for NativeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeTypeId({})", self.name)
    }
}

impl fmt::Display for NativeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    struct Marker;

    #[test]
    fn identity_is_per_type() {
        assert_eq!(NativeTypeId::of::<Marker>(), NativeTypeId::of::<Marker>());
        assert_ne!(NativeTypeId::of::<Marker>(), NativeTypeId::of::<u32>());
        assert!(NativeTypeId::of::<u32>().is::<u32>());
    }

    #[test]
    fn hashes_by_type_id() {
        let mut set = FxHashSet::default();
        set.insert(NativeTypeId::of::<Marker>());
        set.insert(NativeTypeId::of::<Marker>());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn display_uses_type_name() {
        let id = NativeTypeId::of::<u64>();
        assert_eq!(id.to_string(), "u64");
        assert_eq!(format!("{id:?}"), "NativeTypeId(u64)");
    }
}
