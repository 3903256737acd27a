//! Descriptor flag sets.
//!
//! [`TypeFlags`] live on the permanent [`TypeDescriptor`](crate::TypeDescriptor)
//! for the lifetime of the type. [`InitFlags`] only exist on the transient
//! [`TypeInitDescriptor`](crate::TypeInitDescriptor) and describe which of its
//! optional registration fields are populated.

use bitflags::bitflags;

bitflags! {
    /// Persistent per-type behaviour flags.
    ///
    /// `HAS_DESTRUCT`, `HAS_COPY` and `HAS_MOVE` are set exactly when the
    /// matching hook is present on the descriptor. A capability flag
    /// without its `HAS_*` partner means the operation is trivial and is
    /// carried out as a raw memory operation.
    ///
    /// ```rust
    /// use hostbind_core::TypeFlags;
    ///
    /// // Plain data: every operation is a byte copy.
    /// let pod = TypeFlags::DESTRUCTIBLE
    ///     | TypeFlags::COPY_CONSTRUCTIBLE
    ///     | TypeFlags::MOVE_CONSTRUCTIBLE;
    /// assert!(!pod.intersects(TypeFlags::HAS_DESTRUCT | TypeFlags::HAS_COPY));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// The payload may be destroyed.
        const DESTRUCTIBLE = 1 << 0;
        /// The payload may be copy-constructed.
        const COPY_CONSTRUCTIBLE = 1 << 1;
        /// The payload may be move-constructed.
        const MOVE_CONSTRUCTIBLE = 1 << 2;
        /// A non-trivial destruct hook is present.
        const HAS_DESTRUCT = 1 << 3;
        /// A non-trivial copy hook is present.
        const HAS_COPY = 1 << 4;
        /// A non-trivial move hook is present.
        const HAS_MOVE = 1 << 5;
        /// Implicit conversions into this type have been registered.
        const HAS_IMPLICIT_CONVERSIONS = 1 << 6;
        /// The type is a host-language subclass of a bound type.
        const IS_HOST_DERIVED = 1 << 7;
        /// The type cannot be subclassed.
        const IS_FINAL = 1 << 8;
        /// Instances carry a dictionary for dynamic attributes.
        const HAS_DYNAMIC_ATTR = 1 << 9;
        /// The native value tracks its own owning handle.
        const INTRUSIVE = 1 << 10;
        /// The native value holds a weak reference to its shared owner.
        const SHARED_FROM_THIS = 1 << 11;
        /// The native value records a weak-reference slot.
        const WEAK_REFERENCEABLE = 1 << 12;
    }
}

bitflags! {
    /// Registration-only flags describing which optional fields of a
    /// [`TypeInitDescriptor`](crate::TypeInitDescriptor) are populated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InitFlags: u32 {
        /// A supplement region is reserved.
        const HAS_SUPPLEMENT = 1 << 0;
        /// A docstring is attached.
        const HAS_DOC = 1 << 1;
        /// A base type is given by native identity.
        const HAS_BASE = 1 << 2;
        /// A base type is given by host type handle.
        const HAS_BASE_HANDLE = 1 << 3;
        /// A slot table or slot callback is attached.
        const HAS_TYPE_SLOTS = 1 << 4;
    }
}

impl TypeFlags {
    /// The flags every destructible, relocatable plain-data type carries.
    pub const TRIVIAL: Self = Self::DESTRUCTIBLE
        .union(Self::COPY_CONSTRUCTIBLE)
        .union(Self::MOVE_CONSTRUCTIBLE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistent_and_init_flags_are_independent() {
        // Both sets start at bit zero; they never share storage.
        assert_eq!(TypeFlags::DESTRUCTIBLE.bits(), InitFlags::HAS_SUPPLEMENT.bits());
        assert_eq!(TypeFlags::default(), TypeFlags::empty());
        assert_eq!(InitFlags::default(), InitFlags::empty());
    }

    #[test]
    fn trivial_has_no_hook_flags() {
        let trivial = TypeFlags::TRIVIAL;
        assert!(trivial.contains(TypeFlags::COPY_CONSTRUCTIBLE));
        assert!(!trivial.intersects(TypeFlags::HAS_DESTRUCT | TypeFlags::HAS_COPY | TypeFlags::HAS_MOVE));
    }
}
