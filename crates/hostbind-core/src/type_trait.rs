//! The capability-extension catalogue.
//!
//! Each [`TypeTrait`] is one descriptor mutator. A class builder collects an
//! ordered list of them and applies them left to right to its
//! [`TypeInitDescriptor`] before handing it to the registry. Enums accept the
//! narrower [`EnumTrait`] catalogue, so a trait that makes no sense for an
//! enum (a base, a supplement, ...) is rejected by the compiler:
//!
//! ```compile_fail
//! use hostbind_core::{EnumTrait, TypeTrait};
//!
//! let _: EnumTrait = TypeTrait::Final;
//! ```

use std::fmt;

use crate::descriptor::{SetSelfFn, SetWeakFn};
use crate::{
    EnumTypeInitDescriptor, Handle, InitFlags, IntrusiveCounted, SlotsCallback, SupplementSpec,
    TypeFlags, TypeInitDescriptor, TypeSlot, WeakReferenceable,
};

/// A descriptor mutator for class registration.
#[derive(Clone)]
pub enum TypeTrait {
    /// Derive from an already registered type given by handle.
    BaseHandle(Handle),
    /// Attach a docstring.
    Doc(String),
    /// Attach a fixed slot table.
    Slots(Vec<TypeSlot>),
    /// Attach a slot callback.
    SlotsCallback(SlotsCallback),
    /// Notify the payload of its owning handle.
    Intrusive(SetSelfFn),
    /// Notify the payload of its weak-reference slot.
    WeakRef(SetWeakFn),
    /// Forbid subclassing.
    Final,
    /// Give instances a dynamic attribute dictionary.
    DynamicAttr,
    /// Reserve a supplement region. Implies `Final`.
    Supplement(SupplementSpec),
}

impl TypeTrait {
    pub fn doc(doc: impl Into<String>) -> Self {
        TypeTrait::Doc(doc.into())
    }

    /// Intrusive ownership tracking through [`IntrusiveCounted`].
    pub fn intrusive<T: IntrusiveCounted>() -> Self {
        TypeTrait::Intrusive(set_self_handle::<T>)
    }

    /// Weak-reference slot tracking through [`WeakReferenceable`].
    pub fn weak_ref<T: WeakReferenceable>() -> Self {
        TypeTrait::WeakRef(set_weak_handle::<T>)
    }

    /// Reserve a plain-data supplement region of type `S`.
    ///
    /// `S` must be `Copy` and aligned no stricter than a pointer:
    ///
    /// ```compile_fail
    /// use hostbind_core::TypeTrait;
    ///
    /// #[derive(Clone, Copy, Default)]
    /// #[repr(align(64))]
    /// struct Wide(u8);
    ///
    /// let _ = TypeTrait::supplement::<Wide>();
    /// ```
    pub fn supplement<S: Copy + Default + 'static>() -> Self {
        const {
            assert!(
                align_of::<S>() <= align_of::<*const ()>(),
                "supplement alignment exceeds pointer alignment"
            );
        }
        TypeTrait::Supplement(SupplementSpec::with_default::<S>())
    }

    /// Apply this mutator to a descriptor.
    pub fn apply(self, init: &mut TypeInitDescriptor) {
        match self {
            TypeTrait::BaseHandle(handle) => {
                init.base_handle = Some(handle);
                init.init_flags |= InitFlags::HAS_BASE_HANDLE;
            }
            TypeTrait::Doc(doc) => apply_doc(init, doc),
            TypeTrait::Slots(slots) => apply_slots(init, slots),
            TypeTrait::SlotsCallback(callback) => {
                if !init.init_flags.contains(InitFlags::HAS_TYPE_SLOTS) {
                    init.init_flags |= InitFlags::HAS_TYPE_SLOTS;
                    init.type_slots = None;
                }
                init.type_slots_callback = Some(callback);
            }
            TypeTrait::Intrusive(set_self) => {
                init.flags |= TypeFlags::INTRUSIVE;
                init.set_self = Some(set_self);
            }
            TypeTrait::WeakRef(set_weak) => {
                init.flags |= TypeFlags::WEAK_REFERENCEABLE;
                init.set_weak = Some(set_weak);
            }
            TypeTrait::Final => init.flags |= TypeFlags::IS_FINAL,
            TypeTrait::DynamicAttr => init.flags |= TypeFlags::HAS_DYNAMIC_ATTR,
            TypeTrait::Supplement(spec) => {
                init.supplement = Some(spec);
                init.init_flags |= InitFlags::HAS_SUPPLEMENT;
                init.flags |= TypeFlags::IS_FINAL;
            }
        }
    }
}

impl fmt::Debug for TypeTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTrait::BaseHandle(h) => f.debug_tuple("BaseHandle").field(h).finish(),
            TypeTrait::Doc(d) => f.debug_tuple("Doc").field(d).finish(),
            TypeTrait::Slots(s) => f.debug_tuple("Slots").field(&s.len()).finish(),
            TypeTrait::SlotsCallback(_) => f.write_str("SlotsCallback"),
            TypeTrait::Intrusive(_) => f.write_str("Intrusive"),
            TypeTrait::WeakRef(_) => f.write_str("WeakRef"),
            TypeTrait::Final => f.write_str("Final"),
            TypeTrait::DynamicAttr => f.write_str("DynamicAttr"),
            TypeTrait::Supplement(s) => f.debug_tuple("Supplement").field(s).finish(),
        }
    }
}

/// A descriptor mutator for enum registration.
#[derive(Clone, Debug)]
pub enum EnumTrait {
    /// Attach a docstring.
    Doc(String),
    /// Attach extra slots next to the enum's own.
    Slots(Vec<TypeSlot>),
    /// Give entries a dynamic attribute dictionary.
    DynamicAttr,
    /// Install integer arithmetic slots.
    Arithmetic,
}

impl EnumTrait {
    pub fn doc(doc: impl Into<String>) -> Self {
        EnumTrait::Doc(doc.into())
    }

    /// Apply this mutator to an enum descriptor.
    pub fn apply(self, init: &mut EnumTypeInitDescriptor) {
        match self {
            EnumTrait::Doc(doc) => apply_doc(init, doc),
            // The enum's slot callback stays active; fixed slots are added
            // in front of what it appends.
            EnumTrait::Slots(slots) => {
                init.init_flags |= InitFlags::HAS_TYPE_SLOTS;
                init.type_slots = Some(slots);
            }
            EnumTrait::DynamicAttr => init.flags |= TypeFlags::HAS_DYNAMIC_ATTR,
            EnumTrait::Arithmetic => init.is_arithmetic = true,
        }
    }
}

impl From<TypeSlot> for TypeTrait {
    fn from(slot: TypeSlot) -> Self {
        TypeTrait::Slots(vec![slot])
    }
}

fn apply_doc(init: &mut TypeInitDescriptor, doc: String) {
    init.doc = Some(doc);
    init.init_flags |= InitFlags::HAS_DOC;
}

fn apply_slots(init: &mut TypeInitDescriptor, slots: Vec<TypeSlot>) {
    if !init.init_flags.contains(InitFlags::HAS_TYPE_SLOTS) {
        init.init_flags |= InitFlags::HAS_TYPE_SLOTS;
        init.type_slots_callback = None;
    }
    init.type_slots = Some(slots);
}

/// # Safety
///
/// `ptr` must point to a valid `T`.
unsafe fn set_self_handle<T: IntrusiveCounted>(ptr: *mut u8, handle: Handle) {
    unsafe { (*ptr.cast::<T>()).set_self_handle(handle) }
}

/// # Safety
///
/// `ptr` must point to a valid `T`.
unsafe fn set_weak_handle<T: WeakReferenceable>(ptr: *mut u8, handle: Handle) {
    unsafe { (*ptr.cast::<T>()).set_weak_handle(handle) }
}
