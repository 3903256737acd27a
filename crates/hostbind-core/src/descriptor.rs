//! The type descriptor model.
//!
//! A [`TypeDescriptor`] is the permanent record of a bound native type,
//! owned by its host type object. A [`TypeInitDescriptor`] extends it with
//! registration-only fields; it is built by a class builder, mutated by the
//! trait catalogue, and consumed by value by
//! [`HostRuntime::create_type`](crate::HostRuntime::create_type).

use std::alloc::Layout;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::{Handle, HostRuntime, InitFlags, NativeFn, NativeTypeId, SupplementSpec, TypeFlags};

/// Drops the payload in place.
pub type DestructFn = unsafe fn(*mut u8);
/// Copy-constructs `src` into uninitialized `dst`.
pub type CopyFn = unsafe fn(*mut u8, *const u8);
/// Move-constructs `src` into uninitialized `dst`.
pub type MoveFn = unsafe fn(*mut u8, *mut u8);
/// Tells the payload which handle owns it.
pub type SetSelfFn = unsafe fn(*mut u8, Handle);
/// Tells the payload which handle tracks its weak references.
pub type SetWeakFn = unsafe fn(*mut u8, Handle);
/// Keeps a shared owner of the payload alive for the handle's lifetime.
/// Returns whether a shared owner was found.
pub type KeepSharedAliveFn = fn(&mut HostRuntime, Handle) -> bool;
/// Appends slots to a type's slot table during creation.
pub type SlotsCallback = Arc<dyn Fn(&TypeInitDescriptor, &mut Vec<TypeSlot>) + Send + Sync>;

/// Largest permitted payload size (exclusive).
pub const MAX_INSTANCE_SIZE: usize = 1 << 24;
/// Largest permitted payload alignment (exclusive).
pub const MAX_INSTANCE_ALIGN: usize = 1 << 8;

/// A special method installed on a type at creation.
#[derive(Clone, Debug)]
pub struct TypeSlot {
    /// Attribute name, e.g. `__repr__`.
    pub name: &'static str,
    /// The implementation. Receives the instance as its first argument.
    pub func: NativeFn,
}

impl TypeSlot {
    pub fn new(name: &'static str, func: NativeFn) -> Self {
        Self { name, func }
    }
}

/// Hooks for payloads built as the class's alias type.
///
/// The alias starts with the bound type but may add fields of its own, so
/// an instance holding an alias destructs and copies it through these
/// instead of the bound type's hooks.
#[derive(Clone, Copy, Debug, Default)]
pub struct AliasHooks {
    pub destruct: Option<DestructFn>,
    pub copy: Option<CopyFn>,
    /// Copies are allowed: through `copy` when set, bytewise otherwise.
    pub copyable: bool,
}

/// Permanent metadata for a bound native type.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    /// Payload size in bytes. Fits in 24 bits.
    pub size: u32,
    /// Payload alignment in bytes.
    pub align: u8,
    /// Behaviour flags.
    pub flags: TypeFlags,
    /// Host-visible name.
    pub name: String,
    /// Identity of the bound native type.
    pub native_type: NativeTypeId,
    pub destruct: Option<DestructFn>,
    pub copy: Option<CopyFn>,
    pub move_fn: Option<MoveFn>,
    pub set_self: Option<SetSelfFn>,
    pub keep_shared_alive: Option<KeepSharedAliveFn>,
    pub set_weak: Option<SetWeakFn>,
    /// Set when the class has an alias type distinct from the bound type.
    pub alias: Option<AliasHooks>,
}

impl TypeDescriptor {
    /// A descriptor with the layout of `L` and no flags or hooks.
    ///
    /// `L` is the payload type: the bound type itself, or its alias when one
    /// is given. Oversized or overaligned payloads fail to build:
    ///
    /// ```compile_fail
    /// use hostbind_core::{NativeTypeId, TypeDescriptor};
    ///
    /// #[repr(align(256))]
    /// struct Overaligned(u8);
    ///
    /// let _ = TypeDescriptor::for_layout::<Overaligned>("X", NativeTypeId::of::<Overaligned>());
    /// ```
    pub fn for_layout<L>(name: impl Into<String>, native_type: NativeTypeId) -> Self {
        const {
            assert!(size_of::<L>() < MAX_INSTANCE_SIZE, "instance size is too big");
            assert!(align_of::<L>() < MAX_INSTANCE_ALIGN, "instance alignment is too big");
        }
        Self {
            size: size_of::<L>() as u32,
            align: align_of::<L>() as u8,
            flags: TypeFlags::empty(),
            name: name.into(),
            native_type,
            destruct: None,
            copy: None,
            move_fn: None,
            set_self: None,
            keep_shared_alive: None,
            set_weak: None,
            alias: None,
        }
    }

    /// Memory layout of the payload.
    pub fn layout(&self) -> Layout {
        // Size and alignment were taken from a real Rust type.
        Layout::from_size_align(self.size as usize, self.align as usize)
            .unwrap_or_else(|_| Layout::new::<()>())
    }

    #[inline]
    pub fn has(&self, flags: TypeFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Destruct hook for a payload holding the alias (`alias`) or the
    /// bound type.
    pub fn destruct_for(&self, alias: bool) -> Option<DestructFn> {
        match (alias, &self.alias) {
            (true, Some(hooks)) => hooks.destruct,
            _ => self.destruct,
        }
    }

    /// How to copy such a payload: `None` when it cannot be copied,
    /// `Some(None)` for a byte copy.
    pub fn copy_for(&self, alias: bool) -> Option<Option<CopyFn>> {
        match (alias, &self.alias) {
            (true, Some(hooks)) => hooks.copyable.then_some(hooks.copy),
            _ => self.has(TypeFlags::COPY_CONSTRUCTIBLE).then_some(self.copy),
        }
    }
}

/// Registration-time extension of a [`TypeDescriptor`].
pub struct TypeInitDescriptor {
    /// The descriptor that becomes permanent.
    pub data: TypeDescriptor,
    /// Which optional fields below are populated.
    pub init_flags: InitFlags,
    /// Scope (or enclosing type) that receives the new type.
    pub scope: Handle,
    /// Base type by native identity.
    pub base: Option<NativeTypeId>,
    /// Base type by host handle.
    pub base_handle: Option<Handle>,
    pub doc: Option<String>,
    /// Fixed slot table.
    pub type_slots: Option<Vec<TypeSlot>>,
    /// Slot callback run at creation.
    pub type_slots_callback: Option<SlotsCallback>,
    /// Reserved supplement region.
    pub supplement: Option<SupplementSpec>,
}

impl TypeInitDescriptor {
    pub fn new(data: TypeDescriptor, scope: Handle) -> Self {
        Self {
            data,
            init_flags: InitFlags::empty(),
            scope,
            base: None,
            base_handle: None,
            doc: None,
            type_slots: None,
            type_slots_callback: None,
            supplement: None,
        }
    }

    /// Record a base type by native identity.
    pub fn set_base(&mut self, base: NativeTypeId) {
        self.base = Some(base);
        self.init_flags |= InitFlags::HAS_BASE;
    }

    /// Collect the slot table: the fixed slots followed by whatever the
    /// callback appends.
    pub fn collect_slots(&self) -> Vec<TypeSlot> {
        let mut slots = self.type_slots.clone().unwrap_or_default();
        if let Some(callback) = &self.type_slots_callback {
            callback(self, &mut slots);
        }
        slots
    }

    /// Consume the descriptor, keeping the permanent part.
    pub fn into_data(self) -> TypeDescriptor {
        self.data
    }
}

impl Deref for TypeInitDescriptor {
    type Target = TypeDescriptor;

    fn deref(&self) -> &TypeDescriptor {
        &self.data
    }
}

impl DerefMut for TypeInitDescriptor {
    fn deref_mut(&mut self) -> &mut TypeDescriptor {
        &mut self.data
    }
}

impl fmt::Debug for TypeInitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInitDescriptor")
            .field("data", &self.data)
            .field("init_flags", &self.init_flags)
            .field("scope", &self.scope)
            .field("base", &self.base)
            .field("base_handle", &self.base_handle)
            .field("doc", &self.doc)
            .field("type_slots", &self.type_slots.as_ref().map(Vec::len))
            .field("type_slots_callback", &self.type_slots_callback.is_some())
            .field("supplement", &self.supplement)
            .finish()
    }
}

/// Registration-time descriptor for enums.
#[derive(Debug)]
pub struct EnumTypeInitDescriptor {
    pub type_init: TypeInitDescriptor,
    /// Whether the underlying integer representation is signed.
    pub is_signed: bool,
    /// Whether arithmetic slots are installed.
    pub is_arithmetic: bool,
}

impl EnumTypeInitDescriptor {
    pub fn into_type_init(self) -> TypeInitDescriptor {
        self.type_init
    }
}

impl Deref for EnumTypeInitDescriptor {
    type Target = TypeInitDescriptor;

    fn deref(&self) -> &TypeInitDescriptor {
        &self.type_init
    }
}

impl DerefMut for EnumTypeInitDescriptor {
    fn deref_mut(&mut self) -> &mut TypeInitDescriptor {
        &mut self.type_init
    }
}
