//! Capabilities of native types, collected once at registration.
//!
//! What a type can do becomes descriptor flags and hooks:
//!
//! | Capability | Trivial when | Hook |
//! |---|---|---|
//! | destruct | `!needs_drop::<T>()` | `drop_in_place::<T>` |
//! | copy | `T: Copy` | `Clone::clone` |
//! | move | always (bitwise relocation) | none |
//!
//! A raw move leaves its source uninitialized, so the facade marks the
//! source instance not-ready after moving out of it.

use std::marker::PhantomData;
use std::ptr;

use crate::descriptor::{CopyFn, DestructFn, KeepSharedAliveFn};
use crate::runtime::KeepAlive;
use crate::{AliasHooks, Handle, HostRuntime, SharedFromThis, TypeDescriptor, TypeFlags};

#[derive(Clone, Copy)]
enum CopyCapability {
    None,
    Bitwise,
    Hook(CopyFn),
}

/// Capabilities of a native type `T`, collected once at registration.
///
/// ```rust
/// use hostbind_core::{Capabilities, TypeFlags};
///
/// #[derive(Clone, Copy)]
/// struct Point { x: i32, y: i32 }
///
/// let caps = Capabilities::<Point>::new().bitwise_copy();
/// assert!(caps.flags().contains(TypeFlags::COPY_CONSTRUCTIBLE));
/// assert!(!caps.flags().contains(TypeFlags::HAS_COPY));
/// ```
pub struct Capabilities<T> {
    copy: CopyCapability,
    keep_shared_alive: Option<KeepSharedAliveFn>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Capabilities<T> {
    /// Destructible and relocatable, not copyable.
    pub fn new() -> Self {
        Self {
            copy: CopyCapability::None,
            keep_shared_alive: None,
            _marker: PhantomData,
        }
    }

    /// Copies are plain byte copies.
    pub fn bitwise_copy(mut self) -> Self
    where
        T: Copy,
    {
        self.copy = CopyCapability::Bitwise;
        self
    }

    /// Copies go through `Clone::clone`.
    pub fn cloneable(mut self) -> Self
    where
        T: Clone,
    {
        self.copy = CopyCapability::Hook(wrap_copy::<T>);
        self
    }

    /// The value can produce a weak reference to its shared owner.
    pub fn shared_from_this(mut self) -> Self
    where
        T: SharedFromThis,
    {
        self.keep_shared_alive = Some(keep_shared_from_this_alive::<T>);
        self
    }

    /// The destruct hook, if destruction is non-trivial.
    pub fn destruct_hook(&self) -> Option<DestructFn> {
        if std::mem::needs_drop::<T>() {
            Some(wrap_destruct::<T>)
        } else {
            None
        }
    }

    /// Flags implied by these capabilities.
    pub fn flags(&self) -> TypeFlags {
        let mut flags = TypeFlags::DESTRUCTIBLE | TypeFlags::MOVE_CONSTRUCTIBLE;
        if self.destruct_hook().is_some() {
            flags |= TypeFlags::HAS_DESTRUCT;
        }
        match self.copy {
            CopyCapability::None => {}
            CopyCapability::Bitwise => flags |= TypeFlags::COPY_CONSTRUCTIBLE,
            CopyCapability::Hook(_) => flags |= TypeFlags::COPY_CONSTRUCTIBLE | TypeFlags::HAS_COPY,
        }
        if self.keep_shared_alive.is_some() {
            flags |= TypeFlags::SHARED_FROM_THIS;
        }
        flags
    }

    /// Write flags and hooks into a descriptor.
    pub fn apply(&self, descriptor: &mut TypeDescriptor) {
        descriptor.flags |= self.flags();
        descriptor.destruct = self.destruct_hook();
        descriptor.copy = match self.copy {
            CopyCapability::Hook(f) => Some(f),
            _ => None,
        };
        descriptor.move_fn = None;
        descriptor.keep_shared_alive = self.keep_shared_alive;
    }

    /// Hooks for payloads built as `T` when `T` is another class's alias.
    pub fn alias_hooks(&self) -> AliasHooks {
        AliasHooks {
            destruct: self.destruct_hook(),
            copy: match self.copy {
                CopyCapability::Hook(f) => Some(f),
                _ => None,
            },
            copyable: !matches!(self.copy, CopyCapability::None),
        }
    }
}

impl<T: 'static> Default for Capabilities<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop the `T` at `ptr` in place.
///
/// # Safety
///
/// `ptr` must point to a valid, initialized `T`.
unsafe fn wrap_destruct<T>(ptr: *mut u8) {
    unsafe { ptr::drop_in_place(ptr.cast::<T>()) }
}

/// Clone the `T` at `src` into the uninitialized storage at `dst`.
///
/// # Safety
///
/// `src` must point to a valid `T`; `dst` must be writable, aligned storage
/// for a `T` that does not overlap `src`.
unsafe fn wrap_copy<T: Clone>(dst: *mut u8, src: *const u8) {
    unsafe {
        let value = (*src.cast::<T>()).clone();
        ptr::write(dst.cast::<T>(), value);
    }
}

/// Upgrade the instance's weak self-reference and keep the resulting `Arc`
/// alive for as long as the host object lives.
fn keep_shared_from_this_alive<T: SharedFromThis>(rt: &mut HostRuntime, handle: Handle) -> bool {
    let Ok(payload) = rt.inst_ptr(handle) else {
        return false;
    };
    // SAFETY: the hook is only installed on types whose payload is a `T`.
    let this = unsafe { payload.cast::<T>().as_ref() };
    match this.weak_from_this().upgrade() {
        Some(owner) => rt.keep_alive(handle, KeepAlive::Resource(Box::new(owner))).is_ok(),
        None => false,
    }
}
