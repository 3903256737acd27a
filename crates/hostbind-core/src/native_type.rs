//! Traits describing native types to the binding layer.
//!
//! Rust has no compile-time introspection for "is this copy-constructible",
//! so each bound type states its capabilities once through
//! [`NativeType::capabilities`]. Usually this is generated by
//! `#[derive(NativeType)]`.

use std::sync::Weak;

use crate::{Capabilities, Handle};

/// A native type that can be bound to a host type.
pub trait NativeType: Sized + 'static {
    /// Capabilities reported at registration.
    ///
    /// The default is destructible and relocatable but not copyable.
    fn capabilities() -> Capabilities<Self> {
        Capabilities::new()
    }
}

/// Marker for `Self` starting with a `B` at offset zero.
///
/// Binding layers rely on this to reinterpret a payload of `Self` as a `B`:
/// when reading members declared on a base, and when building a `Self`
/// (an alias) in storage sized for it. Instances built as an alias are
/// destructed and copied through the alias's own hooks. Every type is
/// trivially its own prefix.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or `#[repr(transparent)]`) with a `B`
/// as their first field, so that a `*const Self` is a valid `*const B`.
pub unsafe trait Upcast<B: 'static>: 'static {}

// SAFETY: a type is trivially a prefix of itself.
unsafe impl<T: 'static> Upcast<T> for T {}

/// A value that can hand out a weak reference to the `Arc` that owns it.
pub trait SharedFromThis: Sized + 'static {
    /// The weak self-reference. Upgrading fails if the value is not shared.
    fn weak_from_this(&self) -> Weak<Self>;
}

/// A value that tracks the host handle that owns it.
pub trait IntrusiveCounted: 'static {
    /// Record the owning handle. Called whenever an instance is wrapped.
    fn set_self_handle(&mut self, handle: Handle);
}

/// A value that records its host weak-reference slot.
pub trait WeakReferenceable: 'static {
    /// Record the handle whose weak references track this value.
    fn set_weak_handle(&mut self, handle: Handle);
}
