//! Core types for binding native Rust values into a dynamically typed host
//! object system.
//!
//! This crate contains:
//! - The type descriptor model ([`TypeDescriptor`], [`TypeInitDescriptor`],
//!   [`EnumTypeInitDescriptor`])
//! - The capability-extension catalogue ([`TypeTrait`], [`EnumTrait`])
//! - Capability probing ([`NativeType`], [`Capabilities`])
//! - The host runtime ([`HostRuntime`]): a reference-counted object heap with
//!   the type registry and the instance lifecycle facade
//! - The implicit conversion registry ([`ImplicitSource`])
//! - Error types shared by every layer
//!
//! Higher level builders live in `hostbind-module`.

pub mod capabilities;
pub mod cleanup;
pub mod descriptor;
pub mod enum_support;
pub mod error;
pub mod flags;
pub mod implicit;
pub mod native_fn;
pub mod native_type;
pub mod runtime;
pub mod supplement;
pub mod type_id;
pub mod type_trait;
pub mod value;

pub use capabilities::Capabilities;
pub use cleanup::CleanupList;
pub use descriptor::{
    AliasHooks, CopyFn, DestructFn, EnumTypeInitDescriptor, KeepSharedAliveFn, MoveFn, SetSelfFn, SetWeakFn,
    SlotsCallback, TypeDescriptor, TypeInitDescriptor, TypeSlot,
};
pub use enum_support::{EnumRepr, NativeEnum};
pub use error::{ConversionError, HostError, HostResult, RegistrationError};
pub use flags::{InitFlags, TypeFlags};
pub use implicit::{ImplicitPredicate, ImplicitSource};
pub use native_fn::NativeFn;
pub use native_type::{IntrusiveCounted, NativeType, SharedFromThis, Upcast, WeakReferenceable};
pub use runtime::{HostRuntime, KeepAlive, RuntimeConfig};
pub use supplement::{EnumEntry, EnumSupplement, SupplementSpec};
pub use type_id::NativeTypeId;
pub use type_trait::{EnumTrait, TypeTrait};
pub use value::{Handle, Value};
