//! Builders for binding native Rust types into the host runtime.
//!
//! # Architecture
//!
//! ```text
//! class_::<T>() -> ClassBuilder -> register() -> Class (def, def_rw, def_init, ...)
//! enum_::<T>()  -> EnumBuilder  -> register() -> Enum  (value, export_values)
//! ```
//!
//! Both builders produce a type-init descriptor, apply the requested traits
//! in order and hand the result to [`HostRuntime::create_type`]. Values
//! cross the boundary through [`HostCast`].

pub mod bound;
mod class_builder;
pub mod convert;
mod enum_builder;
pub mod function;
mod init;
mod operator;

pub use class_builder::{Class, ClassBuilder, DefineFields, class_};
pub use convert::{BindingKind, Bound, Caster, HostCast};
pub use enum_builder::{Enum, EnumBuilder, enum_};
pub use function::{Constructor, IntoConstructor, IntoMethod, IntoStatic};
pub use operator::Operator;

use hostbind_core::{HostRuntime, NativeTypeId};

/// Make `S` implicitly convertible to the bound type `T`.
///
/// Wherever a `T` is expected, a value holding an `S` is accepted by
/// calling `T`'s constructor with it. A bound `S` is recognized by type; a
/// caster `S` by whether the value converts.
pub fn implicitly_convertible<S, T>(rt: &mut HostRuntime)
where
    S: HostCast,
    T: HostCast<Kind = Bound>,
{
    class_builder::register_implicit::<S>(rt, NativeTypeId::of::<T>());
}
