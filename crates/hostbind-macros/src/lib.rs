//! Derive macros for hostbind.
//!
//! - `#[derive(NativeType)]` - state a type's capabilities, bind it through
//!   the instance mechanism and list its exposed fields
//!
//! # Example
//!
//! ```ignore
//! use hostbind::NativeType;
//!
//! #[derive(Clone, Copy, NativeType)]
//! #[hostbind(copy)]
//! pub struct Point {
//!     #[hostbind(get, set)]
//!     pub x: i32,
//!     #[hostbind(get, name = "y_coord")]
//!     pub y: i32,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_native_type;

/// Derive `NativeType`, `HostCast` and `DefineFields` for a struct.
///
/// # Type Attributes
///
/// - `#[hostbind(copy)]` - copies are byte copies (requires `Copy`)
/// - `#[hostbind(clone)]` - copies go through `Clone::clone`
/// - `#[hostbind(shared)]` - the type implements `SharedFromThis`
///
/// Without `copy` or `clone` the type can be moved into the host but not
/// copied back out.
///
/// # Field Attributes
///
/// - `#[hostbind(get)]` - read-only property
/// - `#[hostbind(get, set)]` - read-write property
/// - `#[hostbind(name = "...")]` - override the property name
#[proc_macro_derive(NativeType, attributes(hostbind))]
pub fn derive_native_type(input: TokenStream) -> TokenStream {
    derive_native_type::derive_native_type_impl(input)
}
