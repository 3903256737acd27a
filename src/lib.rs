//! Bind native Rust types into a dynamically typed, reference-counted host
//! object system.
//!
//! ```rust
//! use hostbind::prelude::*;
//!
//! #[derive(Clone, Copy, Debug, PartialEq, NativeType)]
//! #[hostbind(copy)]
//! struct Point {
//!     #[hostbind(get, set)]
//!     x: i32,
//!     #[hostbind(get)]
//!     y: i32,
//! }
//!
//! # fn main() -> HostResult<()> {
//! let mut rt = HostRuntime::new();
//! let module = rt.new_scope("geometry");
//! let ty = class_::<Point>(&mut rt, module, "Point")
//!     .register()?
//!     .def_init(|x: i32, y: i32| Point { x, y })?
//!     .def_fields()?
//!     .finish();
//!
//! let p = rt.call(ty, &[Value::Int(3), Value::Int(4)])?;
//! let p = p.as_handle().unwrap();
//! assert_eq!(rt.get_attr(p, "x")?, Value::Int(3));
//! rt.set_attr(p, "x", &Value::Int(5))?;
//! assert_eq!(bound::copy_out::<Point>(&rt, p)?, Point { x: 5, y: 4 });
//! # Ok(())
//! # }
//! ```
//!
//! `copy` and `clone` are mutually exclusive:
//!
//! ```compile_fail
//! use hostbind::NativeType;
//!
//! #[derive(Clone, Copy, NativeType)]
//! #[hostbind(copy, clone)]
//! struct Both {
//!     x: i32,
//! }
//! ```
//!
//! and byte copies need a `Copy` type:
//!
//! ```compile_fail
//! use hostbind::NativeType;
//!
//! #[derive(Clone, NativeType)]
//! #[hostbind(copy)]
//! struct Name {
//!     text: String,
//! }
//! ```

pub use hostbind_core::*;
pub use hostbind_macros::NativeType;
pub use hostbind_module::{
    BindingKind, Bound, Caster, Class, ClassBuilder, Constructor, DefineFields, Enum, EnumBuilder,
    HostCast, IntoConstructor, IntoMethod, IntoStatic, Operator, bound, class_, convert, enum_,
    function, implicitly_convertible,
};
pub use num_enum;

pub mod prelude {
    pub use crate::NativeType;
    pub use crate::{
        Capabilities, CleanupList, EnumTrait, Handle, HostError, HostResult, HostRuntime,
        RuntimeConfig, TypeFlags, TypeTrait, Upcast, Value,
    };
    pub use crate::{
        Class, DefineFields, Enum, HostCast, Operator, bound, class_, enum_, implicitly_convertible,
    };
}
