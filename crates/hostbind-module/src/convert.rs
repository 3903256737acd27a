//! Conversion between Rust values and host values.
//!
//! Every type crossing the boundary implements [`HostCast`] exactly once,
//! and its [`HostCast::Kind`] says which mechanism carries it:
//!
//! - [`Bound`]: the type is registered with a class builder and lives in
//!   host instances. Conversions go through the instance lifecycle facade.
//! - [`Caster`]: the value is translated to and from a host primitive and
//!   never has an instance of its own.
//!
//! ## Supported caster types
//!
//! - Integers: `i8`..`i64`, `u8`..`u64`, `isize`, `usize`
//! - Floats: `f32`, `f64`
//! - `bool`, `String`, `()`

use hostbind_core::{CleanupList, ConversionError, Handle, HostResult, HostRuntime, Value};

mod sealed {
    pub trait Sealed {}
}

/// Which mechanism carries a type across the boundary.
pub trait BindingKind: sealed::Sealed + 'static {
    const IS_BOUND: bool;
}

/// Carried by a bound host type.
pub enum Bound {}

/// Carried by value translation.
pub enum Caster {}

impl sealed::Sealed for Bound {}
impl sealed::Sealed for Caster {}

impl BindingKind for Bound {
    const IS_BOUND: bool = true;
}

impl BindingKind for Caster {
    const IS_BOUND: bool = false;
}

/// A Rust type that can cross into and out of the host.
pub trait HostCast: Sized + 'static {
    type Kind: BindingKind;

    /// Extract a value. Temporaries created by implicit conversions are
    /// pushed onto `cleanup`.
    ///
    /// Returns a [`ConversionError`] (wrapped) if the host value has the
    /// wrong type, so overload resolution can try the next candidate.
    fn from_host(rt: &mut HostRuntime, value: &Value, cleanup: &mut CleanupList) -> HostResult<Self>;

    /// Convert into a new host reference.
    fn into_host(self, rt: &mut HostRuntime) -> HostResult<Value>;

    /// Host view of a value living inside the payload of `parent`.
    fn borrowed_into_host(&self, rt: &mut HostRuntime, parent: Handle) -> HostResult<Value>;

    /// Overwrite `slot` with the host value.
    fn assign_from_host(slot: &mut Self, rt: &mut HostRuntime, value: &Value) -> HostResult<()> {
        let mut cleanup = CleanupList::new();
        let result = Self::from_host(rt, value, &mut cleanup).map(|v| *slot = v);
        cleanup.release(rt);
        result
    }
}

fn mismatch(expected: &str, value: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: expected.to_owned(),
        actual: value.kind_name().to_owned(),
    }
}

macro_rules! impl_host_cast_int {
    ($($ty:ty),*) => {
        $(
            impl HostCast for $ty {
                type Kind = Caster;

                fn from_host(_: &mut HostRuntime, value: &Value, _: &mut CleanupList) -> HostResult<Self> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: *v,
                                target_type: stringify!($ty),
                            }
                            .into()
                        }),
                        other => Err(mismatch("int", other).into()),
                    }
                }

                fn into_host(self, _: &mut HostRuntime) -> HostResult<Value> {
                    Ok(Value::Int(self as i64))
                }

                fn borrowed_into_host(&self, rt: &mut HostRuntime, _: Handle) -> HostResult<Value> {
                    (*self).into_host(rt)
                }
            }
        )*
    };
}

impl_host_cast_int!(i8, i16, i32, i64, isize, u8, u16, u32, usize);

// u64 reinterprets the bits so the full range survives a round trip.
impl HostCast for u64 {
    type Kind = Caster;

    fn from_host(_: &mut HostRuntime, value: &Value, _: &mut CleanupList) -> HostResult<Self> {
        match value {
            Value::Int(v) => Ok(*v as u64),
            other => Err(mismatch("int", other).into()),
        }
    }

    fn into_host(self, _: &mut HostRuntime) -> HostResult<Value> {
        Ok(Value::Int(self as i64))
    }

    fn borrowed_into_host(&self, rt: &mut HostRuntime, _: Handle) -> HostResult<Value> {
        (*self).into_host(rt)
    }
}

macro_rules! impl_host_cast_float {
    ($($ty:ty),*) => {
        $(
            impl HostCast for $ty {
                type Kind = Caster;

                fn from_host(_: &mut HostRuntime, value: &Value, _: &mut CleanupList) -> HostResult<Self> {
                    match value {
                        Value::Float(v) => Ok(*v as $ty),
                        Value::Int(v) => Ok(*v as $ty),
                        other => Err(mismatch("float", other).into()),
                    }
                }

                fn into_host(self, _: &mut HostRuntime) -> HostResult<Value> {
                    Ok(Value::Float(self as f64))
                }

                fn borrowed_into_host(&self, rt: &mut HostRuntime, _: Handle) -> HostResult<Value> {
                    (*self).into_host(rt)
                }
            }
        )*
    };
}

impl_host_cast_float!(f32, f64);

impl HostCast for bool {
    type Kind = Caster;

    fn from_host(_: &mut HostRuntime, value: &Value, _: &mut CleanupList) -> HostResult<Self> {
        match value {
            Value::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other).into()),
        }
    }

    fn into_host(self, _: &mut HostRuntime) -> HostResult<Value> {
        Ok(Value::Bool(self))
    }

    fn borrowed_into_host(&self, rt: &mut HostRuntime, _: Handle) -> HostResult<Value> {
        (*self).into_host(rt)
    }
}

impl HostCast for String {
    type Kind = Caster;

    fn from_host(_: &mut HostRuntime, value: &Value, _: &mut CleanupList) -> HostResult<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(mismatch("str", other).into()),
        }
    }

    fn into_host(self, _: &mut HostRuntime) -> HostResult<Value> {
        Ok(Value::Str(self))
    }

    fn borrowed_into_host(&self, _: &mut HostRuntime, _: Handle) -> HostResult<Value> {
        Ok(Value::Str(self.clone()))
    }
}

impl HostCast for () {
    type Kind = Caster;

    fn from_host(_: &mut HostRuntime, value: &Value, _: &mut CleanupList) -> HostResult<Self> {
        match value {
            Value::None => Ok(()),
            other => Err(mismatch("None", other).into()),
        }
    }

    fn into_host(self, _: &mut HostRuntime) -> HostResult<Value> {
        Ok(Value::None)
    }

    fn borrowed_into_host(&self, _: &mut HostRuntime, _: Handle) -> HostResult<Value> {
        Ok(Value::None)
    }
}

/// Implicit-conversion predicate for a caster type: the value converts.
pub(crate) fn caster_predicate<S: HostCast>(
    rt: &mut HostRuntime,
    value: &Value,
    cleanup: &mut CleanupList,
) -> bool {
    S::from_host(rt, value, cleanup).is_ok()
}
