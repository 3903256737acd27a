//! Wrapping Rust callables as host functions.
//!
//! [`IntoMethod`] accepts closures taking `&T` or `&mut T` followed by up
//! to four [`HostCast`] arguments; [`IntoStatic`] and [`IntoConstructor`]
//! accept closures taking only `HostCast` arguments. Arguments are
//! converted before the receiver is borrowed, and temporaries created by
//! implicit conversions are released once the call returns.

use std::marker::PhantomData;
use std::sync::Arc;

use hostbind_core::{
    CleanupList, ConversionError, Handle, HostResult, HostRuntime, NativeFn, NativeTypeId, Value,
};

use crate::HostCast;

/// Receiver taken by shared reference.
pub struct ByRef<Args, R>(PhantomData<fn(Args) -> R>);

/// Receiver taken by mutable reference.
pub struct ByMut<Args, R>(PhantomData<fn(Args) -> R>);

/// No receiver.
pub struct Free<Args, R>(PhantomData<fn(Args) -> R>);

/// A callable usable as an instance method of `T`.
pub trait IntoMethod<T, Marker> {
    fn into_method(self) -> NativeFn;
}

/// A callable usable as a static function.
pub trait IntoStatic<Marker> {
    fn into_static(self) -> NativeFn;
}

/// Builds an `Out` from host arguments.
pub struct Constructor<Out> {
    arity: usize,
    #[allow(clippy::type_complexity)]
    build: Arc<dyn Fn(&mut HostRuntime, &[Value], &mut CleanupList) -> HostResult<Out> + Send + Sync>,
}

impl<Out> Constructor<Out> {
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Convert `args` and run the constructor.
    pub fn build(&self, rt: &mut HostRuntime, args: &[Value], cleanup: &mut CleanupList) -> HostResult<Out> {
        check_arity(args, self.arity)?;
        (self.build)(rt, args, cleanup)
    }
}

impl<Out> Clone for Constructor<Out> {
    fn clone(&self) -> Self {
        Self {
            arity: self.arity,
            build: Arc::clone(&self.build),
        }
    }
}

/// A callable producing an `Out` from host arguments.
pub trait IntoConstructor<Out, Marker> {
    fn into_constructor(self) -> Constructor<Out>;
}

pub(crate) fn check_arity(args: &[Value], expected: usize) -> HostResult<()> {
    if args.len() != expected {
        return Err(ConversionError::ArgumentCount {
            expected,
            actual: args.len(),
        }
        .into());
    }
    Ok(())
}

/// The instance handle in `value`, if it holds a `T`.
pub(crate) fn receiver<T: 'static>(rt: &HostRuntime, value: Option<&Value>) -> HostResult<Handle> {
    match value {
        Some(Value::Object(handle)) if rt.inst_is_a(*handle, NativeTypeId::of::<T>()) => Ok(*handle),
        other => Err(ConversionError::TypeMismatch {
            expected: std::any::type_name::<T>().to_owned(),
            actual: other.map_or("nothing", Value::kind_name).to_owned(),
        }
        .into()),
    }
}

/// Run `body` with a fresh cleanup list, releasing it afterwards.
fn with_cleanup<R>(
    rt: &mut HostRuntime,
    body: impl FnOnce(&mut HostRuntime, &mut CleanupList) -> HostResult<R>,
) -> HostResult<R> {
    let mut cleanup = CleanupList::new();
    let result = body(rt, &mut cleanup);
    cleanup.release(rt);
    result
}

macro_rules! impl_callables {
    ($count:expr; $($arg:ident),*) => {
        impl<T, F, R, $($arg,)*> IntoMethod<T, ByRef<($($arg,)*), R>> for F
        where
            T: 'static,
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            R: HostCast,
            $($arg: HostCast,)*
        {
            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn into_method(self) -> NativeFn {
                NativeFn::new(move |rt, args| {
                    check_arity(args, $count + 1)?;
                    let result = with_cleanup(rt, |rt, cleanup| {
                        let mut rest = args[1..].iter();
                        $(let $arg = $arg::from_host(rt, rest.next().unwrap_or(&Value::None), cleanup)?;)*
                        let this = rt.inst_cast_ptr::<T>(receiver::<T>(rt, args.first())?)?;
                        // SAFETY: the receiver is a ready `T`; no host code
                        // runs while the reference is live.
                        Ok(self(unsafe { this.as_ref() }, $($arg),*))
                    })?;
                    result.into_host(rt)
                })
            }
        }

        impl<T, F, R, $($arg,)*> IntoMethod<T, ByMut<($($arg,)*), R>> for F
        where
            T: 'static,
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            R: HostCast,
            $($arg: HostCast,)*
        {
            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn into_method(self) -> NativeFn {
                NativeFn::new(move |rt, args| {
                    check_arity(args, $count + 1)?;
                    let result = with_cleanup(rt, |rt, cleanup| {
                        let mut rest = args[1..].iter();
                        $(let $arg = $arg::from_host(rt, rest.next().unwrap_or(&Value::None), cleanup)?;)*
                        let mut this = rt.inst_cast_ptr::<T>(receiver::<T>(rt, args.first())?)?;
                        // SAFETY: as above; arguments were copied out, so
                        // none of them aliases the receiver.
                        Ok(self(unsafe { this.as_mut() }, $($arg),*))
                    })?;
                    result.into_host(rt)
                })
            }
        }

        impl<F, R, $($arg,)*> IntoStatic<Free<($($arg,)*), R>> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: HostCast,
            $($arg: HostCast,)*
        {
            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn into_static(self) -> NativeFn {
                NativeFn::new(move |rt, args| {
                    check_arity(args, $count)?;
                    let result = with_cleanup(rt, |rt, cleanup| {
                        let mut rest = args.iter();
                        $(let $arg = $arg::from_host(rt, rest.next().unwrap_or(&Value::None), cleanup)?;)*
                        Ok(self($($arg),*))
                    })?;
                    result.into_host(rt)
                })
            }
        }

        impl<Out, F, $($arg,)*> IntoConstructor<Out, Free<($($arg,)*), Out>> for F
        where
            F: Fn($($arg),*) -> Out + Send + Sync + 'static,
            $($arg: HostCast,)*
        {
            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn into_constructor(self) -> Constructor<Out> {
                Constructor {
                    arity: $count,
                    build: Arc::new(move |rt: &mut HostRuntime, args: &[Value], cleanup: &mut CleanupList| -> HostResult<Out> {
                        let mut rest = args.iter();
                        $(let $arg = $arg::from_host(rt, rest.next().unwrap_or(&Value::None), cleanup)?;)*
                        Ok(self($($arg),*))
                    }),
                }
            }
        }
    };
}

impl_callables!(0;);
impl_callables!(1; A1);
impl_callables!(2; A1, A2);
impl_callables!(3; A1, A2, A3);
impl_callables!(4; A1, A2, A3, A4);

#[cfg(test)]
mod tests {
    use hostbind_core::{Capabilities, HostError, TypeDescriptor, TypeInitDescriptor};

    use super::*;
    use crate::bound;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Counter {
        value: i64,
    }

    fn method<M>(f: impl IntoMethod<Counter, M>) -> NativeFn {
        f.into_method()
    }

    fn free<M>(f: impl IntoStatic<M>) -> NativeFn {
        f.into_static()
    }

    fn setup() -> (HostRuntime, Handle) {
        let mut rt = HostRuntime::new();
        let m = rt.new_scope("m");
        let mut data = TypeDescriptor::for_layout::<Counter>("Counter", NativeTypeId::of::<Counter>());
        Capabilities::<Counter>::new().bitwise_copy().apply(&mut data);
        rt.create_type(TypeInitDescriptor::new(data, m)).unwrap();
        let c = bound::cast_owned(&mut rt, Counter { value: 1 }).unwrap();
        (rt, c)
    }

    #[test]
    fn shared_receiver() {
        let (mut rt, c) = setup();
        let f = method(|c: &Counter, by: i64| c.value * by);
        assert_eq!(f.call(&mut rt, &[Value::Object(c), Value::Int(3)]), Ok(Value::Int(3)));
    }

    #[test]
    fn mutable_receiver() {
        let (mut rt, c) = setup();
        let f = method(|c: &mut Counter, by: i64| c.value += by);
        assert_eq!(f.call(&mut rt, &[Value::Object(c), Value::Int(4)]), Ok(Value::None));
        assert_eq!(unsafe { rt.inst_cast_ptr::<Counter>(c).unwrap().as_ref() }.value, 5);
    }

    #[test]
    fn arity_and_receiver_errors_are_conversions() {
        let (mut rt, _) = setup();
        let f = method(|c: &Counter| c.value);
        let err = f.call(&mut rt, &[]).unwrap_err();
        assert_eq!(
            err,
            HostError::Conversion(ConversionError::ArgumentCount { expected: 1, actual: 0 })
        );
        assert!(f.call(&mut rt, &[Value::Int(1)]).unwrap_err().is_conversion());
    }

    #[test]
    fn static_functions() {
        let mut rt = HostRuntime::new();
        let f = free(|a: i32, b: i32| a + b);
        assert_eq!(f.call(&mut rt, &[Value::Int(2), Value::Int(3)]), Ok(Value::Int(5)));
        let zero = free(|| "x".to_owned());
        assert_eq!(zero.call(&mut rt, &[]), Ok(Value::from("x")));
    }

    #[test]
    fn constructors_report_arity() {
        let mut rt = HostRuntime::new();
        let ctor: Constructor<Counter> = (|x: i64, y: i64| Counter { value: x + y }).into_constructor();
        assert_eq!(ctor.arity(), 2);
        let mut cleanup = CleanupList::new();
        let built = ctor.build(&mut rt, &[Value::Int(2), Value::Int(5)], &mut cleanup);
        assert_eq!(built, Ok(Counter { value: 7 }));
        assert!(ctor.build(&mut rt, &[Value::Int(2)], &mut cleanup).is_err());
    }
}
