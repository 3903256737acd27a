//! Initializers installed as `__init__`.
//!
//! An initializer receives a freshly allocated instance that is not ready
//! yet, builds the native value from the remaining arguments and writes it
//! into the payload. The runtime marks the instance ready afterwards.
//!
//! When a class has an alias type, instances of host-language subclasses
//! are built as the alias so host overrides can be reached from native
//! code. The choice is made per instance through
//! [`HostRuntime::inst_host_derived`], and an instance built as the alias is
//! marked so teardown and copies use the alias hooks.

use std::any::TypeId;
use std::mem::{align_of, size_of};

use hostbind_core::{CleanupList, Handle, HostError, HostResult, HostRuntime, NativeFn, Upcast, Value};

use crate::function::{Constructor, receiver};

/// Build an `Out` from `args` and write it into the unconstructed payload
/// of `this`, an instance whose type binds `T`.
fn construct_in_place<T: 'static, Out: Upcast<T>>(
    rt: &mut HostRuntime,
    this: Handle,
    ctor: &Constructor<Out>,
    args: &[Value],
    cleanup: &mut CleanupList,
) -> HostResult<()> {
    let value = ctor.build(rt, args, cleanup)?;
    let slot = rt.inst_uninit_ptr::<T>(this)?;
    let ty = rt.inst_type(this)?;
    if size_of::<Out>() > rt.type_size(ty)? || align_of::<Out>() > rt.type_align(ty)? {
        return Err(HostError::Native(format!(
            "{} does not fit the payload of '{}'",
            std::any::type_name::<Out>(),
            rt.type_name(ty)?
        )));
    }
    if TypeId::of::<Out>() != TypeId::of::<T>() {
        rt.inst_mark_alias(this)?;
    }
    // SAFETY: the payload is unconstructed, large and aligned enough for an
    // `Out`, and `Out` starts with a `T`.
    unsafe { slot.cast::<Out>().write(value) };
    Ok(())
}

/// The `__init__` overload for a class binding `T` with alias `A`.
///
/// Builds a `T` unless the instance is host-derived and an alias
/// constructor exists, or there is no `T` constructor at all.
pub(crate) fn initializer<T: 'static, A: Upcast<T>>(
    native: Option<Constructor<T>>,
    alias: Option<Constructor<A>>,
) -> NativeFn {
    NativeFn::new(move |rt, args| {
        let this = receiver::<T>(rt, args.first())?;
        let rest = args.get(1..).unwrap_or(&[]);
        let mut cleanup = CleanupList::new();
        let result = match (&native, &alias) {
            (Some(native), Some(alias)) => {
                if rt.inst_host_derived(this)? {
                    construct_in_place::<T, A>(rt, this, alias, rest, &mut cleanup)
                } else {
                    construct_in_place::<T, T>(rt, this, native, rest, &mut cleanup)
                }
            }
            (Some(native), None) => construct_in_place::<T, T>(rt, this, native, rest, &mut cleanup),
            (None, Some(alias)) => construct_in_place::<T, A>(rt, this, alias, rest, &mut cleanup),
            (None, None) => Err(HostError::NoInitializer {
                type_name: rt.inst_name(this)?,
            }),
        };
        cleanup.release(rt);
        result.map(|()| Value::None)
    })
}

#[cfg(test)]
mod tests {
    use hostbind_core::{Capabilities, NativeTypeId, TypeDescriptor, TypeInitDescriptor};

    use super::*;
    use crate::function::IntoConstructor;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Shape {
        sides: i64,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct ShapeAlias {
        base: Shape,
        overridden: bool,
    }

    // SAFETY: repr(C) with a `Shape` first.
    unsafe impl Upcast<Shape> for ShapeAlias {}

    fn setup() -> (HostRuntime, Handle, Handle) {
        let mut rt = HostRuntime::new();
        let m = rt.new_scope("m");
        let mut data = TypeDescriptor::for_layout::<ShapeAlias>("Shape", NativeTypeId::of::<Shape>());
        Capabilities::<Shape>::new().bitwise_copy().apply(&mut data);
        data.alias = Some(Capabilities::<ShapeAlias>::new().bitwise_copy().alias_hooks());
        let ty = rt.create_type(TypeInitDescriptor::new(data, m)).unwrap();
        let sub = rt.create_subclass(m, "PyShape", ty).unwrap();
        (rt, ty, sub)
    }

    fn native() -> Constructor<Shape> {
        (|sides: i64| Shape { sides }).into_constructor()
    }

    fn alias() -> Constructor<ShapeAlias> {
        (|sides: i64| ShapeAlias {
            base: Shape { sides },
            overridden: true,
        })
        .into_constructor()
    }

    fn run(rt: &mut HostRuntime, ty: Handle, init: &NativeFn) -> Handle {
        let inst = rt.inst_alloc(ty).unwrap();
        init.call(rt, &[Value::Object(inst), Value::Int(3)]).unwrap();
        rt.inst_mark_ready(inst).unwrap();
        inst
    }

    #[test]
    fn chooses_alias_for_host_subclasses() {
        let (mut rt, ty, sub) = setup();
        let init = initializer::<Shape, ShapeAlias>(Some(native()), Some(alias()));

        let plain = run(&mut rt, ty, &init);
        let derived = run(&mut rt, sub, &init);
        let derived_alias = unsafe { rt.inst_cast_ptr::<Shape>(derived).unwrap().cast::<ShapeAlias>().as_ref() };
        assert!(derived_alias.overridden);
        assert_eq!(derived_alias.base.sides, 3);
        assert_eq!(rt.inst_holds_alias(derived), Ok(true));
        assert_eq!(unsafe { rt.inst_cast_ptr::<Shape>(plain).unwrap().as_ref() }.sides, 3);
        assert_eq!(rt.inst_holds_alias(plain), Ok(false));
    }

    #[test]
    fn alias_needs_alias_hooks_on_the_type() {
        let mut rt = HostRuntime::new();
        let m = rt.new_scope("m");
        let mut data = TypeDescriptor::for_layout::<ShapeAlias>("Shape", NativeTypeId::of::<Shape>());
        Capabilities::<Shape>::new().bitwise_copy().apply(&mut data);
        let ty = rt.create_type(TypeInitDescriptor::new(data, m)).unwrap();
        let init = initializer::<Shape, ShapeAlias>(None, Some(alias()));
        let inst = rt.inst_alloc(ty).unwrap();
        let err = init.call(&mut rt, &[Value::Object(inst), Value::Int(3)]).unwrap_err();
        assert!(matches!(err, HostError::MissingCapability { capability: "alias", .. }));
        assert_eq!(rt.inst_state(inst), Ok((false, true)));
    }

    #[test]
    fn alias_only_constructor_is_always_used() {
        let (mut rt, ty, _) = setup();
        let init = initializer::<Shape, ShapeAlias>(None, Some(alias()));
        let inst = run(&mut rt, ty, &init);
        let value = unsafe { rt.inst_cast_ptr::<Shape>(inst).unwrap().cast::<ShapeAlias>().as_ref() };
        assert!(value.overridden);
    }

    #[test]
    fn initialized_instances_are_rejected() {
        let (mut rt, ty, _) = setup();
        let init = initializer::<Shape, ShapeAlias>(Some(native()), None);
        let inst = run(&mut rt, ty, &init);
        let err = init.call(&mut rt, &[Value::Object(inst), Value::Int(1)]).unwrap_err();
        assert!(matches!(err, HostError::Native(_)));
    }

    #[test]
    fn bad_arguments_fall_through() {
        let (mut rt, ty, _) = setup();
        let init = initializer::<Shape, ShapeAlias>(Some(native()), None);
        let inst = rt.inst_alloc(ty).unwrap();
        let err = init.call(&mut rt, &[Value::Object(inst), Value::from("x")]).unwrap_err();
        assert!(err.is_conversion());
        assert_eq!(rt.inst_state(inst), Ok((false, true)));
    }
}
