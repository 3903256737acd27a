//! [`HostCast`](crate::HostCast) building blocks for bound types.
//!
//! `#[derive(NativeType)]` implements `HostCast` for a bound type by
//! delegating to these functions; hand-written impls can do the same.

use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use hostbind_core::{
    CleanupList, ConversionError, EnumSupplement, Handle, HostError, HostResult, HostRuntime,
    KeepAlive, NativeEnum, NativeTypeId, TypeFlags, Value,
};
use tracing::trace;

/// The registered type of `T`.
pub fn type_handle<T: 'static>(rt: &HostRuntime) -> HostResult<Handle> {
    rt.lookup_type(NativeTypeId::of::<T>()).ok_or_else(|| {
        HostError::Native(format!(
            "{} has not been bound to a host type",
            std::any::type_name::<T>()
        ))
    })
}

/// The instance behind `value` if it holds a `T`, otherwise the result of
/// an implicit conversion into `T`.
pub fn instance_of<T: 'static>(
    rt: &mut HostRuntime,
    value: &Value,
    cleanup: &mut CleanupList,
) -> HostResult<Handle> {
    let native = NativeTypeId::of::<T>();
    if let Value::Object(handle) = value
        && rt.inst_is_a(*handle, native)
    {
        return Ok(*handle);
    }
    rt.try_implicit(native, value, cleanup).ok_or_else(|| {
        ConversionError::TypeMismatch {
            expected: std::any::type_name::<T>().to_owned(),
            actual: value.kind_name().to_owned(),
        }
        .into()
    })
}

/// Copy the `T` out of a ready instance, through `T`'s copy hook if it
/// has one.
pub fn copy_out<T: 'static>(rt: &HostRuntime, handle: Handle) -> HostResult<T> {
    let src = rt.inst_cast_ptr::<T>(handle)?;
    let descriptor = rt.type_descriptor(type_handle::<T>(rt)?)?;
    if !descriptor.has(TypeFlags::COPY_CONSTRUCTIBLE) {
        return Err(HostError::MissingCapability {
            type_name: descriptor.name.clone(),
            capability: "copy",
        });
    }
    let mut out = MaybeUninit::<T>::uninit();
    // SAFETY: `src` is a ready `T`, and the descriptor says `T` can be
    // copied, by its hook or bytewise.
    unsafe {
        match descriptor.copy {
            Some(copy) => copy(out.as_mut_ptr().cast(), src.as_ptr().cast()),
            None => ptr::copy_nonoverlapping(src.as_ptr(), out.as_mut_ptr(), 1),
        }
        Ok(out.assume_init())
    }
}

/// Extract a `T` by copy.
pub fn from_host<T: 'static>(
    rt: &mut HostRuntime,
    value: &Value,
    cleanup: &mut CleanupList,
) -> HostResult<T> {
    let handle = instance_of::<T>(rt, value, cleanup)?;
    copy_out(rt, handle)
}

/// Move `value` into a new owning instance.
pub fn into_host<T: 'static>(rt: &mut HostRuntime, value: T) -> HostResult<Value> {
    let ty = type_handle::<T>(rt)?;
    let inst = rt.inst_alloc(ty)?;
    let slot = match rt.inst_uninit_ptr::<T>(inst) {
        Ok(slot) => slot,
        Err(err) => {
            rt.decref(inst);
            return Err(err);
        }
    };
    // SAFETY: freshly allocated storage for a `T`.
    unsafe { slot.write(value) };
    rt.inst_mark_ready(inst)?;
    rt.inst_notify_owner(inst)?;
    Ok(Value::Object(inst))
}

/// Non-owning instance for a `T` inside `parent`'s payload.
pub fn borrowed<T: 'static>(rt: &mut HostRuntime, value: &T, parent: Handle) -> HostResult<Value> {
    let ty = type_handle::<T>(rt)?;
    // SAFETY: `value` lives inside `parent`'s payload, and the new instance
    // keeps `parent` alive.
    let inst = unsafe { rt.inst_reference(ty, NonNull::from(value).cast(), Some(parent))? };
    Ok(Value::Object(inst))
}

/// Overwrite `slot` with a copy of the `T` held by `value`.
///
/// Always copies, so the slot never aliases a temporary created for the
/// assignment.
pub fn assign<T: 'static>(slot: &mut T, rt: &mut HostRuntime, value: &Value) -> HostResult<()> {
    let mut cleanup = CleanupList::new();
    let result = instance_of::<T>(rt, value, &mut cleanup).and_then(|handle| {
        let src = rt.inst_cast_ptr::<T>(handle)?;
        if ptr::eq(src.as_ptr(), slot) {
            return Ok(());
        }
        *slot = copy_out(rt, handle)?;
        Ok(())
    });
    cleanup.release(rt);
    result
}

/// Move `value` into a new owning instance.
pub fn cast_owned<T: 'static>(rt: &mut HostRuntime, value: T) -> HostResult<Handle> {
    match into_host(rt, value)? {
        Value::Object(handle) => Ok(handle),
        other => Err(HostError::Native(format!("expected an instance, got {}", other.kind_name()))),
    }
}

/// Wrap a shared value without taking ownership of it.
///
/// The instance keeps the value's `Arc` alive: through the type's
/// shared-from-this hook when it has one, otherwise by holding `value`
/// itself. Methods taking `&mut T` must not be called on such instances
/// while other owners of the `Arc` can observe the value.
pub fn cast_shared<T: 'static>(rt: &mut HostRuntime, value: Arc<T>) -> HostResult<Handle> {
    let ty = type_handle::<T>(rt)?;
    let ptr = NonNull::new(Arc::as_ptr(&value).cast_mut())
        .ok_or_else(|| HostError::Native("null shared pointer".into()))?;
    // SAFETY: the instance keeps an `Arc` to the value for its whole life.
    let inst = unsafe { rt.inst_reference(ty, ptr.cast(), None)? };

    let shared_hook = rt.type_flags(ty)?.contains(TypeFlags::SHARED_FROM_THIS);
    if shared_hook && rt.keep_shared_alive(inst)? {
        trace!(handle = %inst, "shared value kept alive by its own weak slot");
        return Ok(inst);
    }
    rt.keep_alive(inst, KeepAlive::Resource(Box::new(value)))?;
    Ok(inst)
}

/// Extract an enum value from one of its entries.
pub fn enum_from_host<T: NativeEnum>(
    rt: &mut HostRuntime,
    value: &Value,
    cleanup: &mut CleanupList,
) -> HostResult<T> {
    let handle = instance_of::<T>(rt, value, cleanup)?;
    // SAFETY: a ready instance of the enum holds a valid `T`.
    Ok(unsafe { rt.inst_cast_ptr::<T>(handle)?.read() })
}

/// The registered entry for an enum value, as a new reference.
pub fn enum_into_host<T: NativeEnum>(rt: &mut HostRuntime, value: T) -> HostResult<Value> {
    let ty = type_handle::<T>(rt)?;
    let raw = value.to_i64();
    let entry = rt
        .type_supplement::<EnumSupplement>(ty)?
        .entry_by_value(raw)
        .map(|entry| entry.object);
    match entry {
        Some(object) => {
            rt.incref(object);
            Ok(Value::Object(object))
        }
        None => Err(HostError::Value(format!(
            "{raw} is not a registered value of '{}'",
            rt.type_name(ty)?
        ))),
    }
}
