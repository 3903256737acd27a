//! Enum machinery: entry table, export, and the enum slot set.
//!
//! An enum type is an ordinary bound type whose supplement region is an
//! [`EnumSupplement`] and whose slot callback installs:
//!
//! - `__new__`: calling the type with an integer returns the matching entry
//! - `__int__`, `__repr__`, `__eq__`, `__hash__`
//! - for arithmetic enums, `__add__`, `__sub__`, `__mul__`, `__and__`,
//!   `__or__`, `__xor__` returning plain integers

use std::sync::Arc;

use num_enum::TryFromPrimitive;
use tracing::debug;

use crate::{
    ConversionError, EnumEntry, EnumSupplement, EnumTypeInitDescriptor, Handle, HostError,
    HostResult, HostRuntime, InitFlags, NativeFn, NativeTypeId, RegistrationError, SlotsCallback,
    SupplementSpec, TypeDescriptor, TypeFlags, TypeInitDescriptor, TypeSlot, Value,
};

/// Integer representation of an enum.
pub trait EnumRepr: Copy + 'static {
    const IS_SIGNED: bool;

    fn to_i64(self) -> i64;
}

macro_rules! impl_enum_repr {
    ($signed:expr => $($ty:ty),*) => {
        $(
            impl EnumRepr for $ty {
                const IS_SIGNED: bool = $signed;

                #[inline]
                fn to_i64(self) -> i64 {
                    self as i64
                }
            }
        )*
    };
}

impl_enum_repr!(true => i8, i16, i32, i64, isize);
impl_enum_repr!(false => u8, u16, u32, u64, usize);

/// A field-less native enum with a primitive representation.
///
/// Implemented for every enum deriving `num_enum::TryFromPrimitive` and
/// `num_enum::IntoPrimitive`.
pub trait NativeEnum: Copy + 'static {
    const IS_SIGNED: bool;

    fn to_i64(self) -> i64;
}

impl<T> NativeEnum for T
where
    T: TryFromPrimitive + Into<<T as TryFromPrimitive>::Primitive> + Copy + 'static,
    <T as TryFromPrimitive>::Primitive: EnumRepr,
{
    const IS_SIGNED: bool = <<T as TryFromPrimitive>::Primitive as EnumRepr>::IS_SIGNED;

    fn to_i64(self) -> i64 {
        let primitive: <T as TryFromPrimitive>::Primitive = self.into();
        primitive.to_i64()
    }
}

impl EnumTypeInitDescriptor {
    /// Registration descriptor for the enum `T`.
    ///
    /// The result always reserves an [`EnumSupplement`], installs the enum
    /// slot callback, marks copy, move and destruct trivial, and is final.
    pub fn new<T: NativeEnum>(name: impl Into<String>, scope: Handle) -> Self {
        const {
            assert!(!std::mem::needs_drop::<T>(), "enum payloads must be plain data");
        }
        let mut data = TypeDescriptor::for_layout::<T>(name, NativeTypeId::of::<T>());
        data.flags |= TypeFlags::TRIVIAL | TypeFlags::IS_FINAL;

        let mut type_init = TypeInitDescriptor::new(data, scope);
        type_init.init_flags |= InitFlags::HAS_SUPPLEMENT | InitFlags::HAS_TYPE_SLOTS;
        type_init.supplement = Some(SupplementSpec::with_default::<EnumSupplement>());
        type_init.type_slots_callback = Some(enum_slots(false));
        Self {
            type_init,
            is_signed: T::IS_SIGNED,
            is_arithmetic: false,
        }
    }
}

/// The enum slot callback.
fn enum_slots(arithmetic: bool) -> SlotsCallback {
    Arc::new(move |_: &TypeInitDescriptor, slots: &mut Vec<TypeSlot>| {
        slots.push(TypeSlot::new("__new__", NativeFn::new(enum_new)));
        slots.push(TypeSlot::new("__int__", NativeFn::new(enum_int)));
        slots.push(TypeSlot::new("__hash__", NativeFn::new(enum_int)));
        slots.push(TypeSlot::new("__repr__", NativeFn::new(enum_repr)));
        slots.push(TypeSlot::new("__eq__", NativeFn::new(enum_eq)));
        if arithmetic {
            slots.push(TypeSlot::new("__add__", binary_op(i64::wrapping_add)));
            slots.push(TypeSlot::new("__sub__", binary_op(i64::wrapping_sub)));
            slots.push(TypeSlot::new("__mul__", binary_op(i64::wrapping_mul)));
            slots.push(TypeSlot::new("__and__", binary_op(|a, b| a & b)));
            slots.push(TypeSlot::new("__or__", binary_op(|a, b| a | b)));
            slots.push(TypeSlot::new("__xor__", binary_op(|a, b| a ^ b)));
        }
    })
}

fn arity(args: &[Value], expected: usize) -> HostResult<()> {
    if args.len() != expected {
        return Err(ConversionError::ArgumentCount {
            expected,
            actual: args.len(),
        }
        .into());
    }
    Ok(())
}

fn receiver(args: &[Value]) -> HostResult<Handle> {
    match args.first() {
        Some(Value::Object(handle)) => Ok(*handle),
        other => Err(ConversionError::TypeMismatch {
            expected: "enum instance".into(),
            actual: other.map_or("nothing", Value::kind_name).into(),
        }
        .into()),
    }
}

/// Integer value of an operand: an `int`, or an instance of any enum.
fn operand(rt: &HostRuntime, value: &Value) -> HostResult<i64> {
    match value {
        Value::Int(v) => Ok(*v),
        Value::Object(handle) => rt.enum_value(*handle),
        other => Err(ConversionError::TypeMismatch {
            expected: "int or enum".into(),
            actual: other.kind_name().into(),
        }
        .into()),
    }
}

fn enum_new(rt: &mut HostRuntime, args: &[Value]) -> HostResult<Value> {
    arity(args, 2)?;
    let ty = receiver(args)?;
    let value = operand(rt, &args[1])?;
    let supplement = rt.type_supplement::<EnumSupplement>(ty)?;
    match supplement.entry_by_value(value) {
        Some(entry) => {
            let object = entry.object;
            rt.incref(object);
            Ok(Value::Object(object))
        }
        None => Err(HostError::Value(format!(
            "{value} is not a valid {}",
            rt.type_name(ty)?
        ))),
    }
}

fn enum_int(rt: &mut HostRuntime, args: &[Value]) -> HostResult<Value> {
    arity(args, 1)?;
    Ok(Value::Int(rt.enum_value(receiver(args)?)?))
}

fn enum_repr(rt: &mut HostRuntime, args: &[Value]) -> HostResult<Value> {
    arity(args, 1)?;
    let inst = receiver(args)?;
    let value = rt.enum_value(inst)?;
    let ty = rt.inst_type(inst)?;
    let type_name = rt.type_name(ty)?;
    let entry = rt
        .type_supplement::<EnumSupplement>(ty)?
        .entry_by_value(value)
        .map(|e| e.name.as_str());
    Ok(Value::Str(match entry {
        Some(name) => format!("{type_name}.{name}"),
        None => format!("{type_name}({value})"),
    }))
}

fn enum_eq(rt: &mut HostRuntime, args: &[Value]) -> HostResult<Value> {
    arity(args, 2)?;
    let lhs = rt.enum_value(receiver(args)?)?;
    Ok(Value::Bool(operand(rt, &args[1]).is_ok_and(|rhs| rhs == lhs)))
}

fn binary_op(op: fn(i64, i64) -> i64) -> NativeFn {
    NativeFn::new(move |rt, args| {
        arity(args, 2)?;
        let lhs = rt.enum_value(receiver(args)?)?;
        let rhs = operand(rt, &args[1])?;
        Ok(Value::Int(op(lhs, rhs)))
    })
}

/// Read a little primitive integer of `size` bytes.
///
/// # Safety
///
/// `ptr` must point to `size` readable bytes holding an integer.
unsafe fn read_discriminant(ptr: *const u8, size: usize, signed: bool) -> Option<i64> {
    unsafe {
        Some(match (size, signed) {
            (1, true) => ptr.cast::<i8>().read() as i64,
            (1, false) => ptr.read() as i64,
            (2, true) => ptr.cast::<i16>().read_unaligned() as i64,
            (2, false) => ptr.cast::<u16>().read_unaligned() as i64,
            (4, true) => ptr.cast::<i32>().read_unaligned() as i64,
            (4, false) => ptr.cast::<u32>().read_unaligned() as i64,
            (8, _) => ptr.cast::<i64>().read_unaligned(),
            _ => return None,
        })
    }
}

impl HostRuntime {
    /// Create an enum type from its registration descriptor.
    pub fn create_enum(&mut self, init: EnumTypeInitDescriptor) -> HostResult<Handle> {
        let EnumTypeInitDescriptor {
            mut type_init,
            is_signed,
            is_arithmetic,
        } = init;
        type_init.type_slots_callback = Some(enum_slots(is_arithmetic));
        let scope = type_init.scope;
        let ty = self.create_type(type_init)?;
        let supplement = self.type_supplement_mut::<EnumSupplement>(ty)?;
        supplement.is_signed = is_signed;
        supplement.scope = Some(scope);
        Ok(ty)
    }

    /// Add an entry to an enum.
    ///
    /// The entry becomes an attribute of the enum type and is appended to
    /// the entry table. The type owns its entries but an entry does not own
    /// its type, so dropping the enclosing scope frees both. An entry kept
    /// past its type's teardown reports a stale type.
    ///
    /// # Safety
    ///
    /// `native` must point to a value of the enum's native type whose
    /// integer value is `value`.
    pub unsafe fn enum_put(
        &mut self,
        ty: Handle,
        name: &str,
        value: i64,
        native: *const u8,
        doc: Option<&str>,
    ) -> HostResult<Handle> {
        let enum_name = self.type_name(ty)?.to_owned();
        let supplement = self
            .type_supplement::<EnumSupplement>(ty)
            .map_err(|_| RegistrationError::NotAnEnum(enum_name.clone()))?;
        let clashes_with_slot = self.type_object(ty)?.attrs.contains_key(name);
        if supplement.entry_by_name(name).is_some() || clashes_with_slot {
            return Err(RegistrationError::DuplicateEnumEntry {
                enum_name,
                value_name: name.to_owned(),
            }
            .into());
        }

        let size = self.type_size(ty)?;
        let object = self.inst_alloc(ty)?;
        // SAFETY: `native` points to a value of the payload type.
        unsafe {
            std::ptr::copy_nonoverlapping(native, self.inst_ptr(object)?.as_ptr(), size);
        }
        self.inst_mark_ready(object)?;
        self.inst_disown_type(object)?;
        self.store_attr(ty, name, Value::Object(object))?;
        self.type_supplement_mut::<EnumSupplement>(ty)?
            .entries
            .push(EnumEntry {
                name: name.to_owned(),
                value,
                doc: doc.map(str::to_owned),
                object,
            });
        debug!(enum_name = %enum_name, entry = name, value, "added enum entry");
        Ok(object)
    }

    /// Expose every entry as an attribute of the enum's scope.
    ///
    /// If any entry name is already taken in the scope, nothing is
    /// installed.
    pub fn enum_export(&mut self, ty: Handle) -> HostResult<()> {
        let enum_name = self.type_name(ty)?.to_owned();
        let supplement = self
            .type_supplement::<EnumSupplement>(ty)
            .map_err(|_| RegistrationError::NotAnEnum(enum_name.clone()))?;
        let scope = supplement.scope.unwrap_or(self.type_scope(ty)?);
        let entries: Vec<(String, Handle)> = supplement
            .entries
            .iter()
            .map(|e| (e.name.clone(), e.object))
            .collect();

        if let Some((name, _)) = entries.iter().find(|(name, _)| self.has_attr(scope, name)) {
            return Err(RegistrationError::ExportCollision {
                enum_name,
                name: name.clone(),
            }
            .into());
        }
        for (name, object) in &entries {
            self.set_attr(scope, name, &Value::Object(*object))?;
        }
        debug!(enum_name = %enum_name, count = entries.len(), "exported enum entries");
        Ok(())
    }

    /// Integer value of an enum instance.
    pub fn enum_value(&self, handle: Handle) -> HostResult<i64> {
        let ty = self.inst_type(handle)?;
        let is_signed = self
            .type_supplement::<EnumSupplement>(ty)
            .map_err(|_| RegistrationError::NotAnEnum(self.type_name(ty).unwrap_or("?").to_owned()))?
            .is_signed;
        let size = self.type_size(ty)?;
        let payload = self.inst_cast_payload_ready(handle)?;
        // SAFETY: enum payloads are primitive integers of `size` bytes.
        unsafe { read_discriminant(payload, size, is_signed) }.ok_or_else(|| {
            HostError::Native(format!("unsupported enum representation of {size} bytes"))
        })
    }

    fn inst_cast_payload_ready(&self, handle: Handle) -> HostResult<*const u8> {
        if !self.inst_ready(handle)? {
            return Err(ConversionError::NotReady {
                type_name: self.inst_name(handle)?,
            }
            .into());
        }
        Ok(self.inst_ptr(handle)?.as_ptr())
    }
}
