//! Enum builder.
//!
//! ```ignore
//! #[derive(Clone, Copy, TryFromPrimitive, IntoPrimitive)]
//! #[repr(u8)]
//! enum Color { Red, Green, Blue }
//!
//! enum_::<Color>(&mut rt, module, "Color")
//!     .extra(EnumTrait::doc("Primary colors"))
//!     .register()?
//!     .value("RED", Color::Red, None)?
//!     .value("GREEN", Color::Green, None)?
//!     .value("BLUE", Color::Blue, Some("The sky"))?
//!     .export_values()?;
//! ```
//!
//! Enums accept only [`EnumTrait`]s; class traits do not apply:
//!
//! ```compile_fail
//! use hostbind_core::{HostRuntime, TypeTrait};
//! use hostbind_module::enum_;
//!
//! #[derive(Clone, Copy, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
//! #[repr(u8)]
//! enum E { A }
//!
//! let mut rt = HostRuntime::new();
//! let m = rt.new_scope("m");
//! let _ = enum_::<E>(&mut rt, m, "E").extra(TypeTrait::Final);
//! ```

use std::marker::PhantomData;

use hostbind_core::{
    EnumSupplement, EnumTrait, EnumTypeInitDescriptor, Handle, HostResult, HostRuntime, NativeEnum,
};

/// Start binding the enum `T` as `name` in `scope`.
pub fn enum_<'rt, T: NativeEnum>(rt: &'rt mut HostRuntime, scope: Handle, name: &str) -> EnumBuilder<'rt, T> {
    EnumBuilder {
        rt,
        init: EnumTypeInitDescriptor::new::<T>(name, scope),
        _marker: PhantomData,
    }
}

pub struct EnumBuilder<'rt, T> {
    rt: &'rt mut HostRuntime,
    init: EnumTypeInitDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<'rt, T: NativeEnum> EnumBuilder<'rt, T> {
    pub fn extra(mut self, extra: EnumTrait) -> Self {
        extra.apply(&mut self.init);
        self
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn register(self) -> HostResult<Enum<'rt, T>> {
        let handle = self.rt.create_enum(self.init)?;
        Ok(Enum {
            rt: self.rt,
            handle,
            _marker: PhantomData,
        })
    }
}

/// A registered enum.
pub struct Enum<'rt, T> {
    rt: &'rt mut HostRuntime,
    handle: Handle,
    _marker: PhantomData<fn() -> T>,
}

impl<'rt, T: NativeEnum> Enum<'rt, T> {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn finish(self) -> Handle {
        self.handle
    }

    /// Add an entry. Names must be unique within the enum.
    pub fn value(self, name: &str, value: T, doc: Option<&str>) -> HostResult<Self> {
        // SAFETY: `value` is a `T`, the enum's native type.
        unsafe {
            self.rt
                .enum_put(self.handle, name, value.to_i64(), (&raw const value).cast(), doc)?;
        }
        Ok(self)
    }

    /// Expose every entry in the enclosing scope.
    pub fn export_values(self) -> HostResult<Self> {
        self.rt.enum_export(self.handle)?;
        Ok(self)
    }

    /// The entry table.
    pub fn entries(&self) -> HostResult<&EnumSupplement> {
        self.rt.type_supplement::<EnumSupplement>(self.handle)
    }
}

#[cfg(test)]
mod tests {
    use hostbind_core::{HostError, RegistrationError, TypeFlags, Value};
    use num_enum::{IntoPrimitive, TryFromPrimitive};

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, TryFromPrimitive, IntoPrimitive)]
    #[repr(u8)]
    enum Flag {
        Off = 0,
        On = 1,
    }

    #[test]
    fn registers_final_trivial_enum() {
        let mut rt = HostRuntime::new();
        let m = rt.new_scope("m");
        let ty = enum_::<Flag>(&mut rt, m, "Flag")
            .extra(EnumTrait::doc("switch"))
            .register()
            .unwrap()
            .value("OFF", Flag::Off, None)
            .unwrap()
            .value("ON", Flag::On, Some("enabled"))
            .unwrap()
            .finish();

        let flags = rt.type_flags(ty).unwrap();
        assert!(flags.contains(TypeFlags::IS_FINAL | TypeFlags::TRIVIAL));
        assert!(rt.type_descriptor(ty).unwrap().copy.is_none());
        assert_eq!(rt.type_doc(ty), Ok(Some("switch")));
        let entries = &rt.type_supplement::<EnumSupplement>(ty).unwrap().entries;
        assert_eq!(entries[1].doc.as_deref(), Some("enabled"));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn duplicate_entry_is_a_usage_error() {
        let mut rt = HostRuntime::new();
        let m = rt.new_scope("m");
        let ty = enum_::<Flag>(&mut rt, m, "Flag")
            .register()
            .unwrap()
            .value("OFF", Flag::Off, None)
            .unwrap()
            .finish();
        let e = Enum::<Flag> {
            rt: &mut rt,
            handle: ty,
            _marker: PhantomData,
        };
        let err = e.value("OFF", Flag::On, None).err().unwrap();
        assert_eq!(
            err,
            HostError::Registration(RegistrationError::DuplicateEnumEntry {
                enum_name: "Flag".into(),
                value_name: "OFF".into(),
            })
        );
    }

    #[test]
    fn export_collision_installs_nothing() {
        let mut rt = HostRuntime::new();
        let m = rt.new_scope("m");
        rt.set_attr(m, "ON", &Value::Int(1)).unwrap();
        let e = enum_::<Flag>(&mut rt, m, "Flag")
            .register()
            .unwrap()
            .value("OFF", Flag::Off, None)
            .unwrap();
        let e = e.value("ON", Flag::On, None).unwrap();
        assert_eq!(e.entries().unwrap().entries.len(), 2);

        let err = e.export_values().err().unwrap();
        assert!(matches!(
            err,
            HostError::Registration(RegistrationError::ExportCollision { .. })
        ));
        assert!(!rt.has_attr(m, "OFF"));
    }

    #[test]
    fn arithmetic_enums_get_operators() {
        let mut rt = HostRuntime::new();
        let m = rt.new_scope("m");
        let ty = enum_::<Flag>(&mut rt, m, "Flag")
            .extra(EnumTrait::Arithmetic)
            .register()
            .unwrap()
            .value("ON", Flag::On, None)
            .unwrap()
            .finish();
        let on = rt.get_attr(ty, "ON").unwrap().as_handle().unwrap();
        assert_eq!(rt.call_method(on, "__or__", &[Value::Int(2)]), Ok(Value::Int(3)));
    }
}
