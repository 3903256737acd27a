//! The type registry: creation of bound and host-derived types, and
//! read-only descriptor accessors.

use tracing::debug;

use super::{Attrs, FunctionObject, HostObject, TypeObject};
use crate::{
    Handle, HostError, HostResult, HostRuntime, InitFlags, NativeTypeId, RegistrationError,
    TypeDescriptor, TypeFlags, TypeInitDescriptor, Value,
};

impl HostRuntime {
    pub(crate) fn type_object(&self, ty: Handle) -> HostResult<&TypeObject> {
        match self.object(ty)? {
            HostObject::Type(t) => Ok(t),
            other => Err(HostError::NotAType {
                found: other.kind_name(),
            }),
        }
    }

    fn type_object_mut(&mut self, ty: Handle) -> HostResult<&mut TypeObject> {
        match self.object_mut(ty)? {
            HostObject::Type(t) => Ok(t),
            other => Err(HostError::NotAType {
                found: other.kind_name(),
            }),
        }
    }

    /// Name of a scope or type able to receive a new type.
    fn scope_name(&self, scope: Handle, name: &str) -> HostResult<String> {
        match self.object(scope)? {
            HostObject::Scope(s) => Ok(s.name.clone()),
            HostObject::Type(t) => Ok(t.descriptor.name.clone()),
            other => Err(RegistrationError::InvalidScope {
                name: name.to_owned(),
                found: other.kind_name(),
            }
            .into()),
        }
    }

    fn check_name_free(&self, scope: Handle, scope_name: &str, name: &str) -> HostResult<()> {
        let taken = self
            .object(scope)?
            .attrs()
            .is_some_and(|attrs| attrs.contains_key(name));
        if taken {
            return Err(RegistrationError::NameCollision {
                scope: scope_name.to_owned(),
                name: name.to_owned(),
            }
            .into());
        }
        Ok(())
    }

    fn check_not_final(&self, base: Handle, name: &str) -> HostResult<()> {
        let base_type = self.type_object(base)?;
        if base_type.descriptor.has(TypeFlags::IS_FINAL) {
            return Err(RegistrationError::FinalBase {
                name: name.to_owned(),
                base: base_type.descriptor.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn resolve_base(&self, init: &TypeInitDescriptor) -> HostResult<Option<Handle>> {
        let base = if init.init_flags.contains(InitFlags::HAS_BASE_HANDLE) {
            init.base_handle
        } else if init.init_flags.contains(InitFlags::HAS_BASE) {
            match init.base {
                Some(id) => Some(self.lookup_type(id).ok_or_else(|| RegistrationError::UnknownBase {
                    name: init.name.clone(),
                    base: id.name(),
                })?),
                None => None,
            }
        } else {
            None
        };
        if let Some(base) = base {
            self.check_not_final(base, &init.name)?;
        }
        Ok(base)
    }

    /// Create a bound type from a registration descriptor.
    ///
    /// The descriptor is consumed. Everything is validated before anything
    /// is installed, so on error neither the registry nor the scope has
    /// changed. The new type becomes an attribute of `init.scope`, which
    /// owns it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn create_type(&mut self, init: TypeInitDescriptor) -> HostResult<Handle> {
        let name = init.name.clone();
        let scope = init.scope;
        let scope_name = self.scope_name(scope, &name)?;
        if let Some(existing) = self.lookup_type(init.native_type) {
            return Err(RegistrationError::AlreadyRegistered {
                name: self.type_object(existing)?.descriptor.name.clone(),
                native: init.native_type.name(),
            }
            .into());
        }
        self.check_name_free(scope, &scope_name, &name)?;
        let base = self.resolve_base(&init)?;

        let slots = init.collect_slots();
        let supplement = init.supplement.map(|spec| (spec.init)());
        let doc = init.doc.clone();
        let descriptor = init.into_data();
        let native_type = descriptor.native_type;
        let flags = descriptor.flags;

        let mut attrs = Attrs::default();
        if let Some(doc) = &doc {
            attrs.insert("__doc__".to_owned(), Value::Str(doc.clone()));
        }
        for slot in slots {
            let func = self.allocate(HostObject::Function(FunctionObject {
                name: slot.name.to_owned(),
                is_method: true,
                overloads: vec![slot.func],
            }));
            if let Some(old) = attrs.insert(slot.name.to_owned(), Value::Object(func)) {
                self.release_value(old);
            }
        }
        if let Some(base) = base {
            self.incref(base);
        }

        let handle = self.allocate(HostObject::Type(Box::new(TypeObject {
            descriptor,
            scope,
            base,
            attrs,
            doc,
            supplement,
            subclasses: Vec::new(),
        })));
        self.types.insert(native_type, handle);
        self.store_attr(scope, &name, Value::Object(handle))?;
        debug!(
            name = %name,
            scope = %scope_name,
            native = native_type.name(),
            ?flags,
            "registered type"
        );
        Ok(handle)
    }

    /// Create a host-language subclass of `base` in `scope`.
    ///
    /// The subclass shares the base's descriptor (same payload layout,
    /// hooks and alias hooks), is flagged `IS_HOST_DERIVED`, and has dynamic
    /// attributes. The base forgets the subclass when it is torn down.
    pub fn create_subclass(&mut self, scope: Handle, name: &str, base: Handle) -> HostResult<Handle> {
        let scope_name = self.scope_name(scope, name)?;
        self.check_name_free(scope, &scope_name, name)?;
        self.check_not_final(base, name)?;

        let mut descriptor = self.type_object(base)?.descriptor.clone();
        descriptor.name = name.to_owned();
        descriptor.flags |= TypeFlags::IS_HOST_DERIVED | TypeFlags::HAS_DYNAMIC_ATTR;

        self.incref(base);
        let handle = self.allocate(HostObject::Type(Box::new(TypeObject {
            descriptor,
            scope,
            base: Some(base),
            attrs: Attrs::default(),
            doc: None,
            supplement: None,
            subclasses: Vec::new(),
        })));
        self.type_object_mut(base)?.subclasses.push(handle);
        self.store_attr(scope, name, Value::Object(handle))?;
        debug!(name, scope = %scope_name, "created host subclass");
        Ok(handle)
    }

    /// The bound type for a native identity, if registered and alive.
    pub fn lookup_type(&self, native: NativeTypeId) -> Option<Handle> {
        self.types
            .get(&native)
            .copied()
            .filter(|handle| self.is_alive(*handle))
    }

    /// Whether `handle` refers to a bound type.
    pub fn type_check(&self, handle: Handle) -> bool {
        matches!(self.heap.get(handle), Some(HostObject::Type(_)))
    }

    /// The permanent descriptor of a type.
    pub fn type_descriptor(&self, ty: Handle) -> HostResult<&TypeDescriptor> {
        Ok(&self.type_object(ty)?.descriptor)
    }

    pub fn type_size(&self, ty: Handle) -> HostResult<usize> {
        Ok(self.type_descriptor(ty)?.size as usize)
    }

    pub fn type_align(&self, ty: Handle) -> HostResult<usize> {
        Ok(self.type_descriptor(ty)?.align as usize)
    }

    /// Native identity of the bound type.
    pub fn type_info(&self, ty: Handle) -> HostResult<NativeTypeId> {
        Ok(self.type_descriptor(ty)?.native_type)
    }

    pub fn type_name(&self, ty: Handle) -> HostResult<&str> {
        Ok(&self.type_descriptor(ty)?.name)
    }

    /// Descriptor flags, plus `HAS_IMPLICIT_CONVERSIONS` when conversions
    /// into the type are registered.
    pub fn type_flags(&self, ty: Handle) -> HostResult<TypeFlags> {
        let descriptor = self.type_descriptor(ty)?;
        let mut flags = descriptor.flags;
        if self.implicit.has_any(descriptor.native_type) {
            flags |= TypeFlags::HAS_IMPLICIT_CONVERSIONS;
        }
        Ok(flags)
    }

    pub fn type_doc(&self, ty: Handle) -> HostResult<Option<&str>> {
        Ok(self.type_object(ty)?.doc.as_deref())
    }

    /// The base type, if any.
    pub fn type_base(&self, ty: Handle) -> HostResult<Option<Handle>> {
        Ok(self.type_object(ty)?.base)
    }

    /// Host-derived subclasses, in creation order.
    pub fn type_subclasses(&self, ty: Handle) -> HostResult<&[Handle]> {
        Ok(&self.type_object(ty)?.subclasses)
    }

    /// The scope the type was registered in.
    pub fn type_scope(&self, ty: Handle) -> HostResult<Handle> {
        Ok(self.type_object(ty)?.scope)
    }

    /// The supplement region, if one of type `S` was reserved.
    pub fn type_supplement<S: 'static>(&self, ty: Handle) -> HostResult<&S> {
        let t = self.type_object(ty)?;
        t.supplement
            .as_ref()
            .and_then(|region| region.downcast_ref::<S>())
            .ok_or_else(|| HostError::NoSupplement {
                type_name: t.descriptor.name.clone(),
            })
    }

    pub fn type_supplement_mut<S: 'static>(&mut self, ty: Handle) -> HostResult<&mut S> {
        let t = self.type_object_mut(ty)?;
        let type_name = t.descriptor.name.clone();
        t.supplement
            .as_mut()
            .and_then(|region| region.downcast_mut::<S>())
            .ok_or(HostError::NoSupplement { type_name })
    }

    /// Look up a slot or other attribute on a type and its bases. The
    /// result is a new reference.
    pub fn type_get_slot(&mut self, ty: Handle, name: &str) -> HostResult<Option<Value>> {
        self.type_object(ty)?;
        Ok(self.find_in_chain(ty, name).map(|value| self.new_ref(&value)))
    }
}
