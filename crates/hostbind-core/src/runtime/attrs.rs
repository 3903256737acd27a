//! Attribute access, calls and member installation.

use tracing::trace;

use super::{FunctionObject, HostObject, PropertyObject};
use crate::{Handle, HostError, HostResult, HostRuntime, NativeFn, Value};

impl HostRuntime {
    /// Types from `ty` up through its bases.
    pub(crate) fn type_chain(&self, ty: Handle) -> Vec<Handle> {
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(handle) = current {
            match self.heap.get(handle) {
                Some(HostObject::Type(t)) => {
                    chain.push(handle);
                    current = t.base;
                }
                _ => break,
            }
        }
        chain
    }

    /// Look `name` up on `ty` and its bases. The value is borrowed.
    pub(crate) fn find_in_chain(&self, ty: Handle, name: &str) -> Option<Value> {
        self.type_chain(ty).into_iter().find_map(|handle| match self.heap.get(handle) {
            Some(HostObject::Type(t)) => t.attrs.get(name).cloned(),
            _ => None,
        })
    }

    fn display_name(&self, handle: Handle) -> String {
        match self.heap.get(handle) {
            Some(HostObject::Scope(s)) => s.name.clone(),
            Some(HostObject::Type(t)) => t.descriptor.name.clone(),
            Some(HostObject::Instance(i)) => match self.heap.get(i.ty) {
                Some(HostObject::Type(t)) => format!("{} instance", t.descriptor.name),
                _ => "instance".to_owned(),
            },
            Some(HostObject::Function(f)) => f.name.clone(),
            Some(HostObject::Property(p)) => p.name.clone(),
            None => handle.to_string(),
        }
    }

    fn attribute_error(&self, owner: Handle, name: &str) -> HostError {
        HostError::AttributeError {
            owner: self.display_name(owner),
            name: name.to_owned(),
        }
    }

    /// Get an attribute. Properties are evaluated; the result is a new
    /// reference.
    pub fn get_attr(&mut self, owner: Handle, name: &str) -> HostResult<Value> {
        let (found, receiver_type, via_type) = match self.object(owner)? {
            HostObject::Instance(inst) => {
                if let Some(value) = inst.dict.as_ref().and_then(|d| d.get(name)).cloned() {
                    return Ok(self.new_ref(&value));
                }
                let ty = inst.ty;
                (self.find_in_chain(ty, name), ty, false)
            }
            HostObject::Type(_) => (self.find_in_chain(owner, name), owner, true),
            HostObject::Scope(scope) => (scope.attrs.get(name).cloned(), owner, false),
            HostObject::Function(_) | HostObject::Property(_) => (None, owner, false),
        };
        let Some(value) = found else {
            return Err(self.attribute_error(owner, name));
        };

        if let Value::Object(handle) = value
            && let Some(HostObject::Property(prop)) = self.heap.get(handle)
        {
            if !prop.is_static && via_type {
                return Ok(self.new_ref(&value));
            }
            let receiver = if prop.is_static { receiver_type } else { owner };
            return match prop.getter.clone() {
                Some(getter) => getter.call(self, &[Value::Object(receiver)]),
                None => Err(self.attribute_error(owner, name)),
            };
        }
        Ok(self.new_ref(&value))
    }

    pub fn has_attr(&self, owner: Handle, name: &str) -> bool {
        match self.heap.get(owner) {
            Some(HostObject::Instance(inst)) => {
                inst.dict.as_ref().is_some_and(|d| d.contains_key(name))
                    || self.find_in_chain(inst.ty, name).is_some()
            }
            Some(HostObject::Type(_)) => self.find_in_chain(owner, name).is_some(),
            Some(HostObject::Scope(scope)) => scope.attrs.contains_key(name),
            _ => false,
        }
    }

    /// Set an attribute. `value` is borrowed; the attribute table takes its
    /// own reference. Property setters are honored.
    pub fn set_attr(&mut self, owner: Handle, name: &str, value: &Value) -> HostResult<()> {
        let property_owner = match self.object(owner)? {
            HostObject::Instance(inst) => Some((inst.ty, false)),
            HostObject::Type(_) => Some((owner, true)),
            _ => None,
        };

        if let Some((ty, via_type)) = property_owner
            && let Some(Value::Object(handle)) = self.find_in_chain(ty, name)
            && let Some(HostObject::Property(prop)) = self.heap.get(handle)
            && (prop.is_static || !via_type)
        {
            let receiver = if prop.is_static { ty } else { owner };
            return match prop.setter.clone() {
                Some(setter) => {
                    let result = setter.call(self, &[Value::Object(receiver), value.clone()])?;
                    self.release_value(result);
                    Ok(())
                }
                None => Err(HostError::ReadOnlyAttribute {
                    owner: self.display_name(owner),
                    name: name.to_owned(),
                }),
            };
        }

        let value = self.new_ref(value);
        self.store_attr(owner, name, value)
    }

    /// Store `value` in the attribute table of `owner`, transferring the
    /// reference it carries. The replaced value, if any, is released.
    pub(crate) fn store_attr(&mut self, owner: Handle, name: &str, value: Value) -> HostResult<()> {
        let error = match self.heap.get(owner) {
            None => Some(HostError::StaleHandle),
            Some(object) if object.attrs().is_none() => Some(self.attribute_error(owner, name)),
            Some(_) => None,
        };
        if let Some(err) = error {
            self.release_value(value);
            return Err(err);
        }
        let old = self
            .heap
            .get_mut(owner)
            .and_then(HostObject::attrs_mut)
            .and_then(|attrs| attrs.insert(name.to_owned(), value));
        if let Some(old) = old {
            self.release_value(old);
        }
        Ok(())
    }

    /// Call a function or type object.
    ///
    /// Arguments are borrowed; the result is a new reference.
    pub fn call(&mut self, callable: Handle, args: &[Value]) -> HostResult<Value> {
        match self.object(callable)? {
            HostObject::Function(_) => self.dispatch(callable, args),
            HostObject::Type(_) => self.construct(callable, args),
            other => Err(HostError::NotCallable {
                found: other.kind_name(),
            }),
        }
    }

    /// Look up `name` on `owner` and call it. Methods found on an
    /// instance's type receive the instance as their first argument.
    pub fn call_method(&mut self, owner: Handle, name: &str, args: &[Value]) -> HostResult<Value> {
        let (found, bind_self) = match self.object(owner)? {
            HostObject::Instance(inst) => match inst.dict.as_ref().and_then(|d| d.get(name)).cloned() {
                Some(value) => (Some(value), false),
                None => {
                    let ty = inst.ty;
                    (self.find_in_chain(ty, name), true)
                }
            },
            HostObject::Type(_) => (self.find_in_chain(owner, name), false),
            HostObject::Scope(scope) => (scope.attrs.get(name).cloned(), false),
            HostObject::Function(_) | HostObject::Property(_) => (None, false),
        };
        let callable = match found {
            Some(Value::Object(handle)) => handle,
            Some(other) => {
                return Err(HostError::NotCallable {
                    found: other.kind_name(),
                });
            }
            None => return Err(self.attribute_error(owner, name)),
        };

        match self.heap.get(callable) {
            Some(HostObject::Function(func)) if bind_self && func.is_method => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(Value::Object(owner));
                full.extend_from_slice(args);
                self.dispatch(callable, &full)
            }
            _ => self.call(callable, args),
        }
    }

    /// Try each overload in order. Conversion failures fall through to the
    /// next overload; any other outcome is final.
    fn dispatch(&mut self, func: Handle, args: &[Value]) -> HostResult<Value> {
        let (name, overloads) = match self.object(func)? {
            HostObject::Function(f) => (f.name.clone(), f.overloads.clone()),
            other => {
                return Err(HostError::NotCallable {
                    found: other.kind_name(),
                });
            }
        };
        let mut last_error = None;
        for overload in &overloads {
            match overload.call(self, args) {
                Err(HostError::Conversion(err)) => last_error = Some(err),
                result => return result,
            }
        }
        Err(HostError::NoMatchingOverload { name, last_error })
    }

    /// Create an instance of `ty`.
    ///
    /// A `__new__` slot, if present, replaces allocation entirely and
    /// receives the type followed by the arguments. Otherwise a fresh
    /// instance is allocated and passed to `__init__` along with the
    /// arguments; once `__init__` succeeds the instance is ready.
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn construct(&mut self, ty: Handle, args: &[Value]) -> HostResult<Value> {
        if let Some(Value::Object(new_fn)) = self.find_in_chain(ty, "__new__") {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(Value::Object(ty));
            full.extend_from_slice(args);
            return self.call(new_fn, &full);
        }
        let Some(Value::Object(init)) = self.find_in_chain(ty, "__init__") else {
            return Err(HostError::NoInitializer {
                type_name: self.display_name(ty),
            });
        };

        let inst = self.inst_alloc(ty)?;
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(Value::Object(inst));
        full.extend_from_slice(args);
        match self.call(init, &full) {
            Ok(result) => {
                self.release_value(result);
                self.inst_mark_ready(inst)?;
                self.inst_notify_owner(inst)?;
                Ok(Value::Object(inst))
            }
            Err(err) => {
                trace!(%err, "initializer failed; discarding instance");
                self.decref(inst);
                Err(err)
            }
        }
    }

    /// Install a function on a scope or type. An existing function of the
    /// same name gains `func` as a further overload.
    pub fn install_function(
        &mut self,
        owner: Handle,
        name: &str,
        func: NativeFn,
        is_method: bool,
    ) -> HostResult<()> {
        let existing = self
            .object(owner)?
            .attrs()
            .and_then(|attrs| attrs.get(name))
            .and_then(Value::as_handle);
        if let Some(handle) = existing
            && let Some(HostObject::Function(f)) = self.heap.get_mut(handle)
        {
            f.overloads.push(func);
            return Ok(());
        }
        let handle = self.allocate(HostObject::Function(FunctionObject {
            name: name.to_owned(),
            is_method,
            overloads: vec![func],
        }));
        self.store_attr(owner, name, Value::Object(handle))
    }

    /// Install a property on a type. Static properties receive the type as
    /// their first argument, instance properties the instance.
    pub fn install_property(
        &mut self,
        owner: Handle,
        name: &str,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
        is_static: bool,
    ) -> HostResult<()> {
        self.type_object(owner)?;
        let handle = self.allocate(HostObject::Property(PropertyObject {
            name: name.to_owned(),
            getter,
            setter,
            is_static,
        }));
        self.store_attr(owner, name, Value::Object(handle))
    }
}
