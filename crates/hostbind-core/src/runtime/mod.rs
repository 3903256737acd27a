//! The host runtime.
//!
//! [`HostRuntime`] stands in for the dynamically typed host: a generational,
//! reference-counted heap of scopes, types, instances, functions and
//! properties. Every operation takes `&mut self`, which models the host's
//! single-active-thread discipline.
//!
//! ## Reference counting
//!
//! - Values passed as call arguments are borrowed.
//! - Values returned by a call or an attribute lookup carry a new reference.
//! - Attribute tables, parents and keep-alive lists own their references.
//!
//! Teardown is driven by a worklist local to each [`HostRuntime::decref`]
//! call, so native destructors and release callbacks may re-enter the
//! runtime freely.

mod attrs;
mod config;
mod instance;
mod keep_alive;
mod object;
mod object_heap;
mod registry;
mod storage;

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

pub use config::RuntimeConfig;
pub use keep_alive::KeepAlive;

pub(crate) use object::{
    Attrs, FunctionObject, HostObject, InstanceObject, PropertyObject, ScopeObject, TypeObject,
};

use crate::implicit::ImplicitConversions;
use crate::{Handle, HostError, HostResult, NativeTypeId, TypeDescriptor, TypeFlags, Value};
use object::owned_handles;
use object_heap::ObjectHeap;

/// The host object system.
pub struct HostRuntime {
    heap: ObjectHeap,
    /// Bound types by native identity. Not owned: scopes own types.
    types: FxHashMap<NativeTypeId, Handle>,
    pub(crate) implicit: ImplicitConversions,
    config: RuntimeConfig,
}

impl HostRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            heap: ObjectHeap::new(),
            types: FxHashMap::default(),
            implicit: ImplicitConversions::default(),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Create a new, empty scope. The caller owns the returned reference.
    pub fn new_scope(&mut self, name: &str) -> Handle {
        self.heap.allocate(HostObject::Scope(ScopeObject::new(name)))
    }

    /// Add a reference.
    pub fn incref(&mut self, handle: Handle) {
        self.heap.add_ref(handle);
    }

    /// Drop a reference, tearing down every object that becomes unreachable.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn decref(&mut self, handle: Handle) {
        let mut pending = vec![handle];
        while let Some(handle) = pending.pop() {
            if let Some(object) = self.heap.release(handle) {
                self.teardown(handle, object, &mut pending);
            }
        }
    }

    /// Release the reference carried by a returned value, if any.
    pub fn release_value(&mut self, value: Value) {
        if let Value::Object(handle) = value {
            self.decref(handle);
        }
    }

    /// Take a new reference to whatever `value` holds.
    pub fn new_ref(&mut self, value: &Value) -> Value {
        if let Value::Object(handle) = value {
            self.incref(*handle);
        }
        value.clone()
    }

    pub fn ref_count(&self, handle: Handle) -> Option<u32> {
        self.heap.ref_count(handle)
    }

    pub fn is_alive(&self, handle: Handle) -> bool {
        self.heap.is_alive(handle)
    }

    /// Number of live instances of bound types.
    pub fn live_instances(&self) -> usize {
        self.heap
            .iter()
            .filter(|(_, object)| matches!(object, HostObject::Instance(_)))
            .count()
    }

    pub(crate) fn object(&self, handle: Handle) -> HostResult<&HostObject> {
        self.heap.get(handle).ok_or(HostError::StaleHandle)
    }

    pub(crate) fn object_mut(&mut self, handle: Handle) -> HostResult<&mut HostObject> {
        self.heap.get_mut(handle).ok_or(HostError::StaleHandle)
    }

    pub(crate) fn allocate(&mut self, object: HostObject) -> Handle {
        self.heap.allocate(object)
    }

    /// Release one object whose count reached zero. Handles it owned are
    /// queued on `pending`.
    fn teardown(&mut self, handle: Handle, object: HostObject, pending: &mut Vec<Handle>) {
        match object {
            HostObject::Instance(inst) => self.teardown_instance(handle, inst, pending),
            HostObject::Type(ty) => {
                trace!(handle = %handle, name = %ty.descriptor.name, "tearing down type");
                if self.types.get(&ty.descriptor.native_type) == Some(&handle) {
                    self.types.remove(&ty.descriptor.native_type);
                }
                let TypeObject { attrs, base, .. } = *ty;
                if let Some(base) = base
                    && let Some(HostObject::Type(b)) = self.heap.get_mut(base)
                {
                    b.subclasses.retain(|&sub| sub != handle);
                }
                pending.extend(owned_handles(attrs));
                pending.extend(base);
            }
            HostObject::Scope(scope) => pending.extend(owned_handles(scope.attrs)),
            HostObject::Function(_) | HostObject::Property(_) => {}
        }
    }

    fn teardown_instance(&mut self, handle: Handle, inst: InstanceObject, pending: &mut Vec<Handle>) {
        let InstanceObject {
            ty,
            owns_type,
            payload,
            storage,
            ready,
            destruct,
            alias,
            parent,
            keep_alive,
            dict,
        } = inst;

        if destruct && ready {
            // An owned type is still alive. An unowned one may already be gone,
            // which only happens for enum entries with trivial payloads.
            match self.heap.get(ty) {
                Some(HostObject::Type(t)) if t.descriptor.has(TypeFlags::DESTRUCTIBLE) => {
                    trace!(handle = %handle, name = %t.descriptor.name, alias, "destructing instance");
                    if let Some(destruct) = t.descriptor.destruct_for(alias) {
                        // SAFETY: the instance owns a ready payload of this type.
                        unsafe { destruct(payload.as_ptr()) };
                    }
                }
                Some(HostObject::Type(t)) => {
                    warn!(name = %t.descriptor.name, "instance of a non-destructible type leaked its payload");
                }
                _ => {}
            }
        }
        // SAFETY: the payload is not reachable any more.
        unsafe { storage.release(payload) };

        for item in keep_alive {
            match item {
                KeepAlive::Object(patient) => pending.push(patient),
                KeepAlive::Resource(resource) => drop(resource),
                KeepAlive::Callback(callback) => callback(self),
            }
        }
        pending.extend(parent);
        if let Some(dict) = dict {
            pending.extend(owned_handles(dict));
        }
        if owns_type {
            pending.push(ty);
        }
    }
}

impl Default for HostRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HostRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRuntime")
            .field("heap", &self.heap)
            .field("types", &self.types.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for HostRuntime {
    fn drop(&mut self) {
        let leaked = self.live_instances();
        if leaked > 0 && self.config.leak_warnings {
            warn!(count = leaked, "instances still alive at runtime shutdown");
        }
        let objects = self.heap.drain();
        // Descriptors must outlive every instance payload destructed below.
        let descriptors: FxHashMap<Handle, TypeDescriptor> = objects
            .iter()
            .filter_map(|(handle, object)| match object {
                HostObject::Type(t) => Some((*handle, t.descriptor.clone())),
                _ => None,
            })
            .collect();

        for (handle, object) in objects {
            let HostObject::Instance(inst) = object else {
                continue;
            };
            trace!(handle = %handle, "releasing instance at shutdown");
            let callbacks = inst
                .keep_alive
                .iter()
                .filter(|item| matches!(item, KeepAlive::Callback(_)))
                .count();
            if callbacks > 0 {
                trace!(handle = %handle, callbacks, "dropping keep-alive callbacks unrun at shutdown");
            }
            if !self.config.strict_teardown {
                continue;
            }
            if inst.destruct
                && inst.ready
                && let Some(descriptor) = descriptors.get(&inst.ty)
                && descriptor.has(TypeFlags::DESTRUCTIBLE)
                && let Some(destruct) = descriptor.destruct_for(inst.alias)
            {
                // SAFETY: the instance owns a ready payload of this type.
                unsafe { destruct(inst.payload.as_ptr()) };
            }
            // SAFETY: the payload is not reachable any more.
            unsafe { inst.storage.release(inst.payload) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_refcounted() {
        let mut rt = HostRuntime::new();
        let scope = rt.new_scope("m");
        assert_eq!(rt.ref_count(scope), Some(1));
        rt.incref(scope);
        assert_eq!(rt.ref_count(scope), Some(2));
        rt.decref(scope);
        rt.decref(scope);
        assert!(!rt.is_alive(scope));
        assert_eq!(rt.ref_count(scope), None);
    }

    #[test]
    fn tearing_down_scope_releases_attributes() {
        let mut rt = HostRuntime::new();
        let outer = rt.new_scope("outer");
        let inner = rt.new_scope("inner");
        rt.set_attr(outer, "inner", &Value::Object(inner)).unwrap();
        rt.decref(inner);
        assert!(rt.is_alive(inner));
        rt.decref(outer);
        assert!(!rt.is_alive(inner));
    }

    #[test]
    fn new_ref_and_release_value() {
        let mut rt = HostRuntime::new();
        let scope = rt.new_scope("m");
        let v = rt.new_ref(&Value::Object(scope));
        assert_eq!(rt.ref_count(scope), Some(2));
        rt.release_value(v);
        rt.release_value(Value::Int(3));
        assert_eq!(rt.ref_count(scope), Some(1));
    }

    #[test]
    fn shutdown_drops_keep_alive_callbacks_unrun() {
        use std::cell::Cell;
        use std::rc::Rc;

        let ran = Rc::new(Cell::new(false));
        let captured = Rc::clone(&ran);
        {
            let mut rt = HostRuntime::with_config(RuntimeConfig::default().leak_warnings(false));
            let m = rt.new_scope("m");
            let mut data = TypeDescriptor::for_layout::<u32>("Counter", NativeTypeId::of::<u32>());
            data.flags |= TypeFlags::TRIVIAL;
            let ty = rt.create_type(crate::TypeInitDescriptor::new(data, m)).unwrap();
            let inst = rt.inst_alloc_zero(ty).unwrap();
            rt.inst_zero(inst).unwrap();
            rt.keep_alive(inst, KeepAlive::Callback(Box::new(move |_: &mut HostRuntime| captured.set(true))))
                .unwrap();
            assert_eq!(Rc::strong_count(&ran), 2);
        }
        assert!(!ran.get());
        assert_eq!(Rc::strong_count(&ran), 1);
    }

    #[test]
    fn default_config() {
        let rt = HostRuntime::default();
        assert_eq!(*rt.config(), RuntimeConfig::default());
        assert!(rt.config().strict_teardown);
    }
}
