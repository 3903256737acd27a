//! The instance lifecycle facade.
//!
//! Every instance carries two state bits:
//!
//! | `ready` | `destruct` | meaning |
//! |---|---|---|
//! | false | true | allocated, payload not yet constructed |
//! | true | true | owns a constructed payload, destructs it at teardown |
//! | true | false | refers to a payload owned elsewhere |
//! | false | false | payload already destroyed by hand |
//!
//! Teardown runs the destruct hook at most once, only when both bits are
//! set. These methods are the only way other layers touch instance state.

use std::ptr::{self, NonNull};

use tracing::trace;

use super::storage::{self, Storage};
use super::{Attrs, HostObject, InstanceObject};
use crate::{
    ConversionError, Handle, HostError, HostResult, HostRuntime, NativeTypeId, TypeDescriptor,
    TypeFlags,
};

/// Copyable snapshot of an instance's state.
#[derive(Clone, Copy)]
struct InstanceState {
    ty: Handle,
    payload: NonNull<u8>,
    ready: bool,
    destruct: bool,
    alias: bool,
}

impl HostRuntime {
    fn instance(&self, handle: Handle) -> HostResult<&InstanceObject> {
        match self.object(handle)? {
            HostObject::Instance(inst) => Ok(inst),
            other => Err(HostError::NotAnInstance {
                found: other.kind_name(),
            }),
        }
    }

    fn instance_mut(&mut self, handle: Handle) -> HostResult<&mut InstanceObject> {
        match self.object_mut(handle)? {
            HostObject::Instance(inst) => Ok(inst),
            other => Err(HostError::NotAnInstance {
                found: other.kind_name(),
            }),
        }
    }

    fn instance_state(&self, handle: Handle) -> HostResult<InstanceState> {
        let inst = self.instance(handle)?;
        Ok(InstanceState {
            ty: inst.ty,
            payload: inst.payload,
            ready: inst.ready,
            destruct: inst.destruct,
            alias: inst.alias,
        })
    }

    fn wrap_payload(
        &mut self,
        ty: Handle,
        payload: NonNull<u8>,
        storage: Storage,
        ready: bool,
        destruct: bool,
        parent: Option<Handle>,
    ) -> HostResult<Handle> {
        let dynamic = self.type_descriptor(ty)?.has(TypeFlags::HAS_DYNAMIC_ATTR);
        if let Some(parent) = parent
            && !self.is_alive(parent)
        {
            return Err(HostError::StaleHandle);
        }
        self.incref(ty);
        if let Some(parent) = parent {
            self.incref(parent);
        }
        let handle = self.allocate(HostObject::Instance(InstanceObject {
            ty,
            owns_type: true,
            payload,
            storage,
            ready,
            destruct,
            alias: false,
            parent,
            keep_alive: Vec::new(),
            dict: dynamic.then(Attrs::default),
        }));
        trace!(handle = %handle, ty = %ty, ready, destruct, "wrapped instance");
        Ok(handle)
    }

    fn alloc_instance(&mut self, ty: Handle, zeroed: bool) -> HostResult<Handle> {
        let layout = self.type_descriptor(ty)?.layout();
        let payload = storage::allocate(layout, zeroed);
        self.wrap_payload(ty, payload, Storage::Inline(layout), false, true, None)
    }

    /// Whether `handle` is an instance of a bound type.
    pub fn inst_check(&self, handle: Handle) -> bool {
        matches!(self.heap.get(handle), Some(HostObject::Instance(_)))
    }

    /// The instance's type.
    pub fn inst_type(&self, handle: Handle) -> HostResult<Handle> {
        Ok(self.instance(handle)?.ty)
    }

    /// Qualified name of the instance's type, e.g. `geometry.Point`.
    pub fn inst_name(&self, handle: Handle) -> HostResult<String> {
        let ty = self.instance(handle)?.ty;
        let t = self.type_object(ty)?;
        let scope = match self.heap.get(t.scope) {
            Some(HostObject::Scope(s)) => Some(s.name.as_str()),
            Some(HostObject::Type(outer)) => Some(outer.descriptor.name.as_str()),
            _ => None,
        };
        Ok(match scope {
            Some(scope) => format!("{scope}.{}", t.descriptor.name),
            None => t.descriptor.name.clone(),
        })
    }

    /// Allocate an instance with uninitialized payload: not ready, owning.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn inst_alloc(&mut self, ty: Handle) -> HostResult<Handle> {
        self.alloc_instance(ty, false)
    }

    /// Allocate an instance with zeroed payload: not ready, owning.
    pub fn inst_alloc_zero(&mut self, ty: Handle) -> HostResult<Handle> {
        self.alloc_instance(ty, true)
    }

    /// Wrap a constructed payload and take ownership of it. The instance is
    /// ready and frees the memory at teardown.
    ///
    /// # Safety
    ///
    /// `ptr` must come from the global allocator with the layout of the
    /// type's descriptor, hold a constructed value of the bound type, and
    /// not be used by anyone else afterwards.
    pub unsafe fn inst_take_ownership(&mut self, ty: Handle, ptr: NonNull<u8>) -> HostResult<Handle> {
        let layout = self.type_descriptor(ty)?.layout();
        let handle = self.wrap_payload(ty, ptr, Storage::Adopted(layout), true, true, None)?;
        self.inst_notify_owner(handle)?;
        Ok(handle)
    }

    /// Safe form of [`inst_take_ownership`](Self::inst_take_ownership) for
    /// a boxed value. `T` must be the bound type and the payload layout.
    pub fn inst_take_ownership_boxed<T: 'static>(&mut self, ty: Handle, value: Box<T>) -> HostResult<Handle> {
        let descriptor = self.type_descriptor(ty)?;
        if descriptor.native_type != NativeTypeId::of::<T>()
            || descriptor.layout() != std::alloc::Layout::new::<T>()
        {
            return Err(ConversionError::TypeMismatch {
                expected: descriptor.name.clone(),
                actual: std::any::type_name::<T>().to_owned(),
            }
            .into());
        }
        let ptr = NonNull::from(Box::leak(value)).cast::<u8>();
        // SAFETY: the box was allocated by the global allocator with T's
        // layout, which is the descriptor's layout.
        unsafe { self.inst_take_ownership(ty, ptr) }
    }

    /// Wrap a payload owned elsewhere. The instance is ready and never
    /// destructs or frees it. `parent`, if given, is kept alive for as long
    /// as the instance lives.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a constructed value of the bound type that stays
    /// valid for as long as the instance is used; typically it is owned by
    /// `parent`.
    pub unsafe fn inst_reference(
        &mut self,
        ty: Handle,
        ptr: NonNull<u8>,
        parent: Option<Handle>,
    ) -> HostResult<Handle> {
        let handle = self.wrap_payload(ty, ptr, Storage::Borrowed, true, false, parent)?;
        self.inst_notify_owner(handle)?;
        Ok(handle)
    }

    /// Zero the payload and mark it ready and owned.
    pub fn inst_zero(&mut self, handle: Handle) -> HostResult<()> {
        let state = self.instance_state(handle)?;
        let size = self.type_descriptor(state.ty)?.size as usize;
        // SAFETY: the payload spans `size` bytes.
        unsafe { ptr::write_bytes(state.payload.as_ptr(), 0, size) };
        self.instance_mut(handle)?.alias = false;
        self.inst_set_state(handle, true, true)
    }

    pub fn inst_set_state(&mut self, handle: Handle, ready: bool, destruct: bool) -> HostResult<()> {
        let inst = self.instance_mut(handle)?;
        inst.ready = ready;
        inst.destruct = destruct;
        Ok(())
    }

    /// Shorthand for `inst_set_state(handle, true, true)`.
    pub fn inst_mark_ready(&mut self, handle: Handle) -> HostResult<()> {
        self.inst_set_state(handle, true, true)
    }

    pub fn inst_ready(&self, handle: Handle) -> HostResult<bool> {
        Ok(self.instance(handle)?.ready)
    }

    /// `(ready, destruct)`.
    pub fn inst_state(&self, handle: Handle) -> HostResult<(bool, bool)> {
        let inst = self.instance(handle)?;
        Ok((inst.ready, inst.destruct))
    }

    /// Record that the payload is being built as the class's alias type, so
    /// teardown and copies use the alias hooks. Call before marking ready.
    pub fn inst_mark_alias(&mut self, handle: Handle) -> HostResult<()> {
        let ty = self.instance(handle)?.ty;
        let descriptor = self.type_descriptor(ty)?;
        if descriptor.alias.is_none() {
            return Err(HostError::MissingCapability {
                type_name: descriptor.name.clone(),
                capability: "alias",
            });
        }
        self.instance_mut(handle)?.alias = true;
        Ok(())
    }

    /// Whether the payload holds the class's alias type.
    pub fn inst_holds_alias(&self, handle: Handle) -> HostResult<bool> {
        Ok(self.instance(handle)?.alias)
    }

    /// Stop `handle` from owning a reference to its type. The type's
    /// attributes may then hold the instance without forming a cycle.
    pub(crate) fn inst_disown_type(&mut self, handle: Handle) -> HostResult<()> {
        let inst = self.instance_mut(handle)?;
        if !inst.owns_type {
            return Ok(());
        }
        inst.owns_type = false;
        let ty = inst.ty;
        self.decref(ty);
        Ok(())
    }

    /// Record that the payload was destroyed by hand, so teardown must not
    /// destruct it again.
    pub fn inst_set_destroyed(&mut self, handle: Handle) -> HostResult<()> {
        self.inst_set_state(handle, false, false)
    }

    /// Destruct the payload now, if it is ready and owned. The instance
    /// stays allocated and is no longer ready.
    pub fn inst_destruct(&mut self, handle: Handle) -> HostResult<()> {
        let state = self.instance_state(handle)?;
        if !state.ready {
            return Ok(());
        }
        let descriptor = self.type_descriptor(state.ty)?;
        if !descriptor.has(TypeFlags::DESTRUCTIBLE) {
            return Err(HostError::MissingCapability {
                type_name: descriptor.name.clone(),
                capability: "destructible",
            });
        }
        if state.destruct
            && let Some(destruct) = descriptor.destruct_for(state.alias)
        {
            // SAFETY: the payload is ready and owned by this instance.
            unsafe { destruct(state.payload.as_ptr()) };
        }
        let inst = self.instance_mut(handle)?;
        inst.ready = false;
        inst.alias = false;
        Ok(())
    }

    /// Validate a copy or move from `src` into `dst` and return the source
    /// descriptor.
    fn check_transfer(
        &self,
        dst: &InstanceState,
        src: &InstanceState,
        op: &'static str,
        capability: TypeFlags,
    ) -> HostResult<&TypeDescriptor> {
        let dst_descriptor = self.type_descriptor(dst.ty)?;
        let src_descriptor = self.type_descriptor(src.ty)?;
        if dst_descriptor.native_type != src_descriptor.native_type
            || dst_descriptor.size != src_descriptor.size
        {
            return Err(HostError::TypeMismatch {
                op,
                dst: dst_descriptor.name.clone(),
                src: src_descriptor.name.clone(),
            });
        }
        let capable = if capability == TypeFlags::COPY_CONSTRUCTIBLE {
            src_descriptor.copy_for(src.alias).is_some()
        } else {
            src_descriptor.has(capability)
        };
        if !capable {
            return Err(HostError::MissingCapability {
                type_name: src_descriptor.name.clone(),
                capability: if op == "copy" {
                    "copy-constructible"
                } else {
                    "move-constructible"
                },
            });
        }
        if !src.ready {
            return Err(ConversionError::NotReady {
                type_name: src_descriptor.name.clone(),
            }
            .into());
        }
        Ok(src_descriptor)
    }

    /// Copy-construct the payload of `src` into the (unconstructed) payload
    /// of `dst`, then mark `dst` ready. Uses the copy hook, or a byte copy
    /// when copying is trivial.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn inst_copy(&mut self, dst: Handle, src: Handle) -> HostResult<()> {
        if dst == src {
            return Ok(());
        }
        let d = self.instance_state(dst)?;
        let s = self.instance_state(src)?;
        let descriptor = self.check_transfer(&d, &s, "copy", TypeFlags::COPY_CONSTRUCTIBLE)?;
        // SAFETY: both payloads span `size` bytes of the same type; `dst`
        // is unconstructed and distinct from `src`.
        unsafe {
            match descriptor.copy_for(s.alias).flatten() {
                Some(copy) => copy(d.payload.as_ptr(), s.payload.as_ptr()),
                None => ptr::copy_nonoverlapping(
                    s.payload.as_ptr(),
                    d.payload.as_ptr(),
                    descriptor.size as usize,
                ),
            }
        }
        self.instance_mut(dst)?.alias = s.alias;
        self.inst_mark_ready(dst)
    }

    /// Move-construct the payload of `src` into the (unconstructed) payload
    /// of `dst`, then mark `dst` ready. A bitwise move leaves `src`
    /// unconstructed, so `src` is marked not ready.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn inst_move(&mut self, dst: Handle, src: Handle) -> HostResult<()> {
        if dst == src {
            return Ok(());
        }
        let d = self.instance_state(dst)?;
        let s = self.instance_state(src)?;
        let descriptor = self.check_transfer(&d, &s, "move", TypeFlags::MOVE_CONSTRUCTIBLE)?;
        let hooked = descriptor.move_fn;
        // SAFETY: as for `inst_copy`.
        unsafe {
            match hooked {
                Some(move_fn) => move_fn(d.payload.as_ptr(), s.payload.as_ptr()),
                None => ptr::copy_nonoverlapping(
                    s.payload.as_ptr(),
                    d.payload.as_ptr(),
                    descriptor.size as usize,
                ),
            }
        }
        if hooked.is_none() {
            let src_inst = self.instance_mut(src)?;
            src_inst.ready = false;
            src_inst.alias = false;
        }
        self.instance_mut(dst)?.alias = s.alias;
        self.inst_mark_ready(dst)
    }

    /// Destruct the payload of `dst`, then copy `src` into it. Does nothing
    /// when `dst` and `src` are the same instance.
    pub fn inst_replace_copy(&mut self, dst: Handle, src: Handle) -> HostResult<()> {
        if dst == src {
            return Ok(());
        }
        let d = self.instance_state(dst)?;
        let s = self.instance_state(src)?;
        self.check_transfer(&d, &s, "copy", TypeFlags::COPY_CONSTRUCTIBLE)?;
        self.inst_destruct(dst)?;
        self.inst_copy(dst, src)
    }

    /// Destruct the payload of `dst`, then move `src` into it. Does nothing
    /// when `dst` and `src` are the same instance.
    pub fn inst_replace_move(&mut self, dst: Handle, src: Handle) -> HostResult<()> {
        if dst == src {
            return Ok(());
        }
        let d = self.instance_state(dst)?;
        let s = self.instance_state(src)?;
        self.check_transfer(&d, &s, "move", TypeFlags::MOVE_CONSTRUCTIBLE)?;
        self.inst_destruct(dst)?;
        self.inst_move(dst, src)
    }

    /// Raw payload pointer. The caller is responsible for checking state.
    pub fn inst_ptr(&self, handle: Handle) -> HostResult<NonNull<u8>> {
        Ok(self.instance(handle)?.payload)
    }

    /// Whether the instance's type is a host-language subclass.
    pub fn inst_host_derived(&self, handle: Handle) -> HostResult<bool> {
        let ty = self.instance(handle)?.ty;
        Ok(self.type_descriptor(ty)?.has(TypeFlags::IS_HOST_DERIVED))
    }

    /// Whether `handle` is an instance whose type, or one of its bases,
    /// binds the native type `native`.
    pub fn inst_is_a(&self, handle: Handle, native: NativeTypeId) -> bool {
        let Ok(inst) = self.instance(handle) else {
            return false;
        };
        self.type_chain(inst.ty).into_iter().any(|ty| {
            self.type_descriptor(ty)
                .is_ok_and(|descriptor| descriptor.native_type == native)
        })
    }

    fn typed_payload<T: 'static>(&self, handle: Handle, want_ready: bool) -> HostResult<NonNull<T>> {
        let state = self.instance_state(handle)?;
        let descriptor = self.type_descriptor(state.ty)?;
        if !self.inst_is_a(handle, NativeTypeId::of::<T>()) {
            return Err(ConversionError::TypeMismatch {
                expected: std::any::type_name::<T>().to_owned(),
                actual: descriptor.name.clone(),
            }
            .into());
        }
        if state.ready != want_ready {
            return Err(if want_ready {
                ConversionError::NotReady {
                    type_name: descriptor.name.clone(),
                }
                .into()
            } else {
                HostError::Native(format!("'{}' instance is already initialized", descriptor.name))
            });
        }
        Ok(state.payload.cast())
    }

    /// Payload of a ready instance as a `T`, where `T` is the instance's
    /// bound type or one of its registered bases.
    pub fn inst_cast_ptr<T: 'static>(&self, handle: Handle) -> HostResult<NonNull<T>> {
        self.typed_payload(handle, true)
    }

    /// Payload of a not-yet-constructed instance, for initializers.
    pub fn inst_uninit_ptr<T: 'static>(&self, handle: Handle) -> HostResult<NonNull<T>> {
        self.typed_payload(handle, false)
    }

    /// Tell a ready payload which handle owns it, through the type's
    /// intrusive and weak-reference hooks.
    pub fn inst_notify_owner(&mut self, handle: Handle) -> HostResult<()> {
        let state = self.instance_state(handle)?;
        if !state.ready {
            return Ok(());
        }
        let descriptor = self.type_descriptor(state.ty)?;
        // SAFETY: the payload is ready and of this type.
        unsafe {
            if let Some(set_self) = descriptor.set_self {
                set_self(state.payload.as_ptr(), handle);
            }
            if let Some(set_weak) = descriptor.set_weak {
                set_weak(state.payload.as_ptr(), handle);
            }
        }
        Ok(())
    }

    /// Run the type's shared-ownership keep-alive hook on an instance.
    ///
    /// Returns whether a shared owner was found and attached.
    pub fn keep_shared_alive(&mut self, handle: Handle) -> HostResult<bool> {
        let ty = self.instance(handle)?.ty;
        let descriptor = self.type_descriptor(ty)?;
        let Some(hook) = descriptor.keep_shared_alive else {
            return Err(HostError::MissingCapability {
                type_name: descriptor.name.clone(),
                capability: "shared-from-this",
            });
        };
        Ok(hook(self, handle))
    }
}
