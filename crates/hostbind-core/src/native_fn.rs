//! Type-erased native callables.

use std::fmt;
use std::sync::Arc;

use crate::{HostResult, HostRuntime, Value};

/// Type-erased native function.
///
/// Receives the runtime and the borrowed argument list and returns a new
/// reference. The callable is shared behind an `Arc` so overload tables can
/// be cloned cheaply before dispatch.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<dyn Fn(&mut HostRuntime, &[Value]) -> HostResult<Value> + Send + Sync>,
}

impl NativeFn {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut HostRuntime, &[Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Call this function.
    #[inline]
    pub fn call(&self, rt: &mut HostRuntime, args: &[Value]) -> HostResult<Value> {
        (self.inner)(rt, args)
    }

    /// Whether two `NativeFn`s share the same callable.
    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A wrapper that drops the first argument before calling `self`.
    ///
    /// Used for static members reached through a type object, which receive
    /// the type as their first argument.
    pub fn skip_first(self) -> NativeFn {
        NativeFn::new(move |rt, args| self.call(rt, args.get(1..).unwrap_or(&[])))
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}
