//! The implicit conversion registry.
//!
//! For every target type, an ordered list of sources that may be converted
//! into it by constructing a temporary target from the host value. Sources
//! are tried in registration order and the first successful construction
//! wins.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::{CleanupList, Handle, HostRuntime, NativeTypeId, Value};

/// Check whether a host value is acceptable as a conversion source. Any
/// temporaries it creates go on the supplied cleanup list.
pub type ImplicitPredicate = fn(&mut HostRuntime, &Value, &mut CleanupList) -> bool;

/// One registered conversion source.
#[derive(Clone, Copy, Debug)]
pub enum ImplicitSource {
    /// Instances of this bound type.
    Type(NativeTypeId),
    /// Values accepted by a caster-delegated predicate.
    Predicate(ImplicitPredicate),
}

/// Per-target source lists.
#[derive(Debug, Default)]
pub(crate) struct ImplicitConversions {
    by_target: FxHashMap<NativeTypeId, Vec<ImplicitSource>>,
}

impl ImplicitConversions {
    pub(crate) fn register(&mut self, target: NativeTypeId, source: ImplicitSource) {
        self.by_target.entry(target).or_default().push(source);
    }

    pub(crate) fn sources(&self, target: NativeTypeId) -> &[ImplicitSource] {
        self.by_target.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn has_any(&self, target: NativeTypeId) -> bool {
        !self.sources(target).is_empty()
    }
}

impl HostRuntime {
    /// Register `source` as implicitly convertible into `target`.
    pub fn implicitly_convertible(&mut self, target: NativeTypeId, source: ImplicitSource) {
        trace!(target = %target, ?source, "registering implicit conversion");
        self.implicit.register(target, source);
    }

    /// Try to convert `value` into an instance of the bound type `target`.
    ///
    /// On success the temporary instance is pushed onto `cleanup` and its
    /// handle returned. On failure nothing is created and `cleanup` is left
    /// untouched.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn try_implicit(
        &mut self,
        target: NativeTypeId,
        value: &Value,
        cleanup: &mut CleanupList,
    ) -> Option<Handle> {
        let target_type = self.lookup_type(target)?;
        for source in self.implicit.sources(target).to_vec() {
            let matched = match source {
                ImplicitSource::Type(id) => self.value_is_instance_of(value, id),
                ImplicitSource::Predicate(predicate) => {
                    let mut scratch = CleanupList::new();
                    let ok = predicate(self, value, &mut scratch);
                    scratch.release(self);
                    ok
                }
            };
            if !matched {
                continue;
            }
            match self.call(target_type, std::slice::from_ref(value)) {
                Ok(Value::Object(temp)) => {
                    cleanup.push(temp);
                    return Some(temp);
                }
                Ok(other) => self.release_value(other),
                Err(err) => {
                    trace!(target = %target, %err, "implicit conversion attempt failed");
                }
            }
        }
        None
    }

    fn value_is_instance_of(&self, value: &Value, id: NativeTypeId) -> bool {
        match value {
            Value::Object(handle) => self.inst_is_a(*handle, id),
            _ => false,
        }
    }
}
