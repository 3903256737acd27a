//! Auxiliary objects released together with a host object.

use std::any::Any;
use std::fmt;

use crate::{Handle, HostError, HostResult, HostRuntime};

use super::HostObject;

/// Something kept alive by an instance until its teardown.
pub enum KeepAlive {
    /// A reference to another host object.
    Object(Handle),
    /// An owned native resource, dropped at teardown.
    Resource(Box<dyn Any>),
    /// A release callback, run at teardown. It may re-enter the runtime.
    Callback(Box<dyn FnOnce(&mut HostRuntime)>),
}

impl fmt::Debug for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepAlive::Object(h) => f.debug_tuple("Object").field(h).finish(),
            KeepAlive::Resource(_) => f.write_str("Resource(..)"),
            KeepAlive::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl HostRuntime {
    /// Attach `item` to the instance `nurse`; it is released when `nurse`
    /// is torn down. A `KeepAlive::Object` handle gains a reference here.
    pub fn keep_alive(&mut self, nurse: Handle, item: KeepAlive) -> HostResult<()> {
        match self.heap.get(nurse) {
            Some(HostObject::Instance(_)) => {}
            Some(other) => {
                return Err(HostError::NotAnInstance {
                    found: other.kind_name(),
                });
            }
            None => return Err(HostError::StaleHandle),
        }
        if let KeepAlive::Object(patient) = item
            && !self.heap.add_ref(patient)
        {
            return Err(HostError::StaleHandle);
        }
        if let Some(HostObject::Instance(inst)) = self.heap.get_mut(nurse) {
            inst.keep_alive.push(item);
        }
        Ok(())
    }
}
