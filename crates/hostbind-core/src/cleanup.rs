//! Deferred release of temporaries created during a call.

use crate::{Handle, HostRuntime};

/// Handles of temporaries that must outlive argument conversion.
///
/// Implicit conversions build temporary instances; the caller keeps them
/// here until the native call has returned and then releases them all.
#[derive(Debug, Default)]
#[must_use = "temporaries leak unless the list is released"]
pub struct CleanupList {
    handles: Vec<Handle>,
}

impl CleanupList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of one reference to `handle`.
    pub fn push(&mut self, handle: Handle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release every held reference, most recent first.
    pub fn release(self, rt: &mut HostRuntime) {
        for handle in self.handles.into_iter().rev() {
            rt.decref(handle);
        }
    }
}
