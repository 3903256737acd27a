//! Payload memory.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Where an instance's payload lives and who frees it.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Storage {
    /// Allocated by the runtime for the instance.
    Inline(Layout),
    /// Allocated elsewhere with the global allocator and handed over.
    Adopted(Layout),
    /// Owned by someone else; never freed here.
    Borrowed,
}

impl Storage {
    /// Free the payload memory. Does not run any destructor.
    ///
    /// # Safety
    ///
    /// `ptr` must be the payload this storage was created for, and must not
    /// be used afterwards.
    pub(crate) unsafe fn release(self, ptr: NonNull<u8>) {
        match self {
            Storage::Inline(layout) | Storage::Adopted(layout) if layout.size() != 0 => unsafe {
                alloc::dealloc(ptr.as_ptr(), layout)
            },
            _ => {}
        }
    }
}

/// Allocate payload memory for `layout`.
///
/// Zero-sized payloads get a dangling, well-aligned pointer.
pub(crate) fn allocate(layout: Layout, zeroed: bool) -> NonNull<u8> {
    if layout.size() == 0 {
        return dangling(layout);
    }
    // SAFETY: the layout has a non-zero size.
    let ptr = unsafe {
        if zeroed {
            alloc::alloc_zeroed(layout)
        } else {
            alloc::alloc(layout)
        }
    };
    match NonNull::new(ptr) {
        Some(ptr) => ptr,
        None => alloc::handle_alloc_error(layout),
    }
}

pub(crate) fn dangling(layout: Layout) -> NonNull<u8> {
    // Alignment is never zero.
    NonNull::new(std::ptr::without_provenance_mut(layout.align())).unwrap_or(NonNull::dangling())
}
