//! Generational arena for reference-counted host objects.

use std::fmt;

use super::HostObject;
use crate::Handle;

/// Heap storage for host objects with generational indices.
///
/// When an object's count drops to zero the object is moved out of its slot
/// and handed back to the caller for teardown; the slot's generation is
/// bumped so stale handles are detected.
pub(crate) struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
}

struct HeapSlot {
    generation: u32,
    object: Option<HostObject>,
    ref_count: u32,
}

impl ObjectHeap {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate an object with a reference count of one.
    pub(crate) fn allocate(&mut self, object: HostObject) -> Handle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            slot.ref_count = 1;
            Handle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                object: Some(object),
                ref_count: 1,
            });
            Handle::new(index, 0)
        }
    }

    fn slot(&self, handle: Handle) -> Option<&HeapSlot> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.generation == handle.generation && slot.object.is_some()).then_some(slot)
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut HeapSlot> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.generation == handle.generation && slot.object.is_some()).then_some(slot)
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&HostObject> {
        self.slot(handle)?.object.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut HostObject> {
        self.slot_mut(handle)?.object.as_mut()
    }

    /// Increment the reference count.
    pub(crate) fn add_ref(&mut self, handle: Handle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.ref_count = slot.ref_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Decrement the reference count.
    ///
    /// Returns the object if the count reached zero; the slot is free by
    /// the time the caller sees it.
    pub(crate) fn release(&mut self, handle: Handle) -> Option<HostObject> {
        let slot = self.slot_mut(handle)?;
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count > 0 {
            return None;
        }
        let object = slot.object.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        object
    }

    pub(crate) fn ref_count(&self, handle: Handle) -> Option<u32> {
        self.slot(handle).map(|s| s.ref_count)
    }

    pub(crate) fn is_alive(&self, handle: Handle) -> bool {
        self.slot(handle).is_some()
    }

    /// Live objects and their handles.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Handle, &HostObject)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.object
                .as_ref()
                .map(|object| (Handle::new(index as u32, slot.generation), object))
        })
    }

    /// Remove every live object, leaving the heap empty.
    pub(crate) fn drain(&mut self) -> Vec<(Handle, HostObject)> {
        let mut objects = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(object) = slot.object.take() {
                objects.push((Handle::new(index as u32, slot.generation), object));
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
            }
        }
        objects
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ScopeObject;

    fn scope(name: &str) -> HostObject {
        HostObject::Scope(ScopeObject::new(name))
    }

    #[test]
    fn allocate_and_get() {
        let mut heap = ObjectHeap::new();
        let h = heap.allocate(scope("a"));
        assert!(heap.is_alive(h));
        assert_eq!(heap.ref_count(h), Some(1));
        assert_eq!(heap.get(h).map(HostObject::kind_name), Some("scope"));
    }

    #[test]
    fn release_returns_object_at_zero() {
        let mut heap = ObjectHeap::new();
        let h = heap.allocate(scope("a"));
        assert!(heap.add_ref(h));
        assert!(heap.release(h).is_none());
        assert!(heap.release(h).is_some());
        assert!(!heap.is_alive(h));
        assert!(heap.get(h).is_none());
        assert!(heap.release(h).is_none());
    }

    #[test]
    fn stale_handles_are_detected_after_reuse() {
        let mut heap = ObjectHeap::new();
        let old = heap.allocate(scope("a"));
        let _ = heap.release(old);
        let new = heap.allocate(scope("b"));
        assert_eq!(old.index, new.index);
        assert_ne!(old.generation, new.generation);
        assert!(heap.get(old).is_none());
        assert!(!heap.add_ref(old));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn drain_empties_heap() {
        let mut heap = ObjectHeap::new();
        let a = heap.allocate(scope("a"));
        let _b = heap.allocate(scope("b"));
        assert_eq!(heap.iter().count(), 2);
        let drained = heap.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(heap.len(), 0);
        assert!(!heap.is_alive(a));
    }
}
