//! Per-frame-in-flight partitioning of render object maps.

use super::map::{RenderObjectMap, SharedObjectMap};
use super::object::ObjectId;

/// One [`RenderObjectMap`] per in-flight frame slot.
///
/// Frame `n` uses slot `n % len`, so objects still referenced by a frame the
/// GPU hasn't finished are never handed to the next one.
pub struct ObjectMapSlots {
    slots: Vec<SharedObjectMap>,
}

impl ObjectMapSlots {
    /// Create `frames_in_flight` maps (at least one) using `factory`.
    pub fn new(frames_in_flight: usize, mut factory: impl FnMut(usize) -> RenderObjectMap) -> Self {
        let count = frames_in_flight.max(1);
        let slots = (0..count).map(|slot| factory(slot).shared()).collect();
        log::debug!("Created {} render object map slots", count);
        Self { slots }
    }

    /// Wrap a single shared map.
    pub fn single(map: SharedObjectMap) -> Self {
        Self { slots: vec![map] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Map used by the given frame.
    pub fn for_frame(&self, frame_index: u64) -> &SharedObjectMap {
        &self.slots[(frame_index % self.slots.len() as u64) as usize]
    }

    pub fn slot(&self, index: usize) -> Option<&SharedObjectMap> {
        self.slots.get(index)
    }

    /// Flush every slot.
    pub fn flush_all(&self, max_age_frames: u64) -> Vec<ObjectId> {
        self.slots
            .iter()
            .flat_map(|map| map.lock().flush(max_age_frames))
            .collect()
    }

    /// Shut down every slot. Returns the total number of disposed objects.
    pub fn shutdown_all(&self) -> usize {
        self.slots.iter().map(|map| map.lock().shutdown()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyAllocator;
    use crate::resource::{ResourceDef, ResourceShape};
    use crate::types::BufferUsage;
    use std::sync::Arc;

    #[test]
    fn test_round_robin() {
        let slots = ObjectMapSlots::new(3, |_| RenderObjectMap::new(DummyAllocator::new()));
        assert_eq!(slots.len(), 3);
        assert!(Arc::ptr_eq(slots.for_frame(1), slots.for_frame(4)));
        assert!(!Arc::ptr_eq(slots.for_frame(1), slots.for_frame(2)));
    }

    #[test]
    fn test_slots_do_not_share_objects() {
        let slots = ObjectMapSlots::new(2, |_| RenderObjectMap::new(DummyAllocator::new()));
        let def = ResourceDef::new(ResourceShape::buffer(64, BufferUsage::UNIFORM));

        let a = slots.for_frame(0).lock().acquire(&def).unwrap();
        slots.for_frame(0).lock().release(a).unwrap();
        slots.for_frame(1).lock().acquire(&def).unwrap();

        assert_eq!(slots.for_frame(0).lock().len(), 1);
        assert_eq!(slots.for_frame(1).lock().len(), 1);
        assert_eq!(slots.shutdown_all(), 2);
    }

    #[test]
    fn test_zero_slots_clamped() {
        let slots = ObjectMapSlots::new(0, |_| RenderObjectMap::new(DummyAllocator::new()));
        assert_eq!(slots.len(), 1);
        assert!(slots.flush_all(0).is_empty());
    }
}
