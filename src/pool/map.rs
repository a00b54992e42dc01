//! Shape-keyed pool of render objects.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::ResourceAllocator;
use crate::capture::{CaptureEvent, SharedCapture};
use crate::error::{BackendResult, MapError, SpecificAcquireError};
use crate::resource::{ResourceDef, ResourceShape};

use super::object::{ObjectId, ObjectState, RenderObject};

/// A render object map shared between frame graphs.
pub type SharedObjectMap = Arc<Mutex<RenderObjectMap>>;

/// Snapshot of the map's contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapStats {
    pub free: usize,
    /// Held by a built frame that has not run yet.
    pub reserved: usize,
    pub in_use: usize,
    /// Constant objects, in any state.
    pub constant: usize,
    /// Estimated bytes held by every object in the map.
    pub resident_bytes: u64,
}

impl MapStats {
    /// Number of objects in the map.
    pub fn total(&self) -> usize {
        self.free + self.reserved + self.in_use
    }
}

/// Pool of physical render objects that persists across frames.
///
/// Objects are matched by exact shape first, then reshaped in place within
/// their pool class, and only created when nothing free is left. Among
/// several candidates the most recently released wins, then the lowest
/// identity.
pub struct RenderObjectMap {
    allocator: Box<dyn ResourceAllocator>,
    objects: BTreeMap<ObjectId, RenderObject>,
    next_id: u64,
    current_frame: u64,
    release_counter: u64,
    capture: Option<SharedCapture>,
}

impl RenderObjectMap {
    /// Create an empty map backed by the given allocator.
    pub fn new<A: ResourceAllocator + 'static>(allocator: A) -> Self {
        log::debug!("Creating render object map on {} allocator", allocator.name());
        Self {
            allocator: Box::new(allocator),
            objects: BTreeMap::new(),
            next_id: 1,
            current_frame: 0,
            release_counter: 0,
            capture: None,
        }
    }

    /// Wrap the map for sharing between frame graphs.
    pub fn shared(self) -> SharedObjectMap {
        Arc::new(Mutex::new(self))
    }

    /// Record object lifecycle events into `capture`.
    pub fn set_capture(&mut self, capture: Option<SharedCapture>) {
        self.capture = capture;
    }

    /// Name of the backing allocator.
    pub fn allocator_name(&self) -> &str {
        self.allocator.name()
    }

    /// Frame counter, advanced by every [`flush`](Self::flush).
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Look up an object by identity.
    pub fn get(&self, id: ObjectId) -> Option<&RenderObject> {
        self.objects.get(&id)
    }

    /// Number of objects, whatever their state.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate objects in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &RenderObject> {
        self.objects.values()
    }

    /// Count objects by state and sum their estimated size.
    pub fn stats(&self) -> MapStats {
        let mut stats = MapStats::default();
        for object in self.objects.values() {
            match object.state() {
                ObjectState::Free => stats.free += 1,
                ObjectState::Reserved => stats.reserved += 1,
                ObjectState::InUse => stats.in_use += 1,
            }
            if object.constant {
                stats.constant += 1;
            }
            stats.resident_bytes += object.shape.estimated_size();
        }
        stats
    }

    /// Acquire an object for `def`, reusing a free one when possible.
    ///
    /// Constant objects only serve constant definitions of the exact same
    /// shape and are never reallocated; otherwise reach them with
    /// [`acquire_specific`](Self::acquire_specific).
    pub fn acquire(&mut self, def: &ResourceDef) -> BackendResult<ObjectId> {
        self.acquire_reshaping(def, |_| true)
    }

    /// Like [`acquire`](Self::acquire), but only objects accepted by
    /// `may_reshape` are reallocated into a new shape.
    pub(crate) fn acquire_reshaping(
        &mut self,
        def: &ResourceDef,
        may_reshape: impl Fn(ObjectId) -> bool,
    ) -> BackendResult<ObjectId> {
        let exact = |object: &RenderObject| object.shape.is_compatible(&def.shape);
        let constant = if def.constant {
            self.pick_free(|object| object.constant && exact(object))
        } else {
            None
        };
        let reused = constant.or_else(|| self.pick_free(|object| !object.constant && exact(object)));
        let id = if let Some(id) = reused {
            log::trace!("Reusing {} for {}", id, def.shape);
            id
        } else if let Some(id) = self.pick_free(|object| {
            !object.constant && object.shape.same_pool_class(&def.shape) && may_reshape(object.id)
        }) {
            self.reallocate(id, &def.shape)?;
            id
        } else {
            self.create(&def.shape)?
        };

        self.take(id, def.constant);
        Ok(id)
    }

    /// Acquire the specific object `id` for `def`.
    ///
    /// Failures are not fatal: callers fall back to [`acquire`](Self::acquire).
    pub fn acquire_specific(
        &mut self,
        id: ObjectId,
        def: &ResourceDef,
    ) -> Result<ObjectId, SpecificAcquireError> {
        let object = self
            .objects
            .get(&id)
            .ok_or(SpecificAcquireError::Unknown(id))?;
        match object.state() {
            ObjectState::InUse => return Err(SpecificAcquireError::InUse(id)),
            ObjectState::Reserved => return Err(SpecificAcquireError::Reserved(id)),
            ObjectState::Free => {}
        }
        if !object.shape.is_compatible(&def.shape) {
            return Err(SpecificAcquireError::Incompatible(id));
        }

        self.take(id, def.constant);
        Ok(id)
    }

    /// Add a reference to an object that is already in use.
    pub fn retain(&mut self, id: ObjectId) -> Result<(), MapError> {
        let object = self.object_mut(id)?;
        if object.ref_count == 0 {
            return Err(MapError::NotInUse(id));
        }
        object.ref_count += 1;
        Ok(())
    }

    /// Drop a reference. At zero the object becomes free (unless reserved).
    pub fn release(&mut self, id: ObjectId) -> Result<(), MapError> {
        let frame = self.current_frame;
        let object = self.objects.get_mut(&id).ok_or(MapError::UnknownObject(id))?;
        if object.ref_count == 0 {
            return Err(MapError::NotInUse(id));
        }
        object.ref_count -= 1;
        if object.ref_count == 0 {
            object.last_used_frame = frame;
            self.release_counter += 1;
            object.release_stamp = self.release_counter;
        }
        Ok(())
    }

    /// Exempt an object from flushing and from generic reuse.
    pub fn mark_constant(&mut self, id: ObjectId) -> Result<(), MapError> {
        self.object_mut(id)?.constant = true;
        Ok(())
    }

    pub(crate) fn reserve(&mut self, id: ObjectId) -> Result<(), MapError> {
        self.object_mut(id)?.reservations += 1;
        Ok(())
    }

    /// Turn one reservation into a live reference.
    pub(crate) fn activate(&mut self, id: ObjectId) -> Result<(), MapError> {
        let frame = self.current_frame;
        let object = self.object_mut(id)?;
        object.reservations = object.reservations.saturating_sub(1);
        object.ref_count += 1;
        object.last_used_frame = frame;
        Ok(())
    }

    /// Drop a reservation that will never be activated.
    pub(crate) fn unreserve(&mut self, id: ObjectId) -> Result<(), MapError> {
        let frame = self.current_frame;
        let object = self.objects.get_mut(&id).ok_or(MapError::UnknownObject(id))?;
        object.reservations = object.reservations.saturating_sub(1);
        if object.is_free() {
            object.last_used_frame = frame;
            self.release_counter += 1;
            object.release_stamp = self.release_counter;
        }
        Ok(())
    }

    /// Dispose free, non-constant objects unused for at least `max_age_frames`,
    /// then advance the frame counter.
    ///
    /// Reserved and in-use objects are never disposed.
    pub fn flush(&mut self, max_age_frames: u64) -> Vec<ObjectId> {
        let frame = self.current_frame;
        let expired: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|object| object.is_poolable())
            .filter(|object| frame.saturating_sub(object.last_used_frame) >= max_age_frames)
            .map(|object| object.id)
            .collect();

        for &id in &expired {
            self.destroy(id);
        }
        if !expired.is_empty() {
            log::debug!(
                "Flushed {} objects at frame {} ({} remaining)",
                expired.len(),
                frame,
                self.objects.len()
            );
        }

        self.current_frame += 1;
        expired
    }

    /// Dispose a free object, constant or not.
    pub fn dispose(&mut self, id: ObjectId) -> Result<(), MapError> {
        let object = self.objects.get(&id).ok_or(MapError::UnknownObject(id))?;
        if !object.is_free() {
            return Err(MapError::ObjectBusy(id));
        }
        self.destroy(id);
        Ok(())
    }

    /// Dispose every object. Returns how many were destroyed.
    pub fn shutdown(&mut self) -> usize {
        let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        for &id in &ids {
            if let Some(object) = self.objects.get(&id) {
                if !object.is_free() {
                    log::warn!("Disposing {} while {:?} at shutdown", id, object.state());
                }
            }
            self.destroy(id);
        }
        log::info!("Render object map shut down ({} objects disposed)", ids.len());
        ids.len()
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut RenderObject, MapError> {
        self.objects.get_mut(&id).ok_or(MapError::UnknownObject(id))
    }

    fn pick_free(&self, matches: impl Fn(&RenderObject) -> bool) -> Option<ObjectId> {
        self.objects
            .values()
            .filter(|object| object.is_free() && matches(object))
            .max_by_key(|object| (object.release_stamp, Reverse(object.id)))
            .map(|object| object.id)
    }

    fn take(&mut self, id: ObjectId, constant: bool) {
        let frame = self.current_frame;
        if let Some(object) = self.objects.get_mut(&id) {
            object.ref_count += 1;
            object.last_used_frame = frame;
            object.constant |= constant;
        }
    }

    fn create(&mut self, shape: &ResourceShape) -> BackendResult<ObjectId> {
        let handle = self.allocator.create(shape)?;
        let id = ObjectId::new(self.next_id);
        self.next_id += 1;
        self.objects
            .insert(id, RenderObject::new(id, shape.clone(), handle, self.current_frame));
        log::trace!("Created {} ({})", id, shape);
        self.record(CaptureEvent::ObjectCreated {
            object: id,
            shape: shape.to_string(),
        });
        Ok(id)
    }

    fn reallocate(&mut self, id: ObjectId, shape: &ResourceShape) -> BackendResult<()> {
        let Some(object) = self.objects.get_mut(&id) else {
            return Ok(());
        };
        let handle = self.allocator.reallocate(object.handle, &object.shape, shape)?;
        let from = std::mem::replace(&mut object.shape, shape.clone());
        object.handle = handle;
        log::trace!("Reallocated {} from {} to {}", id, from, shape);
        self.record(CaptureEvent::ObjectReallocated {
            object: id,
            from: from.to_string(),
            to: shape.to_string(),
        });
        Ok(())
    }

    fn destroy(&mut self, id: ObjectId) {
        if let Some(object) = self.objects.remove(&id) {
            self.allocator.destroy(object.handle, &object.shape);
            log::trace!("Disposed {} ({})", id, object.shape);
            self.record(CaptureEvent::ObjectDisposed { object: id });
        }
    }

    fn record(&self, event: CaptureEvent) {
        if let Some(capture) = &self.capture {
            capture.lock().record(event);
        }
    }
}

impl Drop for RenderObjectMap {
    fn drop(&mut self) {
        if !self.objects.is_empty() {
            self.shutdown();
        }
    }
}
