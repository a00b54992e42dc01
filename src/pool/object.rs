//! Physical render objects.

use std::fmt;

use crate::backend::GpuHandle;
use crate::resource::ResourceShape;

/// Unique identity of a physical object within its map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Wrap a raw identity.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identity value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj{}", self.0)
    }
}

/// Reservation state of a render object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectState {
    /// Available for acquisition.
    Free,
    /// Bound to a ticket of a build that has not executed it yet.
    Reserved,
    /// Held by at least one live ticket.
    InUse,
}

/// A physical GPU-side resource owned by a [`RenderObjectMap`](super::RenderObjectMap).
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub(crate) id: ObjectId,
    pub(crate) shape: ResourceShape,
    pub(crate) handle: GpuHandle,
    pub(crate) ref_count: u32,
    pub(crate) reservations: u32,
    pub(crate) constant: bool,
    pub(crate) last_used_frame: u64,
    pub(crate) release_stamp: u64,
}

impl RenderObject {
    pub(crate) fn new(id: ObjectId, shape: ResourceShape, handle: GpuHandle, frame: u64) -> Self {
        Self {
            id,
            shape,
            handle,
            ref_count: 0,
            reservations: 0,
            constant: false,
            last_used_frame: frame,
            release_stamp: 0,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn shape(&self) -> &ResourceShape {
        &self.shape
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Number of pending tickets bound to this object that have not run yet.
    pub fn reservations(&self) -> u32 {
        self.reservations
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Map frame at which the object was last released or activated.
    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }

    pub fn state(&self) -> ObjectState {
        if self.ref_count > 0 {
            ObjectState::InUse
        } else if self.reservations > 0 {
            ObjectState::Reserved
        } else {
            ObjectState::Free
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.state() == ObjectState::Free
    }

    /// Whether a generic acquire may hand out or reshape this object.
    #[inline]
    pub(crate) fn is_poolable(&self) -> bool {
        self.is_free() && !self.constant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferUsage;

    #[test]
    fn test_state_from_counters() {
        let mut object = RenderObject::new(
            ObjectId::new(1),
            ResourceShape::buffer(64, BufferUsage::UNIFORM),
            GpuHandle::new(1),
            0,
        );
        assert_eq!(object.state(), ObjectState::Free);

        object.reservations = 1;
        assert_eq!(object.state(), ObjectState::Reserved);

        object.ref_count = 1;
        assert_eq!(object.state(), ObjectState::InUse);

        object.reservations = 0;
        object.ref_count = 0;
        object.constant = true;
        assert!(object.is_free());
        assert!(!object.is_poolable());
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId::new(42).to_string(), "obj42");
    }
}
