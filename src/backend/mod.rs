//! GPU backend abstraction layer.
//!
//! The scheduler never talks to a graphics API directly. Physical objects are
//! created, resized and destroyed through a [`ResourceAllocator`] owned by the
//! [`RenderObjectMap`](crate::pool::RenderObjectMap); pass callbacks receive a
//! caller-chosen backend context when the graph executes.
//!
//! # Available Backends
//!
//! - `dummy` (default): no-op allocator for testing and development
//!
//! API-specific layers implement [`ResourceAllocator`] on top of their device.

#[cfg(feature = "dummy")]
pub mod dummy;

#[cfg(feature = "dummy")]
pub use dummy::{AllocatorStats, DummyAllocator};

use crate::error::BackendResult;
use crate::resource::ResourceShape;

/// Opaque handle to a backend object.
///
/// The meaning of the raw value is private to the allocator that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuHandle(u64);

impl GpuHandle {
    /// Wrap a raw backend value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw backend value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Creates and destroys the physical objects behind pooled resources.
pub trait ResourceAllocator: Send {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Create an object of the given shape.
    fn create(&mut self, shape: &ResourceShape) -> BackendResult<GpuHandle>;

    /// Change an existing object into a new shape of the same kind.
    ///
    /// On error the original object must still be valid. The default
    /// implementation creates the new object before destroying the old one.
    fn reallocate(
        &mut self,
        handle: GpuHandle,
        from: &ResourceShape,
        to: &ResourceShape,
    ) -> BackendResult<GpuHandle> {
        let replacement = self.create(to)?;
        self.destroy(handle, from);
        Ok(replacement)
    }

    /// Destroy an object.
    fn destroy(&mut self, handle: GpuHandle, shape: &ResourceShape);
}
