//! Cross-frame pool of physical render objects.
//!
//! The [`RenderObjectMap`] owns every physical resource created for frame
//! graphs. Builds borrow objects through tickets; between frames the map keeps
//! released objects around so the next frame can reuse them, and
//! [`flush`](RenderObjectMap::flush) disposes the ones that went unused for too
//! long.

mod map;
mod object;
mod slots;

pub use map::{MapStats, RenderObjectMap, SharedObjectMap};
pub use object::{ObjectId, ObjectState, RenderObject};
pub use slots::ObjectMapSlots;
