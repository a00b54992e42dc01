//! Logical resources of a frame graph build.
//!
//! A [`ResourceTicket`] names a resource inside one build; a [`ResourceDef`]
//! describes what physical object should back it. Neither owns GPU memory:
//! the [`RenderObjectMap`](crate::pool::RenderObjectMap) does.

mod def;
mod ticket;

pub use def::{BufferShape, FramebufferShape, ImageShape, ResourceDef, ResourceKind, ResourceShape};
pub use ticket::ResourceTicket;

pub(crate) use ticket::next_generation;
