//! Shape primitives for pooled resources.
//!
//! Format enums, usage flags and extents that make up a
//! [`ResourceShape`](crate::resource::ResourceShape). Two resources are only
//! pooled together when every one of these fields matches.

mod common;
mod format;
mod usage;

pub use common::Extent3d;
pub use format::TextureFormat;
pub use usage::{BufferUsage, TextureUsage};
