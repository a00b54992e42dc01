//! RedLilium FrameGraph - render resource scheduling for a frame graph
//!
//! Each frame, passes declare which logical resources they create, write,
//! read and reference. The frame graph orders the passes, binds every logical
//! resource to a pooled physical object, runs the passes and hands the
//! objects back to a pool that persists across frames.
//!
//! # Features
//! - Stable dependency ordering with named cycle reports
//! - Intra-frame aliasing: tickets with disjoint lifetimes share objects
//! - Cross-frame pooling with exact-shape reuse, in-place reallocation and
//!   age-based disposal
//! - Constant objects and explicit object identities for history resources
//! - Configurable failure policy, cooperative cancellation and leak reporting
//! - Typed event capture with a line-oriented text export
//!
//! # Architecture
//!
//! ```text
//! FrameGraph ──begin_frame──► FrameGraphBuilder ──build──► ExecutableFrameGraph
//!     │                           │  declare / add_pass        │  execute(&mut C)
//!     │                           ▼                            ▼
//!     └────────────────► RenderObjectMap ◄──── reserve / activate / release
//!                               │
//!                               ▼
//!                      dyn ResourceAllocator
//! ```
//!
//! The map is an explicit [`SharedObjectMap`] context: several frame graphs can
//! share one, or an [`ObjectMapSlots`] can give each in-flight frame its own.

pub mod backend;
pub mod cancellation;
pub mod capture;
pub mod compiler;
pub mod config;
pub mod error;
pub mod graph;
pub mod pool;
pub mod resource;
pub mod types;

pub use backend::{GpuHandle, ResourceAllocator};
#[cfg(feature = "dummy")]
pub use backend::{AllocatorStats, DummyAllocator};
pub use cancellation::CancellationToken;
pub use capture::{CaptureEvent, CapturedEvent, EventCapture, SharedCapture};
pub use compiler::{CompiledGraph, PassAccess, TicketLifetime};
pub use config::{FailurePolicy, FrameGraphConfig};
pub use error::{
    BackendError, BackendResult, DeclarationError, FrameGraphError, MapError, PassError,
    SpecificAcquireError,
};
pub use graph::{
    ExecutableFrameGraph, FrameGraph, FrameGraphBuilder, FrameGraphResult, FrameState,
    FrameWarning, PassCallback, PassContext, PassDesc, PassFailure, PassHandle, ResolvedResource,
    ResourceAccess, ResourcePass,
};
pub use pool::{MapStats, ObjectId, ObjectMapSlots, ObjectState, RenderObject, RenderObjectMap, SharedObjectMap};
pub use resource::{
    BufferShape, FramebufferShape, ImageShape, ResourceDef, ResourceKind, ResourceShape,
    ResourceTicket,
};
pub use types::{BufferUsage, Extent3d, TextureFormat, TextureUsage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library (logs version info)
pub fn init() {
    log::info!("RedLilium FrameGraph v{}", VERSION);
}
