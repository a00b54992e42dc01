//! Frame graph scheduling.
//!
//! A [`FrameGraph`] drives one frame at a time through its lifecycle:
//!
//! 1. **Building** - [`begin_frame`](FrameGraph::begin_frame) returns a
//!    [`FrameGraphBuilder`]; tickets are declared and passes added in any order.
//! 2. **Resolving** - [`build`](FrameGraphBuilder::build) orders the passes,
//!    binds every used ticket to a pooled object and reserves it.
//! 3. **Executing** - [`execute`](ExecutableFrameGraph::execute) runs the passes
//!    in order, releasing each ticket right after its last consumer.
//! 4. **Completed** or **Aborted** - whatever is still bound is released.
//!
//! # Example
//!
//! ```ignore
//! let map = RenderObjectMap::new(DummyAllocator::new()).shared();
//! let mut graph = FrameGraph::new(map, FrameGraphConfig::default());
//!
//! let mut frame = graph.begin_frame::<MyBackend>();
//! let gbuffer = frame.declare("gbuffer", gbuffer_shape);
//! let hdr = frame.declare("hdr", hdr_shape);
//! frame.add(PassDesc::new("geometry").create(&gbuffer).execute(draw_geometry))?;
//! frame.add(PassDesc::new("lighting").read(&gbuffer).create(&hdr).execute(shade))?;
//! frame.add(PassDesc::new("present").read(&hdr).execute(present))?;
//!
//! let result = frame.build()?.execute(&mut backend);
//! graph.flush();
//! ```

mod builder;
mod executable;
mod pass;
mod resolve;
mod result;

pub use builder::FrameGraphBuilder;
pub use executable::ExecutableFrameGraph;
pub use pass::{
    PassCallback, PassContext, PassDesc, PassHandle, ResolvedResource, ResourceAccess,
    ResourcePass,
};
pub use result::{FrameGraphResult, FrameState, FrameWarning, PassFailure};

use crate::capture::{CaptureEvent, EventCapture, SharedCapture};
use crate::config::FrameGraphConfig;
use crate::pool::{ObjectId, ObjectMapSlots, SharedObjectMap};
use crate::resource::next_generation;

/// Per-frame scheduler over a persistent object map.
pub struct FrameGraph {
    maps: ObjectMapSlots,
    config: FrameGraphConfig,
    capture: Option<SharedCapture>,
    frame_index: u64,
}

impl FrameGraph {
    /// Create a frame graph over a single shared map.
    pub fn new(map: SharedObjectMap, config: FrameGraphConfig) -> Self {
        Self::with_slots(ObjectMapSlots::single(map), config)
    }

    /// Create a frame graph that rotates through one map per in-flight frame.
    pub fn with_slots(maps: ObjectMapSlots, config: FrameGraphConfig) -> Self {
        let mut graph = Self {
            maps,
            config,
            capture: None,
            frame_index: 0,
        };
        if graph.config.capture_events {
            graph.set_capture(Some(EventCapture::new().shared()));
        }
        log::info!(
            "Frame graph created ({} map slots, max age {} frames, {:?} on failure)",
            graph.maps.len(),
            graph.config.max_age_frames,
            graph.config.failure_policy
        );
        graph
    }

    /// Record events into `capture`, or stop recording with `None`.
    pub fn set_capture(&mut self, capture: Option<SharedCapture>) {
        for slot in 0..self.maps.len() {
            if let Some(map) = self.maps.slot(slot) {
                map.lock().set_capture(capture.clone());
            }
        }
        self.capture = capture;
    }

    /// Event capture shared with the maps, if enabled.
    pub fn capture(&self) -> Option<&SharedCapture> {
        self.capture.as_ref()
    }

    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    /// Index of the most recently begun frame; 0 before the first.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Map used by the current frame.
    pub fn map(&self) -> &SharedObjectMap {
        self.maps.for_frame(self.frame_index)
    }

    /// Every per-frame map slot.
    pub fn maps(&self) -> &ObjectMapSlots {
        &self.maps
    }

    /// Start declaring the next frame. `C` is the backend context handed to
    /// pass callbacks.
    pub fn begin_frame<C>(&mut self) -> FrameGraphBuilder<C> {
        self.frame_index += 1;
        let generation = next_generation();
        log::trace!("Begin frame {} (generation {})", self.frame_index, generation);
        if let Some(capture) = &self.capture {
            capture.lock().record(CaptureEvent::FrameBegun {
                frame: self.frame_index,
                generation,
            });
        }
        FrameGraphBuilder::new(
            self.map().clone(),
            self.capture.clone(),
            self.config.failure_policy,
            self.frame_index,
            generation,
        )
    }

    /// Dispose objects of the current frame's map that went unused for
    /// `max_age_frames`, and advance that map's frame counter.
    pub fn flush(&self) -> Vec<ObjectId> {
        self.map().lock().flush(self.config.max_age_frames)
    }

    /// Dispose every object in every map.
    pub fn shutdown(&self) -> usize {
        self.maps.shutdown_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyAllocator;
    use crate::pool::RenderObjectMap;
    use std::sync::Arc;

    #[test]
    fn test_begin_frame_advances_generation() {
        let map = RenderObjectMap::new(DummyAllocator::new()).shared();
        let mut graph = FrameGraph::new(map, FrameGraphConfig::default());

        let first = graph.begin_frame::<()>();
        let second = graph.begin_frame::<()>();
        assert_eq!(first.frame_index(), 1);
        assert_eq!(second.frame_index(), 2);
        assert!(second.generation() > first.generation());
        assert_eq!(second.state(), FrameState::Building);
    }

    #[test]
    fn test_slots_rotate_per_frame() {
        let config = FrameGraphConfig::default().with_frames_in_flight(2);
        let slots = ObjectMapSlots::new(config.frames_in_flight, |_| {
            RenderObjectMap::new(DummyAllocator::new())
        });
        let mut graph = FrameGraph::with_slots(slots, config);

        let _ = graph.begin_frame::<()>();
        let first = Arc::clone(graph.map());
        let _ = graph.begin_frame::<()>();
        assert!(!Arc::ptr_eq(&first, graph.map()));
        let _ = graph.begin_frame::<()>();
        assert!(Arc::ptr_eq(&first, graph.map()));
    }

    #[test]
    fn test_capture_attached_when_enabled() {
        let map = RenderObjectMap::new(DummyAllocator::new()).shared();
        let mut graph = FrameGraph::new(map, FrameGraphConfig::default().with_capture_events(true));
        let _ = graph.begin_frame::<()>();

        let capture = graph.capture().unwrap().lock();
        assert_eq!(capture.frame_count(), 1);
    }
}
