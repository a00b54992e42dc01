//! Common utilities for frame graph integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use redlilium_framegraph::{
    AllocatorStats, BufferUsage, DummyAllocator, FrameGraph, FrameGraphConfig, RenderObjectMap,
    ResourceShape, SharedObjectMap, TextureFormat, TextureUsage,
};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

/// Backend context handed to pass callbacks; records what ran.
#[derive(Debug, Default)]
pub struct Recorder {
    pub executed: Vec<String>,
}

/// A frame graph over a dummy allocator, with allocator statistics.
pub struct TestContext {
    pub graph: FrameGraph,
    pub stats: Arc<AllocatorStats>,
}

impl TestContext {
    pub fn new(config: FrameGraphConfig) -> Self {
        Self::with_allocator(DummyAllocator::new(), config)
    }

    /// Context whose allocator fails once `bytes` are in use.
    pub fn with_budget(bytes: u64, config: FrameGraphConfig) -> Self {
        Self::with_allocator(DummyAllocator::new().with_memory_budget(bytes), config)
    }

    fn with_allocator(allocator: DummyAllocator, config: FrameGraphConfig) -> Self {
        init_logging();
        let stats = allocator.stats();
        let map = RenderObjectMap::new(allocator).shared();
        Self {
            graph: FrameGraph::new(map, config),
            stats,
        }
    }

    pub fn map(&self) -> &SharedObjectMap {
        self.graph.map()
    }
}

/// 2D RGBA8 render target.
pub fn color_target(width: u32, height: u32) -> ResourceShape {
    ResourceShape::image_2d(
        width,
        height,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

pub fn depth_target(width: u32, height: u32) -> ResourceShape {
    ResourceShape::image_2d(
        width,
        height,
        TextureFormat::Depth32Float,
        TextureUsage::RENDER_ATTACHMENT,
    )
}

pub fn storage_buffer(size: u64) -> ResourceShape {
    ResourceShape::buffer(size, BufferUsage::STORAGE | BufferUsage::COPY_DST)
}
