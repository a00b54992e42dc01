//! Integration tests for cross-frame pooling and object map slots.

mod common;

use std::sync::Arc;

use common::{color_target, init_logging, storage_buffer, Recorder, TestContext};
use redlilium_framegraph::{
    DummyAllocator, FrameGraph, FrameGraphConfig, MapError, ObjectMapSlots, PassDesc,
    RenderObjectMap, ResourceDef,
};

fn run_frame(graph: &mut FrameGraph, size: u64) {
    let mut frame = graph.begin_frame::<Recorder>();
    let t = frame.declare("scratch", storage_buffer(size));
    frame.add(PassDesc::new("use").create(&t).read(&t)).unwrap();
    let result = frame.build().unwrap().execute(&mut Recorder::default());
    assert!(result.is_success());
}

#[test]
fn test_unused_objects_age_out() {
    let mut ctx = TestContext::new(FrameGraphConfig::default().with_max_age_frames(3));

    run_frame(&mut ctx.graph, 1024);
    assert!(ctx.graph.flush().is_empty());

    // Frames that never touch the buffer.
    let mut disposed = Vec::new();
    for _ in 0..3 {
        let frame = ctx.graph.begin_frame::<Recorder>();
        assert!(frame.build().unwrap().execute(&mut Recorder::default()).is_success());
        disposed.extend(ctx.graph.flush());
    }

    assert_eq!(disposed.len(), 1);
    assert!(ctx.map().lock().is_empty());
    assert_eq!(ctx.stats.destroyed(), 1);
    assert_eq!(ctx.stats.live_bytes(), 0);
}

#[test]
fn test_steady_state_frames_do_not_allocate() {
    let mut ctx = TestContext::new(FrameGraphConfig::default());
    for _ in 0..10 {
        run_frame(&mut ctx.graph, 4096);
        ctx.graph.flush();
    }
    assert_eq!(ctx.stats.created(), 1);
    assert_eq!(ctx.stats.reallocated(), 0);
}

#[test]
fn test_constant_object_needs_explicit_dispose() {
    let mut ctx = TestContext::new(FrameGraphConfig::default().with_max_age_frames(0));
    let mut frame = ctx.graph.begin_frame::<Recorder>();
    let lut = frame.declare(
        "lut",
        ResourceDef::new(color_target(32, 32)).with_constant(true),
    );
    frame.add(PassDesc::new("bake").create(&lut).read(&lut)).unwrap();
    let executable = frame.build().unwrap();
    let object = executable.binding(&lut).unwrap();
    assert!(executable.execute(&mut Recorder::default()).is_success());

    for _ in 0..4 {
        assert!(ctx.graph.flush().is_empty());
    }

    let mut map = ctx.map().lock();
    map.dispose(object).unwrap();
    assert_eq!(map.dispose(object), Err(MapError::UnknownObject(object)));
}

#[test]
fn test_constant_definition_reuses_one_object() {
    let mut ctx = TestContext::new(FrameGraphConfig::default().with_max_age_frames(0));
    for _ in 0..5 {
        let mut frame = ctx.graph.begin_frame::<Recorder>();
        let lut = frame.declare(
            "lut",
            ResourceDef::new(storage_buffer(1024)).with_constant(true),
        );
        frame.add(PassDesc::new("bake").create(&lut).read(&lut)).unwrap();
        assert!(frame.build().unwrap().execute(&mut Recorder::default()).is_success());
        ctx.graph.flush();
    }

    assert_eq!(ctx.map().lock().len(), 1);
    assert_eq!(ctx.stats.created(), 1);
}

#[test]
fn test_pending_build_blocks_flush_and_reuse() {
    let mut ctx = TestContext::new(FrameGraphConfig::default().with_max_age_frames(0));
    let mut frame = ctx.graph.begin_frame::<Recorder>();
    let t = frame.declare("t", storage_buffer(256));
    frame.add(PassDesc::new("p").create(&t).read(&t)).unwrap();
    let pending = frame.build().unwrap();
    let object = pending.binding(&t).unwrap();

    // The object is reserved for the pending frame.
    assert!(ctx.map().lock().flush(0).is_empty());
    let mut map = ctx.map().lock();
    let other = map.acquire(&ResourceDef::new(storage_buffer(256))).unwrap();
    assert_ne!(other, object);
    map.release(other).unwrap();
    drop(map);

    assert!(pending.execute(&mut Recorder::default()).is_success());
}

#[test]
fn test_frame_slots_keep_frames_apart() {
    init_logging();
    let config = FrameGraphConfig::default().with_frames_in_flight(2);
    let allocators: Vec<DummyAllocator> = (0..2).map(|_| DummyAllocator::new()).collect();
    let stats: Vec<_> = allocators.iter().map(DummyAllocator::stats).collect();
    let mut allocators = allocators.into_iter();
    let slots = ObjectMapSlots::new(config.frames_in_flight, |_| {
        RenderObjectMap::new(allocators.next().unwrap_or_default())
    });
    let mut graph = FrameGraph::with_slots(slots, config);

    for _ in 0..6 {
        run_frame(&mut graph, 512);
        graph.flush();
    }

    // Each slot allocated its own buffer once and reused it every other frame.
    assert_eq!(stats[0].created(), 1);
    assert_eq!(stats[1].created(), 1);
    assert!(!Arc::ptr_eq(
        graph.maps().slot(0).unwrap(),
        graph.maps().slot(1).unwrap()
    ));
    assert_eq!(graph.shutdown(), 2);
}
