//! Scene graph integration tests
//!
//! Tests for:
//! - Node creation under the fixed root, names, duplicate rejection
//! - Deep subtree removal and stale-key errors
//! - Attach validation: roots, self, cycles
//! - Per-camera node caches: lazy creation, pruning on camera removal
//! - Propagation reaching only camera-observed scenes

use glam::DVec3;
use janus::render::technique;
use janus::{
    CanvasSizing, Engine, EngineError, FrameLoop, GpuError, HeadlessDevice, NodeBinding, SceneKey,
    WindowHost,
};

// ============================================================================
// Helpers
// ============================================================================

struct TestHost;

impl WindowHost for TestHost {
    fn frame_delta(&mut self) -> f64 {
        1.0 / 60.0
    }

    fn swap_buffers(&mut self) -> Result<(), GpuError> {
        Ok(())
    }
}

fn engine_with_canvas() -> (Engine, usize) {
    let mut engine = Engine::new(Box::new(HeadlessDevice::new()), 800, 600).unwrap();
    let canvas = engine
        .add_canvas(
            None,
            CanvasSizing::Relative {
                width: 1.0,
                height: 1.0,
            },
        )
        .unwrap();
    (engine, canvas)
}

fn tick(frame_loop: &mut FrameLoop, engine: &mut Engine) {
    frame_loop.tick(engine, &mut TestHost, |_, _| {}).unwrap();
}

// ============================================================================
// Hierarchy Construction
// ============================================================================

#[test]
fn children_hang_off_the_fixed_root() {
    let mut engine = Engine::new(Box::new(HeadlessDevice::new()), 800, 600).unwrap();
    let scene = engine.add_scene("main");
    let root = engine.scene(scene).unwrap().root();

    let s = engine.scene_mut(scene).unwrap();
    let a = s.add_child(root, NodeBinding::default()).unwrap();
    let b = s.add_child(a, NodeBinding::default()).unwrap();

    assert_eq!(s.node_count(), 3);
    assert_eq!(s.node(a).unwrap().parent(), Some(root));
    assert!(s.node(a).unwrap().children().contains(&b));
    assert!(s.node(root).unwrap().parent().is_none());
}

#[test]
fn named_nodes_resolve_and_release() {
    let mut engine = Engine::new(Box::new(HeadlessDevice::new()), 800, 600).unwrap();
    let scene = engine.add_scene("main");
    let root = engine.scene(scene).unwrap().root();
    let s = engine.scene_mut(scene).unwrap();

    let hero = s
        .add_child(root, NodeBinding::default().named("hero"))
        .unwrap();
    assert_eq!(s.find("hero"), Some(hero));

    let err = s
        .add_child(root, NodeBinding::default().named("hero"))
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateId { kind: "node", .. }));

    s.remove(hero).unwrap();
    assert_eq!(s.find("hero"), None);
}

#[test]
fn subtree_removal_is_deep_and_stale_keys_error() {
    let mut engine = Engine::new(Box::new(HeadlessDevice::new()), 800, 600).unwrap();
    let scene = engine.add_scene("main");
    let root = engine.scene(scene).unwrap().root();
    let s = engine.scene_mut(scene).unwrap();

    let a = s.add_child(root, NodeBinding::default()).unwrap();
    let b = s.add_child(a, NodeBinding::default()).unwrap();
    let c = s.add_child(b, NodeBinding::default()).unwrap();
    let survivor = s.add_child(root, NodeBinding::default()).unwrap();

    s.remove(a).unwrap();
    assert!(s.node(a).is_none());
    assert!(s.node(b).is_none());
    assert!(s.node(c).is_none());
    assert!(s.node(survivor).is_some());

    assert!(matches!(
        s.remove(a),
        Err(EngineError::NodeNotFound { .. })
    ));
    assert!(matches!(
        s.remove(root),
        Err(EngineError::RootRemoval { .. })
    ));
}

#[test]
fn attach_rejects_roots_self_and_cycles() {
    let mut engine = Engine::new(Box::new(HeadlessDevice::new()), 800, 600).unwrap();
    let scene = engine.add_scene("main");
    let root = engine.scene(scene).unwrap().root();
    let s = engine.scene_mut(scene).unwrap();

    let a = s.add_child(root, NodeBinding::default()).unwrap();
    let b = s.add_child(a, NodeBinding::default()).unwrap();
    let c = s.add_child(b, NodeBinding::default()).unwrap();

    for (child, parent) in [(root, a), (a, a), (a, c)] {
        assert!(matches!(
            s.attach(child, parent),
            Err(EngineError::BadAttach { .. })
        ));
    }

    // A legal move: c from under b to under a
    s.attach(c, a).unwrap();
    assert_eq!(s.node(c).unwrap().parent(), Some(a));
    assert!(s.node(b).unwrap().children().is_empty());
}

#[test]
fn walk_visits_parents_strictly_first() {
    let mut engine = Engine::new(Box::new(HeadlessDevice::new()), 800, 600).unwrap();
    let scene = engine.add_scene("main");
    let root = engine.scene(scene).unwrap().root();
    let s = engine.scene_mut(scene).unwrap();

    let a = s.add_child(root, NodeBinding::default()).unwrap();
    let b = s.add_child(a, NodeBinding::default()).unwrap();
    let c = s.add_child(root, NodeBinding::default()).unwrap();

    let mut order = Vec::new();
    s.walk(|key, _| order.push(key));

    assert_eq!(order.len(), 4);
    assert_eq!(order[0], root);
    let pos = |k| order.iter().position(|&x| x == k).unwrap();
    assert!(pos(a) < pos(b));
    assert!(pos(root) < pos(c));
}

// ============================================================================
// Per-Camera Node Caches
// ============================================================================

#[test]
fn first_observation_creates_the_camera_cache() {
    let (mut engine, canvas) = engine_with_canvas();
    let scene = engine.add_scene("main");
    let camera = engine.add_camera(canvas, scene, technique::SCENE).unwrap();
    let mut frame_loop = FrameLoop::new(0).unwrap();

    let root = engine.scene(scene).unwrap().root();
    let node = engine
        .scene_mut(scene)
        .unwrap()
        .add_child(root, NodeBinding::default())
        .unwrap();

    assert!(
        engine
            .scene(scene)
            .unwrap()
            .node(node)
            .unwrap()
            .cam_state(camera)
            .is_none(),
        "No cache before the first prepared frame"
    );

    tick(&mut frame_loop, &mut engine);
    let state = engine
        .scene(scene)
        .unwrap()
        .node(node)
        .unwrap()
        .cam_state(camera)
        .unwrap();
    assert!(state.visible);
}

#[test]
fn camera_removal_prunes_every_node_cache() {
    let (mut engine, canvas) = engine_with_canvas();
    let scene = engine.add_scene("main");
    let camera = engine.add_camera(canvas, scene, technique::SCENE).unwrap();
    let mut frame_loop = FrameLoop::new(0).unwrap();

    let root = engine.scene(scene).unwrap().root();
    let node = engine
        .scene_mut(scene)
        .unwrap()
        .add_child(root, NodeBinding::default())
        .unwrap();
    tick(&mut frame_loop, &mut engine);
    assert!(
        engine
            .scene(scene)
            .unwrap()
            .node(node)
            .unwrap()
            .cam_state(camera)
            .is_some()
    );

    engine.remove_camera(camera).unwrap();
    for (_, n) in engine.scene(scene).unwrap().iter() {
        assert!(n.cam_state(camera).is_none());
    }
}

#[test]
fn only_observed_scenes_propagate() {
    let (mut engine, canvas) = engine_with_canvas();
    let watched = engine.add_scene("watched");
    let idle = engine.add_scene("idle");
    engine.add_camera(canvas, watched, technique::SCENE).unwrap();
    let mut frame_loop = FrameLoop::new(0).unwrap();

    let moved_node = |engine: &mut Engine, scene: SceneKey| {
        let root = engine.scene(scene).unwrap().root();
        let s = engine.scene_mut(scene).unwrap();
        let node = s.add_child(root, NodeBinding::default()).unwrap();
        s.node_mut(node).unwrap().transform.edit().position = DVec3::new(3.0, 0.0, 0.0);
        node
    };
    let watched_node = moved_node(&mut engine, watched);
    let idle_node = moved_node(&mut engine, idle);

    tick(&mut frame_loop, &mut engine);

    let world_x = |engine: &Engine, scene, node| {
        engine
            .scene(scene)
            .unwrap()
            .node(node)
            .unwrap()
            .world_matrix()
            .w_axis
            .x
    };
    assert!((world_x(&engine, watched, watched_node) - 3.0).abs() < 1e-9);
    // No camera observes the idle scene, so its nodes never propagate
    assert!(world_x(&engine, idle, idle_node).abs() < 1e-9);
}
