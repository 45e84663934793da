//! Mesh buffer integration tests
//!
//! Tests for:
//! - Fixed capacity: rejection with no state damage
//! - Atomic creation rollback on scripted device failures
//! - One-buffer-per-mesh ownership and its error family
//! - Disposal releasing GPU objects and detaching members

use janus::assets::prefabs;
use janus::{Engine, EngineError, HeadlessDevice};

// ============================================================================
// Helpers
// ============================================================================

fn engine_pair() -> (HeadlessDevice, Engine) {
    let device = HeadlessDevice::new();
    let engine = Engine::new(Box::new(device.clone()), 640, 480).unwrap();
    (device, engine)
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn full_buffer_rejects_without_side_effects() {
    let (_, mut engine) = engine_pair();
    // Two planes of 4 vertices each against a 6-vertex pool
    let first = engine.add_mesh("first", prefabs::plane(1.0, 1.0)).unwrap();
    let second = engine.add_mesh("second", prefabs::plane(2.0, 2.0)).unwrap();
    let buffer = engine.create_mesh_buffer("main", 6, 64).unwrap();

    engine.add_mesh_to_buffer(buffer, first).unwrap();
    let err = engine.add_mesh_to_buffer(buffer, second).unwrap_err();
    assert!(matches!(
        err,
        EngineError::CapacityExceeded {
            resource: "vertex",
            requested: 4,
            available: 2,
            ..
        }
    ));

    let buf = engine.mesh_buffer(buffer).unwrap();
    assert_eq!(buf.member_count(), 1);
    assert_eq!(buf.used_vertices(), 4);
    assert!(engine.assets().mesh(second).unwrap().buffer().is_none());
}

#[test]
fn index_capacity_is_checked_independently() {
    let (_, mut engine) = engine_pair();
    // A cube needs 36 indices; vertex room is plentiful
    let cube = engine.add_mesh("cube", prefabs::cube(1.0, 1.0, 1.0)).unwrap();
    let buffer = engine.create_mesh_buffer("main", 64, 6).unwrap();

    let err = engine.add_mesh_to_buffer(buffer, cube).unwrap_err();
    assert!(matches!(
        err,
        EngineError::CapacityExceeded {
            resource: "index",
            requested: 36,
            available: 6,
            ..
        }
    ));
    assert_eq!(engine.mesh_buffer(buffer).unwrap().member_count(), 0);
}

// ============================================================================
// Creation Rollback
// ============================================================================

#[test]
fn failed_vao_creation_leaves_no_gpu_objects() {
    let (device, mut engine) = engine_pair();

    device.schedule_failure("create_vertex_array", 0);
    assert!(engine.create_mesh_buffer("main", 64, 64).is_err());
    assert_eq!(device.live_objects(), 0);
    assert!(engine.mesh_buffer_key("main").is_err());

    // The id is free again and a clean retry works
    engine.create_mesh_buffer("main", 64, 64).unwrap();
    // vbo + ibo + one vao per stock technique
    assert_eq!(device.live_objects(), 4);
}

#[test]
fn failed_index_buffer_rolls_back_the_vertex_buffer() {
    let (device, mut engine) = engine_pair();

    // First create_buffer (vbo) succeeds, the second (ibo) fails
    device.schedule_failure("create_buffer", 1);
    assert!(engine.create_mesh_buffer("main", 64, 64).is_err());
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn duplicate_ids_fail_before_touching_the_device() {
    let (device, mut engine) = engine_pair();
    engine.create_mesh_buffer("main", 16, 16).unwrap();
    let before = device.live_objects();

    let err = engine.create_mesh_buffer("main", 16, 16).unwrap_err();
    assert!(matches!(
        err,
        EngineError::DuplicateId {
            kind: "mesh buffer",
            ..
        }
    ));
    assert_eq!(device.live_objects(), before);
}

// ============================================================================
// Membership
// ============================================================================

#[test]
fn a_mesh_belongs_to_one_buffer_at_a_time() {
    let (_, mut engine) = engine_pair();
    let cube = engine.add_mesh("cube", prefabs::cube(1.0, 1.0, 1.0)).unwrap();
    let a = engine.create_mesh_buffer("a", 64, 64).unwrap();
    let b = engine.create_mesh_buffer("b", 64, 64).unwrap();

    engine.add_mesh_to_buffer(a, cube).unwrap();

    assert!(matches!(
        engine.add_mesh_to_buffer(b, cube).unwrap_err(),
        EngineError::BufferConflict { .. }
    ));
    assert!(matches!(
        engine.add_mesh_to_buffer(a, cube).unwrap_err(),
        EngineError::AlreadyInBuffer { .. }
    ));
    // The failed adds left the original membership alone
    assert_eq!(engine.assets().mesh(cube).unwrap().buffer(), Some(a));
    assert!(engine.mesh_buffer(a).unwrap().span(cube).is_some());

    assert!(matches!(
        engine.remove_mesh_from_buffer(b, cube).unwrap_err(),
        EngineError::NotInBuffer { .. }
    ));

    // After a proper detach the mesh may join the other buffer
    engine.remove_mesh_from_buffer(a, cube).unwrap();
    engine.add_mesh_to_buffer(b, cube).unwrap();
    assert_eq!(engine.assets().mesh(cube).unwrap().buffer(), Some(b));
}

// ============================================================================
// Disposal
// ============================================================================

#[test]
fn buffer_removal_detaches_members_and_frees_objects() {
    let (device, mut engine) = engine_pair();
    let cube = engine.add_mesh("cube", prefabs::cube(1.0, 1.0, 1.0)).unwrap();
    let buffer = engine.create_mesh_buffer("main", 64, 64).unwrap();
    engine.add_mesh_to_buffer(buffer, cube).unwrap();
    assert_eq!(device.live_objects(), 4);

    engine.remove_mesh_buffer("main").unwrap();
    assert_eq!(device.live_objects(), 0);
    assert!(engine.assets().mesh(cube).unwrap().buffer().is_none());
    assert!(engine.mesh_buffer_key("main").is_err());
}

#[test]
fn dispose_sweeps_every_buffer() {
    let (device, mut engine) = engine_pair();
    let plane = engine.add_mesh("plane", prefabs::plane(1.0, 1.0)).unwrap();
    let a = engine.create_mesh_buffer("a", 64, 64).unwrap();
    engine.create_mesh_buffer("b", 16, 16).unwrap();
    engine.add_mesh_to_buffer(a, plane).unwrap();
    assert_eq!(device.live_objects(), 8);

    engine.dispose().unwrap();
    assert_eq!(device.live_objects(), 0);
    assert!(engine.mesh_buffer_key("a").is_err());
    assert!(engine.mesh_buffer_key("b").is_err());
    assert!(engine.assets().mesh(plane).unwrap().buffer().is_none());
}
