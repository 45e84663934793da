//! Batch construction and ordering tests
//!
//! Tests for:
//! - Three-level GPU-state sort under the default priority
//! - Per-camera priority reconfiguration
//! - Per-face effect fan-out with tag fallback
//! - Exclusion of culled, disabled and unrenderable nodes
//! - Batch snapshots across skipped frames

use glam::DVec3;
use janus::assets::prefabs;
use janus::render::technique;
use janus::{
    BatchCriterion, BatchEntry, BatchPriority, CameraKey, CanvasSizing, EffectKey, Engine,
    FaceEffects, FrameLoop, GpuError, HeadlessDevice, MaterialKey, MeshBufferKey, MeshData,
    MeshKey, NodeBinding, NodeKey, SceneKey, WindowHost,
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

struct Rig {
    device: HeadlessDevice,
    engine: Engine,
    frame_loop: FrameLoop,
    scene: SceneKey,
    camera: CameraKey,
    root: NodeKey,
}

impl Rig {
    fn new() -> Self {
        let device = HeadlessDevice::new();
        let mut engine = Engine::new(Box::new(device.clone()), 800, 600).unwrap();
        let canvas = engine
            .add_canvas(
                None,
                CanvasSizing::Relative {
                    width: 1.0,
                    height: 1.0,
                },
            )
            .unwrap();
        let scene = engine.add_scene("main");
        let camera = engine.add_camera(canvas, scene, technique::SCENE).unwrap();
        engine
            .camera_mut(camera)
            .unwrap()
            .set_look_at(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO, DVec3::Y);
        let root = engine.scene(scene).unwrap().root();
        Rig {
            device,
            engine,
            frame_loop: FrameLoop::new(0).unwrap(),
            scene,
            camera,
            root,
        }
    }

    fn program(&mut self, id: &str) {
        let handle = self.device.make_program();
        self.engine.register_program(id, handle).unwrap();
    }

    fn texture(&mut self, id: &str) {
        let handle = self.device.make_texture();
        self.engine.register_texture(id, handle).unwrap();
    }

    fn material(&mut self, id: &str, effect: EffectKey) -> MaterialKey {
        self.engine
            .add_material(id, effect, FaceEffects::default())
            .unwrap()
    }

    fn pooled_mesh(&mut self, id: &str, data: MeshData, buffer: MeshBufferKey) -> MeshKey {
        let key = self.engine.add_mesh(id, data).unwrap();
        self.engine.add_mesh_to_buffer(buffer, key).unwrap();
        key
    }

    fn meshed_node(&mut self, mesh: MeshKey, material: MaterialKey) -> NodeKey {
        let binding = NodeBinding::mesh(mesh).with_material(material);
        self.engine
            .scene_mut(self.scene)
            .unwrap()
            .add_child(self.root, binding)
            .unwrap()
    }

    fn tick(&mut self) {
        self.frame_loop
            .tick(&mut self.engine, &mut TestHost, |_, _| {})
            .unwrap();
    }

    fn entries(&self) -> &[BatchEntry] {
        self.engine
            .camera(self.camera)
            .unwrap()
            .batch_list()
            .entries()
    }
}

/// Three nodes sharing one cube: two effects on program `p1` (one textured),
/// one on `p2`. Returns `(rig, plain_p1, textured_p1, plain_p2)`.
fn sort_rig() -> (Rig, EffectKey, EffectKey, EffectKey) {
    let mut rig = Rig::new();
    rig.program("p1");
    rig.program("p2");
    rig.texture("t");

    let plain_p1 = rig.engine.add_effect("plain-p1", "p1", &[]).unwrap();
    let textured_p1 = rig.engine.add_effect("textured-p1", "p1", &["t"]).unwrap();
    let plain_p2 = rig.engine.add_effect("plain-p2", "p2", &[]).unwrap();

    let buffer = rig.engine.create_mesh_buffer("main", 64, 64).unwrap();
    let cube = rig.pooled_mesh("cube", prefabs::cube(1.0, 1.0, 1.0), buffer);
    for (id, effect) in [
        ("m-plain-p2", plain_p2),
        ("m-textured-p1", textured_p1),
        ("m-plain-p1", plain_p1),
    ] {
        let material = rig.material(id, effect);
        rig.meshed_node(cube, material);
    }
    (rig, plain_p1, textured_p1, plain_p2)
}

fn effect_order(rig: &Rig) -> Vec<EffectKey> {
    rig.entries().iter().map(|e| e.effect).collect()
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn default_priority_sorts_program_then_buffer_then_texture() {
    let (mut rig, plain_p1, textured_p1, plain_p2) = sort_rig();
    rig.tick();

    // p1 entries first, untextured before textured; p2 last
    assert_eq!(effect_order(&rig), vec![plain_p1, textured_p1, plain_p2]);
}

#[test]
fn priority_is_reconfigurable_per_camera() {
    let (mut rig, plain_p1, textured_p1, plain_p2) = sort_rig();
    let camera = rig.camera;
    rig.engine.camera_mut(camera).unwrap().batch_priority = BatchPriority([
        BatchCriterion::Texture,
        BatchCriterion::Program,
        BatchCriterion::Buffer,
    ]);
    rig.tick();

    // Texture outranks program now; the untextured pair falls back to
    // program order between themselves
    assert_eq!(effect_order(&rig), vec![plain_p1, plain_p2, textured_p1]);
}

// ============================================================================
// Per-Face Effects
// ============================================================================

#[test]
fn face_effects_fan_out_one_entry_per_face() {
    let mut rig = Rig::new();
    rig.program("p1");
    rig.program("p2");
    let base_fx = rig.engine.add_effect("base-fx", "p1", &[]).unwrap();
    let side_fx = rig.engine.add_effect("side-fx", "p2", &[]).unwrap();

    let mut overrides = FaceEffects::default();
    overrides.by_tag.insert("side".into(), side_fx);
    let material = rig
        .engine
        .add_material("skin", base_fx, overrides)
        .unwrap();

    let buffer = rig.engine.create_mesh_buffer("main", 64, 64).unwrap();
    // Pyramid: four faces tagged "side", two tagged "base"
    let pyramid = rig.pooled_mesh("pyramid", prefabs::pyramid(1.0, 1.0), buffer);
    rig.meshed_node(pyramid, material);
    rig.tick();

    let entries = rig.entries();
    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|e| e.face.is_some()));

    let faces_of = |fx: EffectKey| {
        let mut faces: Vec<u32> = entries
            .iter()
            .filter(|e| e.effect == fx)
            .map(|e| e.face.unwrap())
            .collect();
        faces.sort_unstable();
        faces
    };
    assert_eq!(faces_of(side_fx), vec![0, 1, 2, 3]);
    assert_eq!(faces_of(base_fx), vec![4, 5]);

    // Default sort puts the p1 (base) pair before the p2 sides
    assert!(entries[..2].iter().all(|e| e.effect == base_fx));
}

// ============================================================================
// Exclusion
// ============================================================================

#[test]
fn unrenderable_nodes_never_enter_batches() {
    let mut rig = Rig::new();
    rig.program("p");
    let fx = rig.engine.add_effect("fx", "p", &[]).unwrap();
    let material = rig.material("mat", fx);

    let buffer = rig.engine.create_mesh_buffer("main", 256, 256).unwrap();
    let cube = rig.pooled_mesh("cube", prefabs::cube(1.0, 1.0, 1.0), buffer);
    let unpooled = rig.engine.add_mesh("loose", prefabs::plane(1.0, 1.0)).unwrap();

    let control = rig.meshed_node(cube, material);

    // Behind the camera
    let culled = rig.meshed_node(cube, material);
    // No draw binding at all
    let scene = rig.scene;
    let root = rig.root;
    {
        let s = rig.engine.scene_mut(scene).unwrap();
        s.node_mut(culled).unwrap().transform.edit().position = DVec3::new(0.0, 0.0, 200.0);
        s.add_child(root, NodeBinding::default()).unwrap();
    }
    // Locally disabled
    let disabled = rig.meshed_node(cube, material);
    // Mesh known to the library but absent from every buffer
    let homeless = rig.meshed_node(unpooled, material);
    // Mesh without any material to resolve
    let bare = rig
        .engine
        .scene_mut(scene)
        .unwrap()
        .add_child(root, NodeBinding::mesh(cube))
        .unwrap();
    {
        let s = rig.engine.scene_mut(scene).unwrap();
        s.node_mut(disabled).unwrap().enabled = false;
    }

    rig.tick();

    let entries = rig.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].node, control);
    for key in [culled, disabled, homeless, bare] {
        assert!(entries.iter().all(|e| e.node != key));
    }
}

// ============================================================================
// Frame-Skip Snapshots
// ============================================================================

#[test]
fn skipped_frames_keep_the_last_batch_snapshot() {
    let mut rig = Rig::new();
    rig.program("p");
    let fx = rig.engine.add_effect("fx", "p", &[]).unwrap();
    let material = rig.material("mat", fx);
    let buffer = rig.engine.create_mesh_buffer("main", 64, 64).unwrap();
    let cube = rig.pooled_mesh("cube", prefabs::cube(1.0, 1.0, 1.0), buffer);
    let node = rig.meshed_node(cube, material);

    rig.engine.canvas_mut(0).unwrap().every_nth_frame = 2;

    // Frame 1 is skipped, nothing has been prepared yet
    rig.tick();
    assert!(rig.entries().is_empty());

    // Frame 2 prepares and renders
    rig.tick();
    assert_eq!(rig.entries().len(), 1);

    // Disabling the node is not picked up on the skipped frame 3
    let scene = rig.scene;
    rig.engine
        .scene_mut(scene)
        .unwrap()
        .node_mut(node)
        .unwrap()
        .enabled = false;
    rig.tick();
    assert_eq!(rig.entries().len(), 1);

    // Frame 4 prepares again and sees the change
    rig.tick();
    assert!(rig.entries().is_empty());
}
