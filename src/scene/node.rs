use glam::DMat4;
use rustc_hash::FxHashMap;

use crate::assets::{MaterialKey, MeshKey};
use crate::frame::Slots;
use crate::gpu::GpuMat4;
use crate::scene::transform::Transform;
use crate::scene::{CameraKey, NodeKey};

/// Per-camera frame state cached on a node.
///
/// Written by the prepare stage for every camera observing the node's scene;
/// the matrix pair is double-buffered so rendering reads a stable `f32`
/// snapshot while the next frame's `f64` value is being prepared.
#[derive(Debug, Clone, Default)]
pub struct NodeCamState {
    /// Prepare-side visibility verdict (enabled chain and frustum).
    pub visible: bool,
    /// Projection-times-world for perspective cameras, plain world for
    /// screen-space cameras.
    pub mat: Slots<DMat4, GpuMat4>,
}

/// What a node renders, if anything.
#[derive(Debug, Clone, Default)]
pub struct NodeBinding {
    /// Optional unique name for scene-level lookup.
    pub name: Option<String>,
    /// Mesh to draw.
    pub mesh: Option<MeshKey>,
    /// Index into the mesh's model list; the default model when `None`.
    pub model: Option<usize>,
    /// Material override beating the model's material.
    pub material: Option<MaterialKey>,
}

impl NodeBinding {
    /// A binding that draws `mesh` with its default model.
    #[must_use]
    pub fn mesh(mesh: MeshKey) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: usize) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn with_material(mut self, material: MaterialKey) -> Self {
        self.material = Some(material);
        self
    }
}

/// A scene node: hierarchy links, a transform and an optional draw binding.
///
/// # Hierarchy
///
/// Nodes form a tree through parent-child relationships:
/// - `parent`: key of the parent node (`None` only for the scene root)
/// - `children`: child node keys, kept duplicate-free by the scene
///
/// # Per-frame state
///
/// The world matrix, the effective enabled flag and the per-camera cache are
/// written by the prepare stage; between frames they hold the last prepared
/// values.
#[derive(Debug, Clone)]
pub struct Node {
    // === Core Hierarchy ===
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,

    // === Core Spatial Data ===
    /// Transform component (hot data accessed every frame)
    pub transform: Transform,
    pub(crate) world_matrix: DMat4,
    /// Transform version the world matrix was last built from.
    pub(crate) world_version: Option<u64>,

    // === Draw Binding ===
    pub name: Option<String>,
    pub mesh: Option<MeshKey>,
    pub model: Option<usize>,
    pub material: Option<MaterialKey>,

    // === Core State ===
    /// Local enabled flag; a disabled node hides its whole subtree.
    pub enabled: bool,
    pub(crate) world_enabled: bool,

    // === Per-camera frame cache ===
    pub(crate) cam_states: FxHashMap<CameraKey, NodeCamState>,
}

impl Node {
    /// Creates a detached node from a binding.
    #[must_use]
    pub fn new(binding: NodeBinding) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            world_matrix: DMat4::IDENTITY,
            world_version: None,
            name: binding.name,
            mesh: binding.mesh,
            model: binding.model,
            material: binding.material,
            enabled: true,
            world_enabled: true,
            cam_states: FxHashMap::default(),
        }
    }

    /// Returns the parent node key, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Returns a read-only slice of child node keys.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// The world transformation matrix from the last prepare pass.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &DMat4 {
        &self.world_matrix
    }

    /// Whether this node and all of its ancestors were enabled at the last
    /// prepare pass.
    #[inline]
    #[must_use]
    pub fn is_world_enabled(&self) -> bool {
        self.world_enabled
    }

    /// This node's cached state for `camera`, once a prepare pass has seen
    /// the pair.
    #[must_use]
    pub fn cam_state(&self, camera: CameraKey) -> Option<&NodeCamState> {
        self.cam_states.get(&camera)
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(NodeBinding::default())
    }
}
