//! Engine Core Module
//!
//! This module contains [`Engine`], the central coordinator of the rendering
//! engine. It is a pure engine instance without any window or GPU-context
//! management, allowing it to be driven by different hosts (a windowed GL
//! frontend, a headless test harness, tooling).
//!
//! # Architecture
//!
//! The engine owns state; the frame loop drives it:
//!
//! - **`AssetLibrary`**: meshes, materials, effects, program/texture handles
//! - **Scenes / Cameras / Canvases**: the scene graph and its observers
//! - **`TechniqueRegistry` / `MeshBuffers`**: GPU-side vertex plumbing
//! - **`GpuDevice`**: the boxed device seam every GPU call goes through
//!
//! # Example
//!
//! ```rust,ignore
//! use janus::{CanvasSizing, Engine, FrameLoop};
//!
//! let mut engine = Engine::new(device, 1280, 720)?;
//! let canvas = engine.add_canvas(None, CanvasSizing::Relative { width: 1.0, height: 1.0 })?;
//! let scene = engine.add_scene("main");
//! let camera = engine.add_camera(canvas, scene, janus::render::technique::SCENE)?;
//!
//! let mut frame_loop = FrameLoop::new(0)?;
//! loop {
//!     frame_loop.tick(&mut engine, &mut host, |engine, dt| {
//!         // per-frame application logic
//!     })?;
//! }
//! ```

use slotmap::SlotMap;

use crate::assets::{AssetLibrary, EffectKey, FaceEffects, MaterialKey, MeshData, MeshKey};
use crate::errors::{EngineError, Result};
use crate::gpu::{DeviceLimits, GpuDevice, ProgramHandle, TargetHandle, TextureHandle, VertexLayout};
use crate::render::{
    CanvasSizing, MeshBuffer, MeshBufferKey, MeshBuffers, RenderCanvas, TechniqueKey,
    TechniqueRegistry,
};
use crate::scene::{Camera, CameraKey, NodeBinding, NodeKey, Scene, SceneKey};

/// The core engine instance owning all rendering state.
///
/// `Engine` holds no window and no frame loop of its own; pair it with a
/// [`FrameLoop`](crate::frame::FrameLoop) and a
/// [`WindowHost`](crate::frame::WindowHost) to drive frames.
///
/// # Components
///
/// - `assets`: central registry for meshes, materials, effects
/// - `scenes`: independent scene graphs, keyed generationally
/// - `cameras`: observers, each attached to exactly one canvas
/// - `canvases`: render targets in draw order, exactly one final
/// - `techniques` / `mesh_buffers`: vertex layouts and pooled GPU storage
/// - `device`: the GPU seam; all device work funnels through it
///
/// # Lifecycle
///
/// 1. Create with [`Engine::new`] (stock techniques are registered)
/// 2. Register collaborator output: programs, textures, meshes, effects
/// 3. Build mesh buffers, scenes, cameras, canvases
/// 4. Tick through a `FrameLoop`
/// 5. [`Engine::dispose`] releases GPU objects when shutting down
pub struct Engine {
    pub(crate) device: Box<dyn GpuDevice>,
    pub(crate) assets: AssetLibrary,
    pub(crate) scenes: SlotMap<SceneKey, Scene>,
    pub(crate) cameras: SlotMap<CameraKey, Camera>,
    pub(crate) canvases: Vec<RenderCanvas>,
    pub(crate) techniques: TechniqueRegistry,
    pub(crate) mesh_buffers: MeshBuffers,

    window_width: u32,
    window_height: u32,
}

impl Engine {
    /// Creates an engine over `device` with the initial window size.
    ///
    /// The stock techniques (`scene`, `screen_quad`) are registered here, so
    /// mesh buffers created afterwards carry vertex arrays for both.
    pub fn new(device: Box<dyn GpuDevice>, width: u32, height: u32) -> Result<Self> {
        let mut techniques = TechniqueRegistry::new();
        techniques.register_stock()?;

        let limits = device.limits();
        log::info!(
            "Engine initialized: {width}x{height} window, {} texture units",
            limits.max_texture_units
        );

        Ok(Self {
            device,
            assets: AssetLibrary::new(),
            scenes: SlotMap::with_key(),
            cameras: SlotMap::with_key(),
            canvases: Vec::new(),
            techniques,
            mesh_buffers: MeshBuffers::new(),
            window_width: width,
            window_height: height,
        })
    }

    /// Current window size in pixels as `(width, height)`.
    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    /// Static limits of the underlying device.
    #[inline]
    #[must_use]
    pub fn device_limits(&self) -> DeviceLimits {
        self.device.limits()
    }

    /// Direct access to the GPU seam, for host-side object creation
    /// (offscreen render targets in particular).
    pub fn device_mut(&mut self) -> &mut dyn GpuDevice {
        self.device.as_mut()
    }

    /// Handles window resize events.
    ///
    /// Relatively sized canvases follow the new window size; camera viewports
    /// re-resolve against their canvas on the next prepared frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
        for canvas in &mut self.canvases {
            canvas.on_resize(width, height);
        }
    }

    // ========================================================================
    // Scenes
    // ========================================================================

    /// Creates an empty scene (root node included) and returns its key.
    pub fn add_scene(&mut self, name: impl Into<String>) -> SceneKey {
        self.scenes.insert(Scene::new(name))
    }

    #[must_use]
    pub fn scene(&self, key: SceneKey) -> Option<&Scene> {
        self.scenes.get(key)
    }

    pub fn scene_mut(&mut self, key: SceneKey) -> Option<&mut Scene> {
        self.scenes.get_mut(key)
    }

    /// Creates a child node, resolving asset references by string id.
    ///
    /// `mesh_id` picks the mesh; `model_id` picks one of the mesh's named
    /// model variants (the default model when `None`).
    pub fn add_child_by_id(
        &mut self,
        scene: SceneKey,
        parent: NodeKey,
        mesh_id: Option<&str>,
        model_id: Option<&str>,
    ) -> Result<NodeKey> {
        let mesh = mesh_id.map(|id| self.assets.mesh_key(id)).transpose()?;

        let model = if let Some(name) = model_id {
            let Some(mesh_key) = mesh else {
                return Err(EngineError::UnknownId {
                    kind: "model",
                    id: name.to_owned(),
                });
            };
            // mesh_key came from the lookup above, the mesh is live
            let index = self
                .assets
                .mesh(mesh_key)
                .and_then(|m| m.model_index(name))
                .ok_or_else(|| EngineError::UnknownId {
                    kind: "model",
                    id: name.to_owned(),
                })?;
            Some(index)
        } else {
            None
        };

        let scene = self
            .scenes
            .get_mut(scene)
            .ok_or(EngineError::StaleKey { kind: "scene" })?;
        let binding = NodeBinding {
            mesh,
            model,
            ..NodeBinding::default()
        };
        scene.add_child(parent, binding)
    }

    // ========================================================================
    // Cameras & Canvases
    // ========================================================================

    /// Adds a canvas at the end of the draw order and returns its index.
    ///
    /// `target: None` makes this the final canvas (default framebuffer);
    /// only one final canvas may exist.
    pub fn add_canvas(
        &mut self,
        target: Option<TargetHandle>,
        sizing: CanvasSizing,
    ) -> Result<usize> {
        if target.is_none()
            && let Some(existing) = self.canvases.iter().position(RenderCanvas::is_final)
        {
            return Err(EngineError::FinalCanvasExists { existing });
        }
        let mut canvas = RenderCanvas::new(target, sizing);
        canvas.on_resize(self.window_width, self.window_height);
        self.canvases.push(canvas);
        Ok(self.canvases.len() - 1)
    }

    #[must_use]
    pub fn canvas(&self, index: usize) -> Option<&RenderCanvas> {
        self.canvases.get(index)
    }

    pub fn canvas_mut(&mut self, index: usize) -> Option<&mut RenderCanvas> {
        self.canvases.get_mut(index)
    }

    #[must_use]
    pub fn canvas_count(&self) -> usize {
        self.canvases.len()
    }

    /// Creates a camera on `canvas` observing `scene` through `technique`.
    ///
    /// The camera joins exactly this canvas; its draw order within the canvas
    /// is insertion order.
    pub fn add_camera(
        &mut self,
        canvas: usize,
        scene: SceneKey,
        technique: &str,
    ) -> Result<CameraKey> {
        let technique = self.techniques.resolve(technique)?;
        if !self.scenes.contains_key(scene) {
            return Err(EngineError::StaleKey { kind: "scene" });
        }
        let Some(canvas) = self.canvases.get_mut(canvas) else {
            return Err(EngineError::UnknownId {
                kind: "canvas",
                id: canvas.to_string(),
            });
        };

        let key = self.cameras.insert(Camera::new(scene, technique));
        canvas.cameras.push(key);
        Ok(key)
    }

    #[must_use]
    pub fn camera(&self, key: CameraKey) -> Option<&Camera> {
        self.cameras.get(key)
    }

    pub fn camera_mut(&mut self, key: CameraKey) -> Option<&mut Camera> {
        self.cameras.get_mut(key)
    }

    /// Removes a camera, detaching it from its canvas and dropping every
    /// per-node cache entry it left in its scene.
    pub fn remove_camera(&mut self, key: CameraKey) -> Result<()> {
        let camera = self
            .cameras
            .remove(key)
            .ok_or(EngineError::StaleKey { kind: "camera" })?;
        for canvas in &mut self.canvases {
            canvas.cameras.retain(|&c| c != key);
        }
        if let Some(scene) = self.scenes.get_mut(camera.scene) {
            scene.prune_camera(key);
        }
        Ok(())
    }

    // ========================================================================
    // Assets (collaborator registration)
    // ========================================================================

    /// Validates and stores mesh data under `id`.
    pub fn add_mesh(&mut self, id: impl Into<String>, data: MeshData) -> Result<MeshKey> {
        self.assets.add_mesh(id, data)
    }

    /// Stores a material over a previously added effect.
    pub fn add_material(
        &mut self,
        id: impl Into<String>,
        default_effect: EffectKey,
        face_effects: FaceEffects,
    ) -> Result<MaterialKey> {
        self.assets.add_material(id, default_effect, face_effects)
    }

    /// Stores an effect by program and texture ids.
    ///
    /// The texture count is validated against the device's texture-unit
    /// limit here, so the render stage never has to.
    pub fn add_effect(
        &mut self,
        id: impl Into<String>,
        program_id: &str,
        texture_ids: &[&str],
    ) -> Result<EffectKey> {
        let id = id.into();
        let limit = self.device.limits().max_texture_units;
        if texture_ids.len() > limit as usize {
            return Err(EngineError::TextureUnitsExceeded {
                effect: id,
                count: texture_ids.len(),
                limit,
            });
        }
        let program = self.assets.program(program_id)?;
        let textures = texture_ids
            .iter()
            .map(|tex| self.assets.texture(tex))
            .collect::<Result<Vec<TextureHandle>>>()?;
        self.assets.add_effect(id, program, textures)
    }

    /// Registers an externally linked shader program under `id`.
    pub fn register_program(&mut self, id: impl Into<String>, handle: ProgramHandle) -> Result<()> {
        self.assets.register_program(id, handle)
    }

    /// Registers an externally decoded texture under `id`.
    pub fn register_texture(&mut self, id: impl Into<String>, handle: TextureHandle) -> Result<()> {
        self.assets.register_texture(id, handle)
    }

    #[must_use]
    pub fn assets(&self) -> &AssetLibrary {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetLibrary {
        &mut self.assets
    }

    // ========================================================================
    // Techniques & Mesh Buffers
    // ========================================================================

    /// Registers a custom vertex-layout technique.
    ///
    /// Register techniques before creating mesh buffers; buffers build one
    /// vertex array per technique known at creation time.
    pub fn register_technique(
        &mut self,
        name: impl Into<String>,
        layout: &'static VertexLayout,
    ) -> Result<TechniqueKey> {
        self.techniques.register(name, layout)
    }

    pub fn technique_key(&self, name: &str) -> Result<TechniqueKey> {
        self.techniques.resolve(name)
    }

    /// Creates a fixed-capacity mesh buffer (counts in vertices/indices).
    pub fn create_mesh_buffer(
        &mut self,
        id: impl Into<String>,
        vertex_capacity: u32,
        index_capacity: u32,
    ) -> Result<MeshBufferKey> {
        self.mesh_buffers.create(
            self.device.as_mut(),
            &self.techniques,
            id,
            vertex_capacity,
            index_capacity,
        )
    }

    /// Makes `mesh` a member of `buffer`; its data uploads on first draw.
    pub fn add_mesh_to_buffer(&mut self, buffer: MeshBufferKey, mesh: MeshKey) -> Result<()> {
        self.mesh_buffers.add_mesh(buffer, mesh, &mut self.assets)
    }

    /// Detaches `mesh` from `buffer`. The abandoned span is not recycled.
    pub fn remove_mesh_from_buffer(&mut self, buffer: MeshBufferKey, mesh: MeshKey) -> Result<()> {
        self.mesh_buffers.remove_mesh(buffer, mesh, &mut self.assets)
    }

    /// Disposes the mesh buffer registered under `id`.
    pub fn remove_mesh_buffer(&mut self, id: &str) -> Result<()> {
        self.mesh_buffers
            .remove(self.device.as_mut(), id, &mut self.assets)
    }

    #[must_use]
    pub fn mesh_buffer(&self, key: MeshBufferKey) -> Option<&MeshBuffer> {
        self.mesh_buffers.get(key)
    }

    pub fn mesh_buffer_key(&self, id: &str) -> Result<MeshBufferKey> {
        self.mesh_buffers.key(id)
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Releases every GPU object the engine created.
    ///
    /// Host-registered programs and textures stay the host's to free. Keeps
    /// going past individual dispose failures and returns the first error.
    pub fn dispose(&mut self) -> Result<()> {
        self.mesh_buffers
            .dispose_all(self.device.as_mut(), &mut self.assets)
    }
}
