#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod gpu;
pub mod assets;
pub mod scene;
pub mod render;
pub mod frame;
pub mod engine;
pub mod errors;

pub use gpu::{
    BufferHandle, BufferKind, DeviceLimits, GpuDevice, GpuError, GpuMat4, HeadlessDevice,
    ProgramHandle, RectPx, TargetHandle, TextureHandle, VertexArrayHandle, VertexLayout,
};
pub use assets::{
    AssetLibrary, BoundingSphere, Effect, EffectKey, FaceEffects, Material, MaterialKey, Mesh,
    MeshData, MeshFace, MeshKey, Model,
};
pub use assets::prefabs;
pub use scene::{
    Camera, CameraKey, Node, NodeBinding, NodeKey, Projection, Scene, SceneKey, Transform,
    TransformUpdate, Viewport,
};
pub use render::{
    BatchCriterion, BatchEntry, BatchList, BatchPriority, CanvasSizing, MeshBuffer, MeshBufferKey,
    MeshBuffers, RenderCanvas, Technique, TechniqueKey, TechniqueRegistry,
};
pub use frame::{FrameClock, FrameLoop, FrameReport, FrameStats, Slots, TaskPool, WindowHost};
pub use engine::Engine;
pub use errors::{EngineError, Result};
