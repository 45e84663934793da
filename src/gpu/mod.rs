//! GPU seam: device trait, handle types, vertex layouts and the headless
//! test device.

pub mod device;
pub mod headless;
pub mod layout;

pub use device::{
    BufferHandle, BufferKind, DeviceLimits, GpuDevice, GpuError, GpuMat4, ProgramHandle, RectPx,
    TargetHandle, TextureHandle, VertexArrayHandle,
};
pub use headless::{GpuOp, HeadlessDevice};
pub use layout::{
    INDEX_STRIDE, SCENE_LAYOUT, SCREEN_QUAD_LAYOUT, VERTEX_FLOATS, VERTEX_STRIDE, VertexAttr,
    VertexLayout,
};
