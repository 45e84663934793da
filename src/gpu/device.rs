//! GPU Device Abstraction
//!
//! The engine never talks to a graphics API directly. Everything the render
//! stage needs is expressed through the [`GpuDevice`] trait: buffer and vertex
//! array management, program/texture binds, uniform upload and indexed draws.
//! A windowed backend implements this trait against a real context; tests and
//! tools use [`HeadlessDevice`](crate::gpu::HeadlessDevice).
//!
//! Handles are plain ids minted by the device. They carry no lifetime and stay
//! valid until the matching dispose call.

use bytemuck::{Pod, Zeroable};
use glam::DMat4;
use thiserror::Error;

// ============================================================================
// Handles
// ============================================================================

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub(crate) const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Raw device id, unique per object class.
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_handle!(
    /// A GPU data buffer (vertex or index pool).
    BufferHandle
);
define_handle!(
    /// A vertex array object tying a buffer pair to an attribute layout.
    VertexArrayHandle
);
define_handle!(
    /// A linked shader program. Compilation happens outside the engine; the
    /// host registers finished programs by handle.
    ProgramHandle
);
define_handle!(
    /// A sampled texture. Decoding and upload happen outside the engine.
    TextureHandle
);
define_handle!(
    /// An offscreen render target. `None` in binding positions means the
    /// default framebuffer.
    TargetHandle
);

/// What a buffer stores. Determines the bind point backends use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Interleaved vertex data.
    Vertex,
    /// `u32` triangle indices.
    Index,
}

/// Static limits reported by the device at startup.
#[derive(Clone, Copy, Debug)]
pub struct DeviceLimits {
    /// Number of simultaneously bindable texture units.
    pub max_texture_units: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_units: 16,
        }
    }
}

/// A pixel rectangle, origin at the lower-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RectPx {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl RectPx {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

// ============================================================================
// GPU-ready matrix
// ============================================================================

/// A column-major `f32` matrix in the layout uniform upload expects.
///
/// CPU-side scene math runs in `f64` ([`DMat4`]); the sync step of the frame
/// pipeline narrows into this type exactly once per node and camera.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuMat4(pub [f32; 16]);

impl GpuMat4 {
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Narrows a double-precision matrix to the GPU layout.
    #[must_use]
    pub fn from_dmat4(m: &DMat4) -> Self {
        Self(m.as_mat4().to_cols_array())
    }
}

impl Default for GpuMat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<&DMat4> for GpuMat4 {
    fn from(m: &DMat4) -> Self {
        Self::from_dmat4(m)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure surfaced by a device operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The device could not allocate a new object.
    #[error("GPU allocation failed in {op}: {detail}")]
    AllocationFailed {
        /// The operation that failed
        op: &'static str,
        /// Backend-specific detail
        detail: String,
    },

    /// A handle did not refer to a live object.
    #[error("Invalid {kind} handle {raw}")]
    InvalidHandle {
        /// Object class of the handle
        kind: &'static str,
        /// The raw id
        raw: u32,
    },

    /// The device rejected an otherwise well-formed operation.
    #[error("GPU fault in {op}: {detail}")]
    Fault {
        /// The operation that failed
        op: &'static str,
        /// Backend-specific detail
        detail: String,
    },
}

// ============================================================================
// Device trait
// ============================================================================

/// The complete GPU surface the engine renders through.
///
/// All methods take `&mut self`; the render stage is single-threaded and the
/// engine owns the device exclusively. Implementations must leave their
/// internal state consistent when returning an error, so a failed frame can
/// be followed by a clean one.
pub trait GpuDevice {
    /// Static limits of this device.
    fn limits(&self) -> DeviceLimits;

    // ==== Buffers ====

    /// Allocates a buffer of `byte_size` bytes.
    fn create_buffer(&mut self, kind: BufferKind, byte_size: usize) -> Result<BufferHandle, GpuError>;

    /// Writes `data` into `buffer` starting at `byte_offset`.
    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        byte_offset: usize,
        data: &[u8],
    ) -> Result<(), GpuError>;

    /// Releases a buffer.
    fn dispose_buffer(&mut self, buffer: BufferHandle) -> Result<(), GpuError>;

    // ==== Vertex arrays ====

    /// Creates a vertex array binding `vertices` + `indices` under `layout`.
    fn create_vertex_array(
        &mut self,
        vertices: BufferHandle,
        indices: BufferHandle,
        layout: &crate::gpu::VertexLayout,
    ) -> Result<VertexArrayHandle, GpuError>;

    /// Releases a vertex array. The underlying buffers are untouched.
    fn dispose_vertex_array(&mut self, vao: VertexArrayHandle) -> Result<(), GpuError>;

    /// Makes `vao` the source of vertex data for subsequent draws.
    fn bind_vertex_array(&mut self, vao: VertexArrayHandle) -> Result<(), GpuError>;

    // ==== Pipeline state ====

    /// Makes `program` current for subsequent uniforms and draws.
    fn use_program(&mut self, program: ProgramHandle) -> Result<(), GpuError>;

    /// Uploads a matrix uniform of the current program.
    fn set_uniform_matrix(&mut self, name: &str, matrix: &GpuMat4) -> Result<(), GpuError>;

    /// Binds `texture` to the given texture unit.
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<(), GpuError>;

    // ==== Render targets ====

    /// Allocates an offscreen render target.
    fn create_render_target(&mut self, width: u32, height: u32) -> Result<TargetHandle, GpuError>;

    /// Releases an offscreen render target.
    fn dispose_render_target(&mut self, target: TargetHandle) -> Result<(), GpuError>;

    /// Directs subsequent draws at `target`, or at the default framebuffer
    /// for `None`.
    fn bind_render_target(&mut self, target: Option<TargetHandle>) -> Result<(), GpuError>;

    /// Restricts subsequent draws and clears to `rect`.
    fn set_viewport(&mut self, rect: RectPx) -> Result<(), GpuError>;

    /// Clears the bound target. `color: None` leaves the color planes alone.
    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) -> Result<(), GpuError>;

    // ==== Draws ====

    /// Issues an indexed triangle draw from the bound vertex array.
    ///
    /// `first_index` counts indices (not bytes) from the start of the index
    /// buffer; `base_vertex` is added to every fetched index.
    fn draw_elements(
        &mut self,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<(), GpuError>;
}
