//! Headless GPU Device
//!
//! [`HeadlessDevice`] implements [`GpuDevice`] without any graphics API
//! behind it. It mints handles, tracks which objects are live, validates
//! binds and ranges, and records every operation in an op log.
//!
//! The device is cheaply cloneable and all clones share state, so a test can
//! keep one clone for inspection while the engine owns another:
//!
//! ```rust,ignore
//! let device = HeadlessDevice::new();
//! let mut engine = Engine::new(Box::new(device.clone()));
//! // ... drive the engine ...
//! assert_eq!(device.draw_calls(), 1);
//! ```
//!
//! Failures can be scripted per operation, which is how rollback and
//! frame-abort paths get exercised.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};

use super::device::{
    BufferHandle, BufferKind, DeviceLimits, GpuDevice, GpuError, GpuMat4, ProgramHandle, RectPx,
    TargetHandle, TextureHandle, VertexArrayHandle,
};
use super::layout::VertexLayout;

/// One recorded device operation, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum GpuOp {
    CreateBuffer {
        handle: u32,
        kind: BufferKind,
        byte_size: usize,
    },
    WriteBuffer {
        handle: u32,
        byte_offset: usize,
        byte_len: usize,
    },
    DisposeBuffer {
        handle: u32,
    },
    CreateVertexArray {
        handle: u32,
        vertices: u32,
        indices: u32,
    },
    DisposeVertexArray {
        handle: u32,
    },
    BindVertexArray {
        handle: u32,
    },
    UseProgram {
        handle: u32,
    },
    SetUniformMatrix {
        name: String,
        matrix: GpuMat4,
    },
    BindTexture {
        unit: u32,
        handle: u32,
    },
    CreateRenderTarget {
        handle: u32,
        width: u32,
        height: u32,
    },
    DisposeRenderTarget {
        handle: u32,
    },
    BindRenderTarget {
        handle: Option<u32>,
    },
    SetViewport {
        rect: RectPx,
    },
    Clear {
        color: Option<[f32; 4]>,
        depth: bool,
    },
    DrawElements {
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
}

#[derive(Default)]
struct Inner {
    limits: DeviceLimits,
    next_id: u32,
    buffers: FxHashMap<u32, (BufferKind, usize)>,
    vertex_arrays: FxHashSet<u32>,
    targets: FxHashSet<u32>,
    programs: FxHashSet<u32>,
    textures: FxHashSet<u32>,
    bound_program: Option<u32>,
    bound_vao: Option<u32>,
    ops: Vec<GpuOp>,
    // (操作名, 剩余成功次数): 倒数到 0 时注入一次失败
    faults: Vec<(&'static str, u32)>,
}

impl Inner {
    fn mint(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_fault(&mut self, op: &'static str) -> Result<(), GpuError> {
        for i in 0..self.faults.len() {
            if self.faults[i].0 == op {
                if self.faults[i].1 == 0 {
                    self.faults.remove(i);
                    return Err(GpuError::Fault {
                        op,
                        detail: "injected fault".into(),
                    });
                }
                self.faults[i].1 -= 1;
                return Ok(());
            }
        }
        Ok(())
    }
}

/// An in-memory [`GpuDevice`] for tests and tools. See the module docs.
#[derive(Clone, Default)]
pub struct HeadlessDevice {
    inner: Arc<Mutex<Inner>>,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    #[must_use]
    pub fn with_limits(limits: DeviceLimits) -> Self {
        let device = Self::default();
        device.lock().limits = limits;
        device
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==== Host-side registration ====

    /// Mints a program handle, standing in for an externally linked shader.
    #[must_use]
    pub fn make_program(&self) -> ProgramHandle {
        let mut inner = self.lock();
        let id = inner.mint();
        inner.programs.insert(id);
        ProgramHandle::new(id)
    }

    /// Mints a texture handle, standing in for an externally decoded image.
    #[must_use]
    pub fn make_texture(&self) -> TextureHandle {
        let mut inner = self.lock();
        let id = inner.mint();
        inner.textures.insert(id);
        TextureHandle::new(id)
    }

    // ==== Inspection ====

    /// A snapshot of the op log.
    #[must_use]
    pub fn ops(&self) -> Vec<GpuOp> {
        self.lock().ops.clone()
    }

    /// Drains the op log, returning everything recorded since the last drain.
    pub fn take_ops(&self) -> Vec<GpuOp> {
        std::mem::take(&mut self.lock().ops)
    }

    /// Number of draw calls recorded since the last drain.
    #[must_use]
    pub fn draw_calls(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, GpuOp::DrawElements { .. }))
            .count()
    }

    /// Number of live engine-created objects (buffers, vertex arrays,
    /// render targets). Registered programs/textures are host-owned and
    /// not counted.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        let inner = self.lock();
        inner.buffers.len() + inner.vertex_arrays.len() + inner.targets.len()
    }

    /// Arranges for the `(after + 1)`-th call of `op` from now to fail.
    ///
    /// `op` is the trait method name, e.g. `"create_vertex_array"`.
    pub fn schedule_failure(&self, op: &'static str, after: u32) {
        self.lock().faults.push((op, after));
    }
}

impl GpuDevice for HeadlessDevice {
    fn limits(&self) -> DeviceLimits {
        self.lock().limits
    }

    fn create_buffer(&mut self, kind: BufferKind, byte_size: usize) -> Result<BufferHandle, GpuError> {
        let mut inner = self.lock();
        inner.check_fault("create_buffer")?;
        let id = inner.mint();
        inner.buffers.insert(id, (kind, byte_size));
        inner.ops.push(GpuOp::CreateBuffer {
            handle: id,
            kind,
            byte_size,
        });
        Ok(BufferHandle::new(id))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        byte_offset: usize,
        data: &[u8],
    ) -> Result<(), GpuError> {
        let mut inner = self.lock();
        inner.check_fault("write_buffer")?;
        let Some(&(_, byte_size)) = inner.buffers.get(&buffer.raw()) else {
            return Err(GpuError::InvalidHandle {
                kind: "buffer",
                raw: buffer.raw(),
            });
        };
        if byte_offset + data.len() > byte_size {
            return Err(GpuError::Fault {
                op: "write_buffer",
                detail: format!(
                    "write of {} bytes at offset {byte_offset} exceeds buffer size {byte_size}",
                    data.len()
                ),
            });
        }
        inner.ops.push(GpuOp::WriteBuffer {
            handle: buffer.raw(),
            byte_offset,
            byte_len: data.len(),
        });
        Ok(())
    }

    fn dispose_buffer(&mut self, buffer: BufferHandle) -> Result<(), GpuError> {
        let mut inner = self.lock();
        if inner.buffers.remove(&buffer.raw()).is_none() {
            return Err(GpuError::InvalidHandle {
                kind: "buffer",
                raw: buffer.raw(),
            });
        }
        inner.ops.push(GpuOp::DisposeBuffer {
            handle: buffer.raw(),
        });
        Ok(())
    }

    fn create_vertex_array(
        &mut self,
        vertices: BufferHandle,
        indices: BufferHandle,
        _layout: &VertexLayout,
    ) -> Result<VertexArrayHandle, GpuError> {
        let mut inner = self.lock();
        inner.check_fault("create_vertex_array")?;
        for (raw, kind) in [(vertices.raw(), "buffer"), (indices.raw(), "buffer")] {
            if !inner.buffers.contains_key(&raw) {
                return Err(GpuError::InvalidHandle { kind, raw });
            }
        }
        let id = inner.mint();
        inner.vertex_arrays.insert(id);
        inner.ops.push(GpuOp::CreateVertexArray {
            handle: id,
            vertices: vertices.raw(),
            indices: indices.raw(),
        });
        Ok(VertexArrayHandle::new(id))
    }

    fn dispose_vertex_array(&mut self, vao: VertexArrayHandle) -> Result<(), GpuError> {
        let mut inner = self.lock();
        if !inner.vertex_arrays.remove(&vao.raw()) {
            return Err(GpuError::InvalidHandle {
                kind: "vertex array",
                raw: vao.raw(),
            });
        }
        if inner.bound_vao == Some(vao.raw()) {
            inner.bound_vao = None;
        }
        inner.ops.push(GpuOp::DisposeVertexArray { handle: vao.raw() });
        Ok(())
    }

    fn bind_vertex_array(&mut self, vao: VertexArrayHandle) -> Result<(), GpuError> {
        let mut inner = self.lock();
        inner.check_fault("bind_vertex_array")?;
        if !inner.vertex_arrays.contains(&vao.raw()) {
            return Err(GpuError::InvalidHandle {
                kind: "vertex array",
                raw: vao.raw(),
            });
        }
        inner.bound_vao = Some(vao.raw());
        inner.ops.push(GpuOp::BindVertexArray { handle: vao.raw() });
        Ok(())
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<(), GpuError> {
        let mut inner = self.lock();
        inner.check_fault("use_program")?;
        if !inner.programs.contains(&program.raw()) {
            return Err(GpuError::InvalidHandle {
                kind: "program",
                raw: program.raw(),
            });
        }
        inner.bound_program = Some(program.raw());
        inner.ops.push(GpuOp::UseProgram {
            handle: program.raw(),
        });
        Ok(())
    }

    fn set_uniform_matrix(&mut self, name: &str, matrix: &GpuMat4) -> Result<(), GpuError> {
        let mut inner = self.lock();
        if inner.bound_program.is_none() {
            return Err(GpuError::Fault {
                op: "set_uniform_matrix",
                detail: "no program bound".into(),
            });
        }
        inner.ops.push(GpuOp::SetUniformMatrix {
            name: name.to_owned(),
            matrix: *matrix,
        });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<(), GpuError> {
        let mut inner = self.lock();
        inner.check_fault("bind_texture")?;
        if unit >= inner.limits.max_texture_units {
            return Err(GpuError::Fault {
                op: "bind_texture",
                detail: format!(
                    "unit {unit} exceeds limit {}",
                    inner.limits.max_texture_units
                ),
            });
        }
        if !inner.textures.contains(&texture.raw()) {
            return Err(GpuError::InvalidHandle {
                kind: "texture",
                raw: texture.raw(),
            });
        }
        inner.ops.push(GpuOp::BindTexture {
            unit,
            handle: texture.raw(),
        });
        Ok(())
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<TargetHandle, GpuError> {
        let mut inner = self.lock();
        inner.check_fault("create_render_target")?;
        let id = inner.mint();
        inner.targets.insert(id);
        inner.ops.push(GpuOp::CreateRenderTarget {
            handle: id,
            width,
            height,
        });
        Ok(TargetHandle::new(id))
    }

    fn dispose_render_target(&mut self, target: TargetHandle) -> Result<(), GpuError> {
        let mut inner = self.lock();
        if !inner.targets.remove(&target.raw()) {
            return Err(GpuError::InvalidHandle {
                kind: "render target",
                raw: target.raw(),
            });
        }
        inner.ops.push(GpuOp::DisposeRenderTarget {
            handle: target.raw(),
        });
        Ok(())
    }

    fn bind_render_target(&mut self, target: Option<TargetHandle>) -> Result<(), GpuError> {
        let mut inner = self.lock();
        inner.check_fault("bind_render_target")?;
        if let Some(t) = target {
            if !inner.targets.contains(&t.raw()) {
                return Err(GpuError::InvalidHandle {
                    kind: "render target",
                    raw: t.raw(),
                });
            }
        }
        inner.ops.push(GpuOp::BindRenderTarget {
            handle: target.map(TargetHandle::raw),
        });
        Ok(())
    }

    fn set_viewport(&mut self, rect: RectPx) -> Result<(), GpuError> {
        let mut inner = self.lock();
        inner.check_fault("set_viewport")?;
        inner.ops.push(GpuOp::SetViewport { rect });
        Ok(())
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) -> Result<(), GpuError> {
        let mut inner = self.lock();
        inner.check_fault("clear")?;
        inner.ops.push(GpuOp::Clear { color, depth });
        Ok(())
    }

    fn draw_elements(
        &mut self,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<(), GpuError> {
        let mut inner = self.lock();
        inner.check_fault("draw_elements")?;
        if inner.bound_program.is_none() {
            return Err(GpuError::Fault {
                op: "draw_elements",
                detail: "no program bound".into(),
            });
        }
        if inner.bound_vao.is_none() {
            return Err(GpuError::Fault {
                op: "draw_elements",
                detail: "no vertex array bound".into(),
            });
        }
        inner.ops.push(GpuOp::DrawElements {
            index_count,
            first_index,
            base_vertex,
        });
        Ok(())
    }
}
