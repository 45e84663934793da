//! 网格缓冲池 (Mesh Buffer)
//!
//! 固定容量的顶点/索引 GPU 存储，多个网格共享一份 vbo/ibo。
//! 每个缓冲按注册的 Technique 各建一个 VAO，绘制时按技术取用。
//!
//! 分配游标只进不退：移除成员不回收空间（接受碎片化，压缩不在
//! 范围内）。容量在创建时固定，超出即报错而不是扩容。

use rustc_hash::FxHashMap;

use crate::assets::{AssetLibrary, AssetStore, MeshKey};
use crate::errors::{EngineError, Result};
use crate::gpu::layout::{INDEX_STRIDE, VERTEX_STRIDE};
use crate::gpu::{BufferHandle, BufferKind, GpuDevice, VertexArrayHandle};
use crate::render::technique::TechniqueRegistry;
use crate::render::{MeshBufferKey, TechniqueKey};

/// Where a member mesh lives inside its buffer, in vertices/indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshSpan {
    pub base_vertex: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub index_count: u32,
}

/// A fixed-capacity vertex/index store shared by multiple meshes.
pub struct MeshBuffer {
    id: String,
    vertex_capacity: u32,
    index_capacity: u32,

    vbo: BufferHandle,
    ibo: BufferHandle,
    // 每个 Technique 一个 VAO, 共享同一对 vbo/ibo
    vaos: FxHashMap<TechniqueKey, VertexArrayHandle>,

    members: FxHashMap<MeshKey, MeshSpan>,
    vertex_cursor: u32,
    index_cursor: u32,
}

impl MeshBuffer {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn vertex_capacity(&self) -> u32 {
        self.vertex_capacity
    }

    #[must_use]
    pub fn index_capacity(&self) -> u32 {
        self.index_capacity
    }

    /// Vertices handed out so far (cursors never rewind).
    #[must_use]
    pub fn used_vertices(&self) -> u32 {
        self.vertex_cursor
    }

    #[must_use]
    pub fn used_indices(&self) -> u32 {
        self.index_cursor
    }

    #[must_use]
    pub fn vbo(&self) -> BufferHandle {
        self.vbo
    }

    /// The index buffer handle, also the buffer's sort identity.
    #[must_use]
    pub fn ibo(&self) -> BufferHandle {
        self.ibo
    }

    #[must_use]
    pub fn vao(&self, technique: TechniqueKey) -> Option<VertexArrayHandle> {
        self.vaos.get(&technique).copied()
    }

    #[must_use]
    pub fn span(&self, mesh: MeshKey) -> Option<&MeshSpan> {
        self.members.get(&mesh)
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Uploads interleaved vertex data and indices into a member's span.
    ///
    /// Called on demand by the render stage for meshes whose `gpu_synced`
    /// flag is clear.
    pub(crate) fn upload(
        &self,
        device: &mut dyn GpuDevice,
        span: MeshSpan,
        vertices: &[f32],
        indices: &[u32],
    ) -> Result<()> {
        device.write_buffer(
            self.vbo,
            span.base_vertex as usize * VERTEX_STRIDE,
            bytemuck::cast_slice(vertices),
        )?;
        device.write_buffer(
            self.ibo,
            span.first_index as usize * INDEX_STRIDE,
            bytemuck::cast_slice(indices),
        )?;
        Ok(())
    }
}

/// Registry of mesh buffers by key and string id.
#[derive(Default)]
pub struct MeshBuffers {
    store: AssetStore<MeshBufferKey, MeshBuffer>,
}

impl MeshBuffers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer with fixed capacities (counted in vertices and
    /// indices) and one vertex array per registered technique.
    ///
    /// Creation is atomic: if any GPU call fails, every object already
    /// created for this buffer is disposed before the error returns.
    pub fn create(
        &mut self,
        device: &mut dyn GpuDevice,
        techniques: &TechniqueRegistry,
        id: impl Into<String>,
        vertex_capacity: u32,
        index_capacity: u32,
    ) -> Result<MeshBufferKey> {
        let id = id.into();
        // 先查重, 避免为注定失败的创建分配 GPU 对象
        if self.store.contains_id(&id) {
            return Err(EngineError::DuplicateId {
                kind: "mesh buffer",
                id,
            });
        }

        let vbo = device.create_buffer(
            BufferKind::Vertex,
            vertex_capacity as usize * VERTEX_STRIDE,
        )?;
        let ibo = match device.create_buffer(
            BufferKind::Index,
            index_capacity as usize * INDEX_STRIDE,
        ) {
            Ok(handle) => handle,
            Err(err) => {
                dispose_quietly(device, &[], &[vbo]);
                return Err(err.into());
            }
        };

        // 每个已注册的 Technique 建一个 VAO
        let mut vaos = FxHashMap::default();
        for (tech_key, tech) in techniques.iter() {
            match device.create_vertex_array(vbo, ibo, tech.layout) {
                Ok(vao) => {
                    vaos.insert(tech_key, vao);
                }
                Err(err) => {
                    // 回滚已创建的全部对象, 不留半成品
                    let made: Vec<_> = vaos.values().copied().collect();
                    dispose_quietly(device, &made, &[ibo, vbo]);
                    return Err(err.into());
                }
            }
        }

        log::debug!(
            "Mesh buffer '{id}' created: {vertex_capacity} vertices, {index_capacity} indices, {} techniques",
            vaos.len()
        );

        self.store.insert(
            "mesh buffer",
            id.clone(),
            MeshBuffer {
                id,
                vertex_capacity,
                index_capacity,
                vbo,
                ibo,
                vaos,
                members: FxHashMap::default(),
                vertex_cursor: 0,
                index_cursor: 0,
            },
        )
    }

    /// Makes `mesh` a member of `buffer`, allocating a span for it.
    ///
    /// A mesh can belong to one buffer at a time; re-adding to the same
    /// buffer and adding to a second buffer are distinct errors. A mesh
    /// that does not fit the remaining capacity is rejected with the
    /// member set unchanged.
    pub fn add_mesh(
        &mut self,
        buffer: MeshBufferKey,
        mesh: MeshKey,
        assets: &mut AssetLibrary,
    ) -> Result<()> {
        let buf = self
            .store
            .get(buffer)
            .ok_or(EngineError::StaleKey { kind: "mesh buffer" })?;
        let mesh_ref = assets.mesh(mesh).ok_or(EngineError::StaleKey { kind: "mesh" })?;

        // 1. 归属检查: 同一缓冲重复添加 / 已属于其他缓冲
        if let Some(owner) = mesh_ref.buffer() {
            if owner == buffer {
                return Err(EngineError::AlreadyInBuffer {
                    mesh: mesh_ref.id().to_owned(),
                    buffer: buf.id.clone(),
                });
            }
            let owner_id = self
                .store
                .get(owner)
                .map_or_else(|| "<disposed>".to_owned(), |b| b.id.clone());
            return Err(EngineError::BufferConflict {
                mesh: mesh_ref.id().to_owned(),
                owner: owner_id,
            });
        }

        // 2. 容量检查, 两个池都先查完再动任何状态
        let vertex_count = mesh_ref.vertex_count();
        let index_count = mesh_ref.index_count();
        let vertex_room = buf.vertex_capacity - buf.vertex_cursor;
        let index_room = buf.index_capacity - buf.index_cursor;
        if vertex_count > vertex_room {
            return Err(EngineError::CapacityExceeded {
                buffer: buf.id.clone(),
                resource: "vertex",
                requested: vertex_count,
                available: vertex_room,
            });
        }
        if index_count > index_room {
            return Err(EngineError::CapacityExceeded {
                buffer: buf.id.clone(),
                resource: "index",
                requested: index_count,
                available: index_room,
            });
        }

        // 3. 分配 span, 游标前移
        let buf = self
            .store
            .get_mut(buffer)
            .ok_or(EngineError::StaleKey { kind: "mesh buffer" })?;
        let span = MeshSpan {
            base_vertex: buf.vertex_cursor,
            vertex_count,
            first_index: buf.index_cursor,
            index_count,
        };
        buf.vertex_cursor += vertex_count;
        buf.index_cursor += index_count;
        buf.members.insert(mesh, span);

        // 4. 反向关联, 标记待上传
        if let Some(m) = assets.mesh_mut(mesh) {
            m.buffer = Some(buffer);
            m.gpu_synced = false;
        }
        Ok(())
    }

    /// Detaches `mesh` from `buffer`.
    ///
    /// The span is abandoned, not recycled; capacity does not come back.
    pub fn remove_mesh(
        &mut self,
        buffer: MeshBufferKey,
        mesh: MeshKey,
        assets: &mut AssetLibrary,
    ) -> Result<()> {
        let buf = self
            .store
            .get_mut(buffer)
            .ok_or(EngineError::StaleKey { kind: "mesh buffer" })?;
        let mesh_ref = assets.mesh(mesh).ok_or(EngineError::StaleKey { kind: "mesh" })?;

        if buf.members.remove(&mesh).is_none() {
            return Err(EngineError::NotInBuffer {
                mesh: mesh_ref.id().to_owned(),
                buffer: buf.id.clone(),
            });
        }
        if let Some(m) = assets.mesh_mut(mesh) {
            m.buffer = None;
            m.gpu_synced = false;
        }
        Ok(())
    }

    /// Disposes the buffer registered under `id` and detaches its members.
    pub fn remove(
        &mut self,
        device: &mut dyn GpuDevice,
        id: &str,
        assets: &mut AssetLibrary,
    ) -> Result<()> {
        let (_, buf) = self.store.remove_by_id("mesh buffer", id)?;
        release(device, buf, assets)
    }

    /// Disposes every buffer. Continues past individual dispose failures
    /// and returns the first error encountered.
    pub fn dispose_all(
        &mut self,
        device: &mut dyn GpuDevice,
        assets: &mut AssetLibrary,
    ) -> Result<()> {
        let mut first_err = None;
        for (_, buf) in self.store.drain() {
            if let Err(err) = release(device, buf, assets) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn get(&self, key: MeshBufferKey) -> Option<&MeshBuffer> {
        self.store.get(key)
    }

    pub fn key(&self, id: &str) -> Result<MeshBufferKey> {
        self.store.resolve("mesh buffer", id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Releases one buffer's GPU objects and detaches its members.
fn release(device: &mut dyn GpuDevice, buf: MeshBuffer, assets: &mut AssetLibrary) -> Result<()> {
    let mut first_err = None;

    for vao in buf.vaos.values() {
        if let Err(err) = device.dispose_vertex_array(*vao) {
            first_err.get_or_insert(err);
        }
    }
    if let Err(err) = device.dispose_buffer(buf.ibo) {
        first_err.get_or_insert(err);
    }
    if let Err(err) = device.dispose_buffer(buf.vbo) {
        first_err.get_or_insert(err);
    }

    for mesh in buf.members.keys() {
        if let Some(m) = assets.mesh_mut(*mesh) {
            m.buffer = None;
            m.gpu_synced = false;
        }
    }

    match first_err {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Rollback-path disposal: failures are logged, the original error wins.
fn dispose_quietly(
    device: &mut dyn GpuDevice,
    vaos: &[VertexArrayHandle],
    buffers: &[BufferHandle],
) {
    for vao in vaos {
        if let Err(err) = device.dispose_vertex_array(*vao) {
            log::warn!("dispose during rollback failed: {err}");
        }
    }
    for buffer in buffers {
        if let Err(err) = device.dispose_buffer(*buffer) {
            log::warn!("dispose during rollback failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::prefabs;
    use crate::gpu::HeadlessDevice;

    fn fixture() -> (HeadlessDevice, TechniqueRegistry, AssetLibrary, MeshBuffers) {
        let device = HeadlessDevice::default();
        let mut techniques = TechniqueRegistry::new();
        techniques.register_stock().unwrap();
        (device, techniques, AssetLibrary::new(), MeshBuffers::new())
    }

    #[test]
    fn spans_are_contiguous_and_cursors_never_rewind() {
        let (mut device, techniques, mut assets, mut buffers) = fixture();
        let plane = assets.add_mesh("plane", prefabs::plane(1.0, 1.0)).unwrap();
        let cube = assets.add_mesh("cube", prefabs::cube(1.0, 1.0, 1.0)).unwrap();

        let key = buffers
            .create(&mut device, &techniques, "main", 64, 128)
            .unwrap();
        buffers.add_mesh(key, plane, &mut assets).unwrap();
        buffers.add_mesh(key, cube, &mut assets).unwrap();

        let buf = buffers.get(key).unwrap();
        let plane_span = *buf.span(plane).unwrap();
        let cube_span = *buf.span(cube).unwrap();
        assert_eq!(plane_span.base_vertex, 0);
        assert_eq!(cube_span.base_vertex, plane_span.vertex_count);
        assert_eq!(cube_span.first_index, plane_span.index_count);

        // 移除不回收空间
        let used_before = buf.used_vertices();
        buffers.remove_mesh(key, plane, &mut assets).unwrap();
        let buf = buffers.get(key).unwrap();
        assert_eq!(buf.used_vertices(), used_before);
        assert!(buf.span(plane).is_none());
        assert!(assets.mesh(plane).unwrap().buffer().is_none());

        // 重新加入拿到的是新 span, 排在游标之后
        buffers.add_mesh(key, plane, &mut assets).unwrap();
        let buf = buffers.get(key).unwrap();
        assert_eq!(
            buf.span(plane).unwrap().base_vertex,
            cube_span.base_vertex + cube_span.vertex_count
        );
    }

    #[test]
    fn vao_per_registered_technique() {
        let (mut device, techniques, _assets, mut buffers) = fixture();
        let key = buffers
            .create(&mut device, &techniques, "main", 16, 16)
            .unwrap();
        let buf = buffers.get(key).unwrap();

        for (tech_key, _) in techniques.iter() {
            assert!(buf.vao(tech_key).is_some());
        }
    }
}
