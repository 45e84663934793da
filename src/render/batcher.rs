//! 渲染批次构建 (Render Batcher)
//!
//! 把某相机可见的节点收集成绘制候选，再并行展开成 BatchEntry，
//! 最后按可配置的三级 GPU 状态优先级排序，使相同 program / 缓冲 /
//! 纹理组的条目相邻，提交时状态切换最少。
//!
//! 展开经由 [`TaskPool::scatter`]：每个候选一个任务，任务只读共享
//! 查找表；join 屏障保证排序开始前所有任务完成，任一任务失败则整个
//! 重建带错返回。

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::assets::{AssetLibrary, EffectKey, MeshKey};
use crate::errors::{EngineError, Result};
use crate::frame::TaskPool;
use crate::gpu::{BufferHandle, ProgramHandle, TextureHandle};
use crate::render::mesh_buffer::MeshBuffers;
use crate::scene::{CameraKey, NodeKey, Scene};

/// One GPU-state sort level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchCriterion {
    /// Order by GPU program handle.
    Program,
    /// Order by mesh-buffer identity (its index buffer handle).
    Buffer,
    /// Order by texture-unit array, lexicographically; untextured entries
    /// sort before textured ones.
    Texture,
}

/// Three sort levels, applied in order with later levels as tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPriority(pub [BatchCriterion; 3]);

impl Default for BatchPriority {
    fn default() -> Self {
        Self([
            BatchCriterion::Program,
            BatchCriterion::Buffer,
            BatchCriterion::Texture,
        ])
    }
}

impl BatchPriority {
    /// Compares two entries under this priority. Full ties are `Equal`;
    /// their relative draw order is unspecified.
    #[must_use]
    pub fn compare(&self, a: &BatchEntry, b: &BatchEntry) -> Ordering {
        for criterion in self.0 {
            let ord = match criterion {
                BatchCriterion::Program => a.program.cmp(&b.program),
                BatchCriterion::Buffer => a.buffer.cmp(&b.buffer),
                BatchCriterion::Texture => a.texes.cmp(&b.texes),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// One draw candidate, tagged with everything the submit loop binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub node: NodeKey,
    pub mesh: MeshKey,
    pub program: ProgramHandle,
    pub effect: EffectKey,
    /// Mesh-buffer identity (the buffer's ibo handle).
    pub buffer: BufferHandle,
    pub texes: SmallVec<[TextureHandle; 8]>,
    /// Face index for per-face-effect meshes; whole mesh when `None`.
    pub face: Option<u32>,
}

/// 并行展开前的候选: 可见性和材质解析已完成, 只差查表
#[derive(Debug, Clone, Copy)]
struct Candidate {
    node: NodeKey,
    mesh: MeshKey,
    effect: EffectKey,
    face: Option<u32>,
}

/// Shared read-only lookups for entry construction tasks.
pub struct BatchContext<'a> {
    pub assets: &'a AssetLibrary,
    pub buffers: &'a MeshBuffers,
}

/// The sorted draw list for one camera, rebuilt every prepared frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchList {
    entries: Vec<BatchEntry>,
}

impl BatchList {
    #[must_use]
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds this list from the nodes cached visible for `camera`.
    ///
    /// Runs in three steps: candidate collection, parallel entry
    /// construction, three-level sort. The entry vector's capacity is
    /// retained across rebuilds.
    pub fn rebuild(
        &mut self,
        ctx: &BatchContext<'_>,
        camera: CameraKey,
        priority: BatchPriority,
        scene: &Scene,
        tasks: &TaskPool,
    ) -> Result<()> {
        // ==== 1. 候选收集 ====
        let mut candidates: Vec<Candidate> = Vec::with_capacity(self.entries.len().max(16));

        for (key, node) in scene.iter() {
            // prepare 阶段写入的逐相机可见性
            let Some(state) = node.cam_state(camera) else {
                continue;
            };
            if !state.visible {
                continue;
            }
            let Some(mesh_key) = node.mesh else {
                continue;
            };
            let Some(mesh) = ctx.assets.mesh(mesh_key) else {
                log::warn!("node references a missing mesh, skipped");
                continue;
            };
            if mesh.buffer().is_none() {
                // 不在任何缓冲里的网格无法绘制
                log::debug!("mesh '{}' is not in a mesh buffer, skipped", mesh.id());
                continue;
            }

            let model_index = node.model.unwrap_or(0);
            let Some(model) = mesh.model(model_index) else {
                log::warn!(
                    "node references model {} of mesh '{}' which does not exist, skipped",
                    model_index,
                    mesh.id()
                );
                continue;
            };

            // 节点覆盖优先, 其次模型自带材质
            let Some(material_key) = node.material.or(model.material) else {
                log::debug!("mesh '{}' has no material bound, skipped", mesh.id());
                continue;
            };
            let Some(material) = ctx.assets.material(material_key) else {
                log::warn!("node references a missing material, skipped");
                continue;
            };

            if material.has_face_effects() && !mesh.data().faces.is_empty() {
                // 分面材质: 每面一个候选, 未命中的面回落默认效果
                for (i, face) in mesh.data().faces.iter().enumerate() {
                    candidates.push(Candidate {
                        node: key,
                        mesh: mesh_key,
                        effect: material.effect_for_face(face),
                        face: Some(i as u32),
                    });
                }
            } else {
                candidates.push(Candidate {
                    node: key,
                    mesh: mesh_key,
                    effect: material.default_effect,
                    face: None,
                });
            }
        }

        // ==== 2. 并行展开 (join 屏障在 scatter 内) ====
        let built = tasks.scatter(&candidates, |cand| {
            let effect = ctx
                .assets
                .effect(cand.effect)
                .ok_or(EngineError::StaleKey { kind: "effect" })?;
            let mesh = ctx
                .assets
                .mesh(cand.mesh)
                .ok_or(EngineError::StaleKey { kind: "mesh" })?;
            let buffer_key = mesh
                .buffer()
                .ok_or(EngineError::StaleKey { kind: "mesh buffer" })?;
            let buffer = ctx
                .buffers
                .get(buffer_key)
                .ok_or(EngineError::StaleKey { kind: "mesh buffer" })?;

            Ok(BatchEntry {
                node: cand.node,
                mesh: cand.mesh,
                program: effect.program,
                effect: cand.effect,
                buffer: buffer.ibo(),
                texes: effect.textures.clone(),
                face: cand.face,
            })
        })?;

        self.entries.clear();
        self.entries.extend(built);

        // ==== 3. 三级排序 ====
        self.entries
            .sort_unstable_by(|a, b| priority.compare(a, b));
        Ok(())
    }
}
