//! 帧渲染提交 (Render Submission)
//!
//! 把每台相机 sync 后的批次列表翻译成设备调用。按画布分组绑定渲染
//! 目标，逐相机设置视口并清屏，再按批次顺序提交绘制。
//!
//! 程序 / VAO / 纹理单元的绑定都经过 [`BindTracker`] 去重，与上一次
//! 相同的绑定不再下发。追踪器每帧新建：出错中止的帧不会把未知的
//! 绑定状态带进下一帧。
//!
//! 本阶段只读 rend 槽位。批次与矩阵都是 sync 步骤定格的快照，
//! prepare 正在写的数据在这里不可见。

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::assets::AssetLibrary;
use crate::errors::Result;
use crate::gpu::{GpuDevice, ProgramHandle, TextureHandle, VertexArrayHandle};
use crate::render::canvas::RenderCanvas;
use crate::render::mesh_buffer::MeshBuffers;
use crate::scene::{Camera, CameraKey, Scene, SceneKey};

/// The uniform every batch entry's projection-times-world matrix goes to.
///
/// Host-supplied programs are expected to declare a `mat4` under this name.
pub const MODEL_PROJ_UNIFORM: &str = "u_model_proj";

/// Last-seen device bindings. Repeat binds are skipped.
#[derive(Default)]
struct BindTracker {
    program: Option<ProgramHandle>,
    vao: Option<VertexArrayHandle>,
    units: FxHashMap<u32, TextureHandle>,
}

impl BindTracker {
    fn use_program(&mut self, device: &mut dyn GpuDevice, program: ProgramHandle) -> Result<()> {
        if self.program != Some(program) {
            device.use_program(program)?;
            self.program = Some(program);
        }
        Ok(())
    }

    fn bind_vertex_array(
        &mut self,
        device: &mut dyn GpuDevice,
        vao: VertexArrayHandle,
    ) -> Result<()> {
        if self.vao != Some(vao) {
            device.bind_vertex_array(vao)?;
            self.vao = Some(vao);
        }
        Ok(())
    }

    fn bind_texture(
        &mut self,
        device: &mut dyn GpuDevice,
        unit: u32,
        texture: TextureHandle,
    ) -> Result<()> {
        if self.units.get(&unit) != Some(&texture) {
            device.bind_texture(unit, texture)?;
            self.units.insert(unit, texture);
        }
        Ok(())
    }
}

/// Submits one frame.
///
/// Walks the canvases in order, skipping those whose frame-skip cadence
/// excludes `frame`, and draws every enabled camera's synced batch list into
/// its canvas. The last canvas's target is left bound. A device error aborts
/// the frame mid-way; the device contract keeps its state consistent, so the
/// next frame starts clean.
pub(crate) fn render_frame(
    device: &mut dyn GpuDevice,
    frame: u64,
    canvases: &[RenderCanvas],
    cameras: &SlotMap<CameraKey, Camera>,
    scenes: &SlotMap<SceneKey, Scene>,
    assets: &mut AssetLibrary,
    buffers: &MeshBuffers,
) -> Result<()> {
    let mut tracker = BindTracker::default();

    for canvas in canvases {
        if !canvas.renders_this_frame(frame) {
            continue;
        }
        device.bind_render_target(canvas.target())?;

        for &cam_key in &canvas.cameras {
            let Some(camera) = cameras.get(cam_key) else {
                log::warn!("canvas references a removed camera, skipping");
                continue;
            };
            if !camera.enabled {
                continue;
            }
            let Some(scene) = scenes.get(camera.scene) else {
                log::warn!("camera points at a removed scene, skipping");
                continue;
            };

            device.set_viewport(camera.viewport.px())?;
            device.clear(camera.clear_color, true)?;
            draw_batches(device, &mut tracker, camera, cam_key, scene, assets, buffers)?;
        }
    }
    Ok(())
}

/// Draws one camera's batch list.
fn draw_batches(
    device: &mut dyn GpuDevice,
    tracker: &mut BindTracker,
    camera: &Camera,
    cam_key: CameraKey,
    scene: &Scene,
    assets: &mut AssetLibrary,
    buffers: &MeshBuffers,
) -> Result<()> {
    for entry in camera.batch_list().entries() {
        // 批次在 prepare 阶段校验过, 这里的缺失只可能来自两帧之间的
        // 资产改动 (例如暂停期间移除了网格), 跳过即可
        let Some(mesh) = assets.mesh(entry.mesh) else {
            log::debug!("batched mesh is gone, skipping entry");
            continue;
        };
        let Some(buffer_key) = mesh.buffer() else {
            log::debug!("mesh '{}' left its buffer after batching, skipping", mesh.id());
            continue;
        };
        let Some(buf) = buffers.get(buffer_key) else {
            log::debug!("mesh '{}' points at a disposed buffer, skipping", mesh.id());
            continue;
        };
        let Some(span) = buf.span(entry.mesh).copied() else {
            log::debug!("mesh '{}' has no span in '{}', skipping", mesh.id(), buf.id());
            continue;
        };
        let Some(vao) = buf.vao(camera.technique) else {
            log::debug!("buffer '{}' has no vertex array for the camera technique", buf.id());
            continue;
        };

        // A. 程序
        tracker.use_program(device, entry.program)?;

        // B. 顶点来源, 成员数据按需上传
        let needs_upload = !mesh.is_gpu_synced();
        if needs_upload {
            buf.upload(device, span, &mesh.data().vertices, &mesh.data().indices)?;
        }
        tracker.bind_vertex_array(device, vao)?;
        if needs_upload && let Some(m) = assets.mesh_mut(entry.mesh) {
            m.gpu_synced = true;
        }

        // C. 纹理按单元序绑定
        for (unit, tex) in entry.texes.iter().enumerate() {
            tracker.bind_texture(device, unit as u32, *tex)?;
        }

        // D. 本条目的矩阵快照
        let Some(state) = scene.nodes.get(entry.node).and_then(|n| n.cam_state(cam_key)) else {
            log::debug!("batched node lost its camera state, skipping entry");
            continue;
        };
        device.set_uniform_matrix(MODEL_PROJ_UNIFORM, &state.mat.rend)?;

        // E. 提交: 整个网格, 或单个面的三个索引
        match entry.face {
            None => {
                device.draw_elements(span.index_count, span.first_index, span.base_vertex as i32)?;
            }
            Some(face) => {
                device.draw_elements(3, span.first_index + 3 * face, span.base_vertex as i32)?;
            }
        }
    }
    Ok(())
}
