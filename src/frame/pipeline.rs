//! 帧循环 (Frame Loop)
//!
//! 一次 tick 依次跑五个阶段, 互不重叠:
//!
//! 1. AppLogic — 宿主回调改场景 (暂停时跳过)
//! 2. Prepare  — 变换传播, 逐相机可见性/矩阵写 prep 槽, 批次重建 (暂停时跳过)
//! 3. Sync     — 唯一把 prep 拷进 rend 的地方 (暂停时也跑)
//! 4. Render   — 只读 rend 槽提交设备调用
//! 5. Present  — 交换缓冲, 时钟与统计前进
//!
//! 暂停只冻结前两个阶段: rend 槽位保持上一次 sync 的内容逐位不变,
//! 画面持续重提交同一帧, 不会黑屏。阶段内部的并行 (批次展开) 经由
//! [`TaskPool`], 在阶段结束前汇合。

use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::assets::AssetLibrary;
use crate::engine::Engine;
use crate::errors::Result;
use crate::frame::WindowHost;
use crate::frame::clock::{FrameClock, FrameStats, StageTimings};
use crate::frame::tasks::TaskPool;
use crate::render::batcher::BatchContext;
use crate::render::renderer;
use crate::scene::{Camera, CameraKey, Projection, Scene, SceneKey};
use crate::scene::transform_system;

/// What one completed tick looked like.
#[derive(Clone, Copy, Debug)]
pub struct FrameReport {
    /// Number of the frame just produced (1-based).
    pub frame: u64,
    /// Host-supplied delta for this frame, seconds.
    pub delta: f64,
    /// Accumulated time over all ticks, seconds.
    pub elapsed: f64,
    /// Frames per second over the last completed measurement window.
    pub fps: f64,
    /// Whether this tick ran with AppLogic and Prepare suppressed.
    pub paused: bool,
    /// Wall-clock cost of each stage.
    pub timings: StageTimings,
}

/// Drives an [`Engine`] through the staged frame pipeline.
pub struct FrameLoop {
    clock: FrameClock,
    stats: FrameStats,
    tasks: TaskPool,
    paused: bool,
}

impl FrameLoop {
    /// Creates a loop whose batch fan-out uses `workers` threads
    /// (`0` = run batch construction inline on the calling thread).
    pub fn new(workers: usize) -> Result<Self> {
        Ok(Self {
            clock: FrameClock::new(),
            stats: FrameStats::new(),
            tasks: TaskPool::new(workers)?,
            paused: false,
        })
    }

    /// Freezes AppLogic and Prepare. Rendering continues with the last
    /// synced frame.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes normal ticking.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    #[must_use]
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Runs one frame.
    ///
    /// `app_logic` receives the engine and the host's frame delta before any
    /// engine stage runs. Errors from Prepare, Render or the buffer swap
    /// surface here; engine state stays valid and the next tick starts clean.
    pub fn tick(
        &mut self,
        engine: &mut Engine,
        host: &mut dyn WindowHost,
        mut app_logic: impl FnMut(&mut Engine, f64),
    ) -> Result<FrameReport> {
        let delta = host.frame_delta();
        // 本帧帧号: 失败的 tick 不推进时钟, 帧号随之重用
        let frame = self.clock.frame_count + 1;
        let mut timings = StageTimings::default();

        // ==== 1. AppLogic ====
        let t = Instant::now();
        if !self.paused {
            app_logic(engine, delta);
        }
        timings.app_logic = t.elapsed();

        // ==== 2. Prepare ====
        let t = Instant::now();
        if !self.paused {
            prepare_frame(engine, frame, &self.tasks)?;
        }
        timings.prepare = t.elapsed();

        // ==== 3. Sync ====
        let t = Instant::now();
        sync_frame(engine);
        timings.sync = t.elapsed();

        // ==== 4. Render ====
        let t = Instant::now();
        let Engine {
            device,
            assets,
            scenes,
            cameras,
            canvases,
            mesh_buffers,
            ..
        } = engine;
        renderer::render_frame(
            device.as_mut(),
            frame,
            canvases,
            cameras,
            scenes,
            assets,
            mesh_buffers,
        )?;
        timings.render = t.elapsed();

        // ==== 5. Present ====
        let t = Instant::now();
        host.swap_buffers()?;
        self.clock.tick(delta);
        if let Some(fps) = self.stats.update(delta) {
            log::debug!("fps: {fps:.1}");
        }
        timings.present = t.elapsed();

        Ok(FrameReport {
            frame: self.clock.frame_count,
            delta,
            elapsed: self.clock.elapsed,
            fps: self.stats.current_fps,
            paused: self.paused,
            timings,
        })
    }
}

/// The Prepare stage: propagation, per-camera caches, batch rebuild.
fn prepare_frame(engine: &mut Engine, frame: u64, tasks: &TaskPool) -> Result<()> {
    let Engine {
        assets,
        scenes,
        cameras,
        canvases,
        mesh_buffers,
        ..
    } = engine;

    // ==== 1. 收集本帧活跃的相机 ====
    // 画布跳帧对 prepare 与 render 用同一个帧号, 跳过的画布两边都不动
    let mut active: Vec<(CameraKey, u32, u32)> = Vec::new();
    let mut observed: FxHashSet<SceneKey> = FxHashSet::default();
    for canvas in canvases.iter() {
        if !canvas.renders_this_frame(frame) {
            continue;
        }
        let (width, height) = canvas.size();
        for &cam_key in &canvas.cameras {
            let Some(camera) = cameras.get(cam_key) else {
                continue;
            };
            if !camera.enabled {
                continue;
            }
            if !scenes.contains_key(camera.scene) {
                log::warn!("camera points at a removed scene, skipping prepare");
                continue;
            }
            observed.insert(camera.scene);
            active.push((cam_key, width, height));
        }
    }

    // ==== 2. 每个被观察的场景传播一次 ====
    for &scene_key in &observed {
        let Some(scene) = scenes.get_mut(scene_key) else {
            continue;
        };
        let root = scene.root();
        transform_system::update_hierarchy(&mut scene.nodes, root);
    }

    // ==== 3. 每台相机: 视图投影, 逐节点可见性与矩阵写 prep ====
    for &(cam_key, width, height) in &active {
        let Some(camera) = cameras.get_mut(cam_key) else {
            continue;
        };
        camera.update_view_projection(width, height);
        let Some(scene) = scenes.get_mut(camera.scene) else {
            continue;
        };
        prepare_camera_nodes(camera, cam_key, scene, assets);
    }

    // ==== 4. 每台相机: 批次重建 (prep 侧) ====
    let ctx = BatchContext {
        assets,
        buffers: mesh_buffers,
    };
    for &(cam_key, _, _) in &active {
        let Some(camera) = cameras.get_mut(cam_key) else {
            continue;
        };
        let priority = camera.batch_priority;
        let Some(scene) = scenes.get(camera.scene) else {
            continue;
        };
        camera.batches.prep.rebuild(&ctx, cam_key, priority, scene, tasks)?;
    }
    Ok(())
}

/// Writes one camera's per-node visibility verdicts and prep matrices.
fn prepare_camera_nodes(
    camera: &Camera,
    cam_key: CameraKey,
    scene: &mut Scene,
    assets: &AssetLibrary,
) {
    let screen = matches!(camera.projection, Projection::Screen);
    for (_, node) in scene.nodes.iter_mut() {
        // 可见性: 有效启用链, 再对带包围球的网格节点做视锥测试
        let mut visible = node.is_world_enabled();
        if visible
            && !screen
            && let Some(mesh_key) = node.mesh
            && let Some(mesh) = assets.mesh(mesh_key)
        {
            let bounds = mesh.bounds();
            let world = node.world_matrix;
            let center = world.transform_point3(bounds.center);
            // 非均匀缩放取最大轴, 球半径只许放大不许缩小
            let scale = world
                .x_axis
                .truncate()
                .length()
                .max(world.y_axis.truncate().length())
                .max(world.z_axis.truncate().length());
            visible = camera.sees_sphere(center, bounds.radius * scale);
        }

        // 懒创建: 第一次见到这对 (相机, 节点) 才建缓存
        let state = node.cam_states.entry(cam_key).or_default();
        state.visible = visible;
        state.mat.prep = if screen {
            // Screen 相机: 世界矩阵直通, 不乘投影
            node.world_matrix
        } else {
            camera.view_projection * node.world_matrix
        };
    }
}

/// The Sync stage: the only writer of rend slots.
fn sync_frame(engine: &mut Engine) {
    for (_, scene) in &mut engine.scenes {
        for (_, node) in scene.nodes.iter_mut() {
            for state in node.cam_states.values_mut() {
                state.mat.sync();
            }
        }
    }
    for (_, camera) in &mut engine.cameras {
        camera.batches.sync();
    }
}
