use glam::{DMat4, DVec3, DVec4};

use crate::frame::Slots;
use crate::gpu::RectPx;
use crate::render::batcher::{BatchList, BatchPriority};
use crate::render::TechniqueKey;
use crate::scene::SceneKey;

/// How a camera projects the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Standard perspective projection.
    Perspective {
        /// Vertical field of view in degrees.
        fov_y_deg: f64,
        z_near: f64,
        z_far: f64,
    },
    /// Screen-space pass-through: node world matrices go to the GPU
    /// unmultiplied, for HUD and overlay scenes.
    Screen,
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            fov_y_deg: 60.0,
            z_near: 0.3,
            z_far: 1000.0,
        }
    }
}

/// The camera's target rectangle on its canvas.
///
/// Either relative (fractions of the canvas, surviving resizes) or absolute
/// pixels. The prepare stage resolves it against the canvas size each frame.
#[derive(Debug, Clone)]
pub struct Viewport {
    relative: bool,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    px: RectPx,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            relative: true,
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            px: RectPx::default(),
        }
    }
}

impl Viewport {
    /// Covers the fraction rectangle of the canvas; `(0, 0, 1, 1)` is the
    /// whole canvas.
    pub fn set_relative(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.relative = true;
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
    }

    /// Covers a fixed pixel rectangle regardless of canvas size.
    pub fn set_absolute(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.relative = false;
        self.px = RectPx::new(x, y, width, height);
    }

    pub(crate) fn resolve(&mut self, canvas_width: u32, canvas_height: u32) {
        if self.relative {
            self.px = RectPx::new(
                (self.x * f64::from(canvas_width)) as i32,
                (self.y * f64::from(canvas_height)) as i32,
                (self.width * f64::from(canvas_width)) as u32,
                (self.height * f64::from(canvas_height)) as u32,
            );
        }
    }

    /// The pixel rectangle from the last prepare pass.
    #[must_use]
    pub fn px(&self) -> RectPx {
        self.px
    }

    fn aspect(&self) -> f64 {
        if self.px.height == 0 {
            1.0
        } else {
            f64::from(self.px.width) / f64::from(self.px.height)
        }
    }
}

/// A view into one scene, rendered through one technique.
///
/// Cameras are owned by the engine and referenced from exactly one canvas.
/// The view matrix is application-set ([`Camera::set_look_at`]); projection
/// and frustum are refreshed by the prepare stage against the resolved
/// viewport.
#[derive(Debug, Clone)]
pub struct Camera {
    /// The scene this camera observes.
    pub scene: SceneKey,
    /// Disabled cameras prepare nothing and render nothing.
    pub enabled: bool,
    pub projection: Projection,
    pub viewport: Viewport,
    /// Clear color before this camera draws; `None` clears depth only.
    pub clear_color: Option<[f32; 4]>,
    /// Vertex-array flavor used for this camera's draws.
    pub technique: TechniqueKey,
    /// Batch sort order for this camera's draw list.
    pub batch_priority: BatchPriority,

    view_matrix: DMat4,
    // 每帧由 prepare 写入的缓存, renderer 只读
    pub(crate) view_projection: DMat4,
    pub(crate) frustum: Frustum,
    // 双缓冲批次: prep 由 prepare 重建, rend 只在 sync 拷贝
    pub(crate) batches: Slots<BatchList, BatchList>,
}

impl Camera {
    #[must_use]
    pub fn new(scene: SceneKey, technique: TechniqueKey) -> Self {
        Self {
            scene,
            enabled: true,
            projection: Projection::default(),
            viewport: Viewport::default(),
            clear_color: Some([0.0, 0.0, 0.0, 1.0]),
            technique,
            batch_priority: BatchPriority::default(),
            view_matrix: DMat4::IDENTITY,
            view_projection: DMat4::IDENTITY,
            frustum: Frustum::default(),
            batches: Slots::default(),
        }
    }

    /// The sorted batch list last submitted for this camera.
    #[must_use]
    pub fn batch_list(&self) -> &BatchList {
        &self.batches.rend
    }

    /// The batch list built by the most recent prepare pass.
    #[must_use]
    pub fn prepared_batch_list(&self) -> &BatchList {
        &self.batches.prep
    }

    /// Positions the camera at `eye` looking at `target`.
    pub fn set_look_at(&mut self, eye: DVec3, target: DVec3, up: DVec3) {
        self.view_matrix = DMat4::look_at_rh(eye, target, up);
    }

    /// Sets the view matrix directly (world-to-camera).
    pub fn set_view_matrix(&mut self, view: DMat4) {
        self.view_matrix = view;
    }

    #[must_use]
    pub fn view_matrix(&self) -> &DMat4 {
        &self.view_matrix
    }

    /// The projection-times-view matrix from the last prepare pass.
    #[must_use]
    pub fn view_projection(&self) -> &DMat4 {
        &self.view_projection
    }

    /// Refreshes the resolved viewport, the view-projection matrix and the
    /// frustum. Runs once per camera per prepared frame.
    pub(crate) fn update_view_projection(&mut self, canvas_width: u32, canvas_height: u32) {
        self.viewport.resolve(canvas_width, canvas_height);

        match self.projection {
            Projection::Perspective {
                fov_y_deg,
                z_near,
                z_far,
            } => {
                // 裁剪范围 [-1, 1]
                let proj = DMat4::perspective_rh_gl(
                    fov_y_deg.to_radians(),
                    self.viewport.aspect(),
                    z_near,
                    z_far,
                );
                self.view_projection = proj * self.view_matrix;
                self.frustum = Frustum::from_matrix(&self.view_projection);
            }
            Projection::Screen => {
                // 2D 直通: 节点世界矩阵原样送往 GPU
                self.view_projection = DMat4::IDENTITY;
                self.frustum = Frustum::default();
            }
        }
    }

    /// Whether a world-space sphere is at least partially in view.
    ///
    /// Screen cameras never cull.
    #[must_use]
    pub fn sees_sphere(&self, center: DVec3, radius: f64) -> bool {
        match self.projection {
            Projection::Perspective { .. } => self.frustum.intersects_sphere(center, radius),
            Projection::Screen => true,
        }
    }
}

/// View frustum as six planes, for sphere culling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [DVec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Extracts planes from a view-projection matrix with a [-1, 1] clip
    /// range (Gribb-Hartmann).
    #[must_use]
    pub fn from_matrix(m: &DMat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [DVec4::ZERO; 6];
        // Left:   row4 + row1
        planes[0] = rows[3] + rows[0];
        // Right:  row4 - row1
        planes[1] = rows[3] - rows[0];
        // Bottom: row4 + row2
        planes[2] = rows[3] + rows[1];
        // Top:    row4 - row2
        planes[3] = rows[3] - rows[1];
        // Near:   row4 + row3
        planes[4] = rows[3] + rows[2];
        // Far:    row4 - row3
        planes[5] = rows[3] - rows[2];

        // Normalize
        for plane in &mut planes {
            let length = DVec3::new(plane.x, plane.y, plane.z).length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    // 简单的球体相交检测
    #[must_use]
    pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
        for plane in &self.planes {
            let dist = plane.x * center.x + plane.y * center.y + plane.z * center.z + plane.w;
            if dist < -radius {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perspective_camera() -> Camera {
        let mut cam = Camera::new(SceneKey::default(), TechniqueKey::default());
        cam.set_look_at(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO, DVec3::Y);
        cam.update_view_projection(800, 600);
        cam
    }

    #[test]
    fn frustum_accepts_sphere_in_front() {
        let cam = perspective_camera();
        assert!(cam.sees_sphere(DVec3::ZERO, 0.5));
    }

    #[test]
    fn frustum_rejects_sphere_behind() {
        let cam = perspective_camera();
        assert!(!cam.sees_sphere(DVec3::new(0.0, 0.0, 20.0), 0.5));
    }

    #[test]
    fn screen_projection_passes_world_through() {
        let mut cam = Camera::new(SceneKey::default(), TechniqueKey::default());
        cam.projection = Projection::Screen;
        cam.update_view_projection(800, 600);
        assert_eq!(*cam.view_projection(), DMat4::IDENTITY);
        // 不剔除
        assert!(cam.sees_sphere(DVec3::new(1e6, 0.0, 0.0), 0.1));
    }

    #[test]
    fn relative_viewport_tracks_canvas_size() {
        let mut cam = perspective_camera();
        cam.viewport.set_relative(0.5, 0.0, 0.5, 1.0);
        cam.update_view_projection(400, 200);
        assert_eq!(cam.viewport.px(), RectPx::new(200, 0, 200, 200));
        cam.update_view_projection(800, 200);
        assert_eq!(cam.viewport.px(), RectPx::new(400, 0, 400, 200));
    }
}
