//! Transform 组件
//!
//! 封装节点的位置、旋转、缩放（TRS）。字段是公开的暂存值，
//! 只有显式 [`Transform::commit`]（或 [`Transform::edit`] 守卫析构时的
//! 自动提交）才会重建局部矩阵并递增版本号。层级传播只看已提交的
//! 矩阵和版本，所以写了一半的 TRS 永远不会泄露进渲染管线。

use std::ops::{Deref, DerefMut};

use glam::{DMat3, DMat4, DQuat, DVec3, EulerRot};

#[derive(Debug, Clone)]
pub struct Transform {
    // === Public staged 属性 ===
    pub position: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,

    // === 提交状态 (Internal) ===
    local_matrix: DMat4,
    version: u64,
    committed_position: DVec3,
    committed_rotation: DQuat,
    committed_scale: DVec3,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,

            local_matrix: DMat4::IDENTITY,
            version: 0,
            committed_position: DVec3::ZERO,
            committed_rotation: DQuat::IDENTITY,
            committed_scale: DVec3::ONE,
        }
    }

    // ========================================================================
    // 核心逻辑：显式提交 (Shadow State Check)
    // ========================================================================

    /// Rebuilds the local matrix from the staged TRS fields.
    ///
    /// Returns the transform's version, which increments only when the
    /// staged values actually differ from the committed ones; committing
    /// twice in a row is free and changes nothing.
    pub fn commit(&mut self) -> u64 {
        // 1. 脏检查：对比暂存属性和已提交属性
        let changed = self.position != self.committed_position
            || self.rotation != self.committed_rotation
            || self.scale != self.committed_scale;

        if changed {
            // 2. 只有变了才重算矩阵
            self.local_matrix = DMat4::from_scale_rotation_translation(
                self.scale,
                self.rotation,
                self.position,
            );

            // 3. 同步影子状态
            self.committed_position = self.position;
            self.committed_rotation = self.rotation;
            self.committed_scale = self.scale;
            self.version += 1;
        }

        self.version
    }

    /// Begins a scoped edit; dropping the guard commits.
    pub fn edit(&mut self) -> TransformUpdate<'_> {
        TransformUpdate { transform: self }
    }

    /// The version returned by the last state-changing commit.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The committed local matrix. Staged edits are invisible here until
    /// [`Transform::commit`] runs.
    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &DMat4 {
        &self.local_matrix
    }

    // ========================================================================
    // Getters & Helpers
    // ========================================================================

    /// Helper：设置欧拉角旋转（弧度，XYZ 顺序）
    pub fn set_rotation_euler(&mut self, x: f64, y: f64, z: f64) {
        self.rotation = DQuat::from_euler(EulerRot::XYZ, x, y, z);
    }

    /// 获取当前暂存的欧拉角 (XYZ 顺序)
    #[must_use]
    pub fn rotation_euler(&self) -> DVec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        DVec3::new(x, y, z)
    }

    /// LookAt 旋转（暂存）
    ///
    /// `target` 和 `up` 应该处于该变换的父坐标系中。
    pub fn look_at(&mut self, target: DVec3, up: DVec3) {
        // 1. 计算前向矢量
        let forward = (target - self.position).normalize();

        // 2. 检查退化情况
        if forward.cross(up).length_squared() < 1e-8 {
            return;
        }

        // 3. 构建正交基
        let right = forward.cross(up).normalize();
        let new_up = right.cross(forward).normalize();

        let rot_mat = DMat3::from_cols(right, new_up, -forward);
        self.rotation = DQuat::from_mat3(&rot_mat);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard from [`Transform::edit`]: edits go through `Deref`, the drop
/// commits them in one step.
pub struct TransformUpdate<'a> {
    transform: &'a mut Transform,
}

impl Deref for TransformUpdate<'_> {
    type Target = Transform;

    fn deref(&self) -> &Transform {
        self.transform
    }
}

impl DerefMut for TransformUpdate<'_> {
    fn deref_mut(&mut self) -> &mut Transform {
        self.transform
    }
}

impl Drop for TransformUpdate<'_> {
    fn drop(&mut self) {
        self.transform.commit();
    }
}
