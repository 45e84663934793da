//! 场景图系统模块
//!
//! 管理场景层级结构和组件：
//! - Node: 场景节点（父子关系、网格绑定、逐相机缓存）
//! - Transform: 变换组件（暂存 TRS + 显式提交）
//! - Scene: 场景容器（固定根节点 + 子树操作）
//! - Camera: 相机（投影、视口、视锥体剔除）
//! - TransformSystem: 解耦的世界矩阵传播

pub mod camera;
pub mod node;
pub mod scene;
pub mod transform;
pub mod transform_system;

// 重新导出常用类型
pub use camera::{Camera, Frustum, Projection, Viewport};
pub use node::{Node, NodeBinding, NodeCamState};
pub use scene::Scene;
pub use transform::{Transform, TransformUpdate};

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeKey;
    pub struct CameraKey;
    pub struct SceneKey;
}
