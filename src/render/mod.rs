//! 渲染模块
//!
//! 组织渲染所需的全部对象：
//! - Technique: 顶点布局注册表（每个 MeshBuffer 按技术建 VAO）
//! - MeshBuffers: 固定容量的顶点/索引存储池
//! - RenderCanvas: 渲染目标（离屏或最终画面）
//! - Batcher: 按 GPU 状态排序的绘制批次
//! - Renderer: 提交阶段（只读 rend 槽位）

pub mod batcher;
pub mod canvas;
pub mod mesh_buffer;
pub mod renderer;
pub mod technique;

// 重新导出常用类型
pub use batcher::{BatchContext, BatchCriterion, BatchEntry, BatchList, BatchPriority};
pub use canvas::{CanvasSizing, RenderCanvas};
pub use mesh_buffer::{MeshBuffer, MeshBuffers, MeshSpan};
pub use renderer::MODEL_PROJ_UNIFORM;
pub use technique::{Technique, TechniqueRegistry};

use slotmap::new_key_type;

new_key_type! {
    pub struct TechniqueKey;
    pub struct MeshBufferKey;
}
