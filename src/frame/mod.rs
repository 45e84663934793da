//! 帧管线模块
//!
//! 一帧的全部机制：
//! - Slots: prep/rend 双缓冲槽位, sync 是唯一的拷贝点
//! - TaskPool: 有界 rayon 线程池 (0 个工作线程时就地执行)
//! - FrameClock / FrameStats / StageTimings: 帧计时与统计
//! - FrameLoop: AppLogic → Prepare → Sync → Render → Present

pub mod clock;
pub mod pipeline;
pub mod slots;
pub mod tasks;

pub use clock::{FrameClock, FrameStats, StageTimings};
pub use pipeline::{FrameLoop, FrameReport};
pub use slots::Slots;
pub use tasks::TaskPool;

use crate::gpu::GpuError;

/// The window collaborator driving the frame loop.
///
/// The engine never creates windows or GL contexts; the host owns both and
/// hands the loop a frame delta and a buffer swap. A fixed-step host can
/// return a constant delta for reproducible runs.
pub trait WindowHost {
    /// Seconds elapsed since the previous frame, as measured by the host.
    fn frame_delta(&mut self) -> f64;

    /// Presents the default framebuffer (the final canvas's target).
    fn swap_buffers(&mut self) -> Result<(), GpuError>;
}
