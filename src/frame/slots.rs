//! Double-Buffered Slots
//!
//! Per-frame state that one stage writes and a later stage reads is held in a
//! [`Slots`] pair: the `prep` half belongs to the prepare stage, the `rend`
//! half to the render stage. Only the sync step copies prep into rend, so
//! rendering never observes a half-written value and a paused pipeline keeps
//! resubmitting the last synced contents unchanged.

use glam::DMat4;

use crate::gpu::GpuMat4;

/// A prepare/render slot pair.
///
/// `P` and `R` may differ; the matrix pair narrows `f64` scene math into the
/// `f32` layout the GPU consumes during sync.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Slots<P, R> {
    /// Written by the prepare stage.
    pub prep: P,
    /// Read by the render stage; written only during sync.
    pub rend: R,
}

impl<P, R> Slots<P, R> {
    pub const fn new(prep: P, rend: R) -> Self {
        Self { prep, rend }
    }
}

impl<T: Clone> Slots<T, T> {
    /// Copies prep into rend, reusing rend's storage.
    ///
    /// 必须是拷贝而不是交换: 暂停时 rend 槽要逐帧保持逐位不变,
    /// 交换会在两份陈旧快照之间来回切换。
    pub fn sync(&mut self) {
        self.rend.clone_from(&self.prep);
    }
}

impl Slots<DMat4, GpuMat4> {
    /// Narrows the prepared `f64` matrix into the GPU-ready slot.
    pub fn sync(&mut self) {
        self.rend = GpuMat4::from_dmat4(&self.prep);
    }
}
