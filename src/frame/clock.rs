//! Frame Timing
//!
//! [`FrameClock`] advances on host-supplied deltas, [`FrameStats`] keeps
//! windowed and lifetime frame-rate figures, and [`StageTimings`] holds the
//! wall-clock cost of one tick's stages.

use std::time::Duration;

/// Clock for tracking frame timing and elapsed time.
///
/// Driven by the host-supplied frame delta rather than a wall clock, so a
/// replaying or fixed-step host produces identical timing from run to run.
pub struct FrameClock {
    /// Time since last tick, in seconds
    pub delta: f64,
    /// Total accumulated time since creation, in seconds
    pub elapsed: f64,
    /// Total number of ticks
    pub frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Creates a new clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            delta: 0.0,
            elapsed: 0.0,
            frame_count: 0,
        }
    }

    /// Advances the clock (called internally by the frame loop each frame).
    pub fn tick(&mut self, delta: f64) {
        self.delta = delta;
        self.elapsed += delta;
        self.frame_count += 1;
    }
}

/// Frame-rate statistics: a one-second window plus a lifetime average.
pub struct FrameStats {
    window_frames: u32,
    window_time: f64,
    total_frames: u64,
    total_time: f64,
    /// Frames per second over the last completed one-second window.
    pub current_fps: f64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            window_frames: 0,
            window_time: 0.0,
            total_frames: 0,
            total_time: 0.0,
            current_fps: 0.0,
        }
    }

    /// Records one frame. Returns the fresh fps figure whenever a one-second
    /// window completes.
    pub fn update(&mut self, delta: f64) -> Option<f64> {
        self.window_frames += 1;
        self.window_time += delta;
        self.total_frames += 1;
        self.total_time += delta;

        if self.window_time >= 1.0 {
            self.current_fps = f64::from(self.window_frames) / self.window_time;
            self.window_time = 0.0;
            self.window_frames = 0;
            return Some(self.current_fps);
        }

        None
    }

    /// Average frames per second over the whole run.
    #[must_use]
    pub fn average_fps(&self) -> f64 {
        if self.total_time > 0.0 {
            self.total_frames as f64 / self.total_time
        } else {
            0.0
        }
    }
}

/// Wall-clock cost of each stage of one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct StageTimings {
    pub app_logic: Duration,
    pub prepare: Duration,
    pub sync: Duration,
    pub render: Duration,
    pub present: Duration,
}

impl StageTimings {
    /// The whole tick.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.app_logic + self.prepare + self.sync + self.render + self.present
    }
}
