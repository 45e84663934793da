use crate::gpu::TargetHandle;
use crate::scene::CameraKey;

/// How a canvas derives its pixel size from the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasSizing {
    /// Fixed pixel size, unaffected by window resizes.
    Absolute { width: u32, height: u32 },
    /// Fractions of the window size, recomputed on every resize.
    Relative { width: f64, height: f64 },
}

/// A render destination: the final framebuffer or an offscreen target.
///
/// Canvases own an ordered camera list and a frame-skip factor. Camera
/// viewports resolve against the canvas pixel size during prepare, so a
/// window resize reaches every camera on the next frame.
pub struct RenderCanvas {
    /// Cameras drawn into this canvas, in draw order.
    pub cameras: Vec<CameraKey>,
    /// 1 = every frame, 0 = disabled, n = every nth frame.
    pub every_nth_frame: u32,
    target: Option<TargetHandle>,
    sizing: CanvasSizing,
    width: u32,
    height: u32,
    pub(crate) is_final: bool,
}

impl RenderCanvas {
    /// A canvas rendering into `target`, or into the default framebuffer
    /// when `target` is `None`. The pixel size is resolved when the canvas
    /// is registered and on every window resize.
    #[must_use]
    pub fn new(target: Option<TargetHandle>, sizing: CanvasSizing) -> Self {
        Self {
            cameras: Vec::new(),
            every_nth_frame: 1,
            target,
            sizing,
            width: 0,
            height: 0,
            is_final: target.is_none(),
        }
    }

    /// Whether the frame counter lands on this canvas.
    #[must_use]
    pub fn renders_this_frame(&self, frame: u64) -> bool {
        match self.every_nth_frame {
            0 => false,
            1 => true,
            n => frame % u64::from(n) == 0,
        }
    }

    #[must_use]
    pub fn target(&self) -> Option<TargetHandle> {
        self.target
    }

    /// Whether this canvas is the final (on-screen) one.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Resolved pixel size `(width, height)`.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_sizing(&mut self, sizing: CanvasSizing) {
        self.sizing = sizing;
    }

    pub(crate) fn on_resize(&mut self, window_width: u32, window_height: u32) {
        match self.sizing {
            CanvasSizing::Absolute { width, height } => {
                self.width = width;
                self.height = height;
            }
            CanvasSizing::Relative { width, height } => {
                self.width = (width * f64::from(window_width)) as u32;
                self.height = (height * f64::from(window_height)) as u32;
            }
        }
    }
}
