//! Surface boundary
//!
//! Window creation and event pumping belong to the platform layer. The engine
//! only makes the surface current, renders through its backend, and presents.

use strata_composer::{RecordingBackend, RenderBackend, Viewport};
use strata_core::{Error, Result};

/// Something the engine can render to and present
pub trait Surface {
    /// Current size in pixels
    fn viewport(&self) -> Viewport;

    /// Bind the surface's context to the calling thread
    fn make_current(&mut self) -> Result<()>;

    /// Backend composers render through
    fn backend(&mut self) -> &mut dyn RenderBackend;

    /// Present the frame
    fn swap(&mut self) -> Result<()>;
}

/// Offscreen surface recording every backend call
#[derive(Debug)]
pub struct HeadlessSurface {
    viewport: Viewport,
    backend: RecordingBackend,
    swaps: u64,
    lost: bool,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            backend: RecordingBackend::new(),
            swaps: 0,
            lost: false,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
    }

    /// Frames presented so far
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    pub fn recording(&self) -> &RecordingBackend {
        &self.backend
    }

    pub fn recording_mut(&mut self) -> &mut RecordingBackend {
        &mut self.backend
    }

    /// Simulate losing the context; `make_current` fails until restored
    pub fn set_lost(&mut self, lost: bool) {
        self.lost = lost;
    }
}

impl Surface for HeadlessSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn make_current(&mut self) -> Result<()> {
        if self.lost {
            return Err(Error::RenderTargetBind {
                target: "<surface>".into(),
                reason: "context lost".into(),
            });
        }
        Ok(())
    }

    fn backend(&mut self) -> &mut dyn RenderBackend {
        &mut self.backend
    }

    fn swap(&mut self) -> Result<()> {
        self.swaps += 1;
        Ok(())
    }
}
