use anyhow::Result;

use crate::device::Gpu;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by binaries.
pub trait App {
    /// A window and GPU context now exist. Called on start and again after
    /// every resume; GPU resources from before a suspend are gone.
    fn on_surface_created(&mut self, gpu: &Gpu<'_>) -> Result<()>;

    /// The surface is about to be destroyed (suspend). Drop GPU resources.
    fn on_surface_lost(&mut self) {}

    /// Drawable size changed, in physical pixels.
    fn on_resize(&mut self, width: u32, height: u32) {
        let _ = (width, height);
    }

    /// Called once per frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
