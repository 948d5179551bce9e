//! Contract between the runtime loop and the application.
//!
//! The runtime owns the window and GPU context; the application owns
//! everything it draws and rebuilds it whenever a new surface is created.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
