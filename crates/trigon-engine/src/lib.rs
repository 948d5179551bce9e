//! Trigon engine crate.
//!
//! Owns the platform loop, the wgpu context and the shape-drawing machinery
//! (shader program, geometry, backend seam, shape).

pub mod device;
pub mod window;
pub mod time;
pub mod core;

pub mod logging;
pub mod math;
pub mod render;
