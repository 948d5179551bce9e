//! Transform math.
//!
//! Matrices are `glam::Mat4` (column-major, matching the flat 16-scalar
//! layout shaders expect). Clip space follows wgpu: depth in `[0, 1]`.

mod camera;
mod transform;

pub use camera::Camera;
pub use transform::{combine_mvp, spin, Transforms};

pub use glam::{Mat4, Vec3};
