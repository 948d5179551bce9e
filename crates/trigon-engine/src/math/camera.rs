use glam::{Mat4, Vec3};

/// Look-at camera with a symmetric perspective projection.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,

    /// Vertical field of view, radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    /// Eye slightly in front of the origin looking down -Z, with a frustum
    /// whose near plane spans `[-1, 1]` vertically at distance 1.
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 1.5),
            target: Vec3::new(0.0, 0.0, -5.0),
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_2,
            near: 1.0,
            far: 10.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Projection for a surface with the given width/height ratio.
    ///
    /// Degenerate aspect ratios (minimized window) are clamped.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > f32::EPSILON { aspect } else { 1.0 };
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }
}
