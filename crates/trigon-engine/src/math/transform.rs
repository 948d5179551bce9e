use glam::Mat4;

/// Per-frame transform inputs for a draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for Transforms {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transforms {
    #[inline]
    pub const fn new(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        Self { model, view, projection }
    }

    #[inline]
    pub const fn identity() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY)
    }

    /// Builds transforms from flat column-major arrays.
    pub fn from_arrays(model: &[f32; 16], view: &[f32; 16], projection: &[f32; 16]) -> Self {
        Self::new(
            Mat4::from_cols_array(model),
            Mat4::from_cols_array(view),
            Mat4::from_cols_array(projection),
        )
    }

    /// Combined model-view-projection matrix. Recomputed on every call.
    #[inline]
    pub fn mvp(&self) -> Mat4 {
        combine_mvp(self.model, self.view, self.projection)
    }
}

/// Returns `projection * (view * model)`.
///
/// Applied to a column vector, the model transform runs first and the
/// projection last.
#[inline]
pub fn combine_mvp(model: Mat4, view: Mat4, projection: Mat4) -> Mat4 {
    let model_view = view * model;
    projection * model_view
}

/// Model matrix rotating `angle` radians about +Z.
#[inline]
pub fn spin(angle: f32) -> Mat4 {
    Mat4::from_rotation_z(angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    fn approx_eq(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn identity_inputs_give_identity() {
        assert_eq!(Transforms::identity().mvp(), Mat4::IDENTITY);
    }

    #[test]
    fn projection_is_applied_last() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let view = Mat4::from_rotation_y(0.7);
        let projection = Mat4::perspective_rh(1.2, 1.5, 0.5, 20.0);

        let mvp = combine_mvp(model, view, projection);
        assert!(approx_eq(mvp, projection * (view * model)));

        // Not the reversed order.
        assert!(!approx_eq(mvp, model * view * projection));
    }

    #[test]
    fn combination_is_associative() {
        let model = Mat4::from_scale(Vec3::splat(2.0)) * Mat4::from_rotation_z(0.3);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::orthographic_rh(-2.0, 2.0, -1.0, 1.0, 0.1, 10.0);

        let mvp = combine_mvp(model, view, projection);
        assert!(approx_eq(mvp, (projection * view) * model));
    }

    #[test]
    fn applies_model_then_view() {
        let model = Mat4::from_translation(Vec3::X);
        let view = Mat4::from_scale(Vec3::splat(2.0));

        let p = combine_mvp(model, view, Mat4::IDENTITY) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        // Translate first (x = 1), then scale (x = 2).
        assert!((p.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn from_arrays_is_column_major() {
        let mut translate = Mat4::IDENTITY.to_cols_array();
        translate[12] = 5.0;

        let t = Transforms::from_arrays(&translate, &Mat4::IDENTITY.to_cols_array(), &Mat4::IDENTITY.to_cols_array());
        assert_eq!(t.model, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn spin_quarter_turn_maps_x_to_y() {
        let p = spin(std::f32::consts::FRAC_PI_2) * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(p.x.abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }
}
