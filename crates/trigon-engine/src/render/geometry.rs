//! Vertex data descriptors.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};

use super::error::GeometryError;

/// Interleaved position + color vertex: `x, y, z, r, g, b, a`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    /// Scalars per vertex.
    pub const SCALARS: usize = 7;
    pub const STRIDE: u64 = (Self::SCALARS * std::mem::size_of::<f32>()) as u64;

    pub const POSITION_OFFSET: u64 = 0;
    pub const POSITION_COMPONENTS: u32 = 3;

    pub const COLOR_OFFSET: u64 = (Self::POSITION_COMPONENTS as usize * std::mem::size_of::<f32>()) as u64;
    pub const COLOR_COMPONENTS: u32 = 4;

    #[inline]
    pub const fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }
}

/// Shape geometry: a flat scalar sequence plus the number of vertices to draw.
///
/// Invariant: `vertex_data().len() == vertex_count() * Vertex::SCALARS` and
/// the count is non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    data: Cow<'static, [f32]>,
    vertex_count: u32,
}

impl Geometry {
    pub fn new(data: impl Into<Cow<'static, [f32]>>, vertex_count: u32) -> Result<Self, GeometryError> {
        let data = data.into();
        validate(&data, vertex_count)?;
        Ok(Self { data, vertex_count })
    }

    /// Builds geometry from typed vertices; the count is the slice length.
    pub fn from_vertices(vertices: &[Vertex]) -> Result<Self, GeometryError> {
        let count = u32::try_from(vertices.len()).map_err(|_| GeometryError::CountMismatch {
            vertex_count: u32::MAX,
            expected: usize::MAX,
            actual: vertices.len() * Vertex::SCALARS,
        })?;
        let data: Vec<f32> = bytemuck::cast_slice(vertices).to_vec();
        Self::new(data, count)
    }

    #[inline]
    pub fn vertex_data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Vertex `index` as a typed value.
    pub fn vertex(&self, index: u32) -> Option<Vertex> {
        let start = index as usize * Vertex::SCALARS;
        let s = self.data.get(start..start + Vertex::SCALARS)?;
        Some(Vertex::new([s[0], s[1], s[2]], [s[3], s[4], s[5], s[6]]))
    }
}

fn validate(data: &[f32], vertex_count: u32) -> Result<(), GeometryError> {
    if data.is_empty() || vertex_count == 0 {
        return Err(GeometryError::Empty);
    }
    if data.len() % Vertex::SCALARS != 0 {
        return Err(GeometryError::Misaligned {
            len: data.len(),
            stride: Vertex::SCALARS,
        });
    }
    let expected = vertex_count as usize * Vertex::SCALARS;
    if expected != data.len() {
        return Err(GeometryError::CountMismatch {
            vertex_count,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[rustfmt::skip]
static TRIANGLE: [f32; 21] = [
    // x, y, z,
    // r, g, b, a
    -0.5, -0.25, 0.0,
    1.0, 0.0, 0.0, 1.0,

    0.5, -0.25, 0.0,
    0.0, 0.0, 1.0, 1.0,

    0.0, 0.559016994, 0.0,
    0.0, 1.0, 0.0, 1.0,
];

/// Red/blue/green triangle centered near the origin.
pub fn triangle() -> Geometry {
    Geometry {
        data: Cow::Borrowed(&TRIANGLE[..]),
        vertex_count: 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_constants() {
        assert_eq!(std::mem::size_of::<Vertex>() as u64, Vertex::STRIDE);
        assert_eq!(Vertex::STRIDE, 28);
        assert_eq!(Vertex::COLOR_OFFSET, 12);
    }

    #[test]
    fn triangle_has_21_scalars_and_3_vertices() {
        let t = triangle();
        assert_eq!(t.vertex_data().len(), 21);
        assert_eq!(t.vertex_count(), 3);
        assert!(validate(t.vertex_data(), t.vertex_count()).is_ok());
    }

    #[test]
    fn triangle_vertices() {
        let t = triangle();
        assert_eq!(t.vertex(0), Some(Vertex::new([-0.5, -0.25, 0.0], [1.0, 0.0, 0.0, 1.0])));
        assert_eq!(t.vertex(1), Some(Vertex::new([0.5, -0.25, 0.0], [0.0, 0.0, 1.0, 1.0])));
        assert_eq!(t.vertex(2), Some(Vertex::new([0.0, 0.559016994, 0.0], [0.0, 1.0, 0.0, 1.0])));
        assert_eq!(t.vertex(3), None);
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(Geometry::new(Vec::new(), 0), Err(GeometryError::Empty));
        assert_eq!(Geometry::new(vec![0.0; 7], 0), Err(GeometryError::Empty));
    }

    #[test]
    fn partial_vertex_is_rejected() {
        let err = Geometry::new(vec![0.0; 8], 1).unwrap_err();
        assert_eq!(err, GeometryError::Misaligned { len: 8, stride: 7 });
    }

    #[test]
    fn count_must_match_data() {
        let err = Geometry::new(vec![0.0; 14], 3).unwrap_err();
        assert_eq!(
            err,
            GeometryError::CountMismatch { vertex_count: 3, expected: 21, actual: 14 }
        );
    }

    #[test]
    fn from_vertices_flattens_in_order() {
        let g = Geometry::from_vertices(&[
            Vertex::new([1.0, 2.0, 3.0], [0.1, 0.2, 0.3, 0.4]),
            Vertex::new([4.0, 5.0, 6.0], [0.5, 0.6, 0.7, 0.8]),
        ])
        .unwrap();

        assert_eq!(g.vertex_count(), 2);
        assert_eq!(&g.vertex_data()[..7], &[1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4]);
    }
}
