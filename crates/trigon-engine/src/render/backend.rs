//! GPU seam used by [`Shape`](super::Shape).
//!
//! A backend turns a linked [`ShaderProgram`] and vertex data into GPU
//! resources and records draws against them. Resources are plain owned
//! values; dropping one releases it.

use super::error::BackendError;
use super::geometry::Vertex;
use super::shader::{ShaderProgram, UniformSlot};

/// One vertex attribute sourced from the interleaved vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub location: u32,
    /// Byte offset inside a vertex.
    pub offset: u64,
    /// Number of `f32` components.
    pub components: u32,
}

/// Layout of the interleaved vertex buffer: stride plus position and color.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexLayout {
    pub stride: u64,
    pub position: VertexAttribute,
    pub color: VertexAttribute,
}

impl VertexLayout {
    /// Position/color layout of [`Vertex`] at the given shader locations.
    pub const fn interleaved(position_location: u32, color_location: u32) -> Self {
        Self {
            stride: Vertex::STRIDE,
            position: VertexAttribute {
                location: position_location,
                offset: Vertex::POSITION_OFFSET,
                components: Vertex::POSITION_COMPONENTS,
            },
            color: VertexAttribute {
                location: color_location,
                offset: Vertex::COLOR_OFFSET,
                components: Vertex::COLOR_COMPONENTS,
            },
        }
    }

    pub fn attributes(&self) -> [VertexAttribute; 2] {
        [self.position, self.color]
    }
}

/// A single non-indexed triangle-list draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawCall {
    pub layout: VertexLayout,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

pub trait Backend {
    type Program;
    type VertexBuffer;

    /// Creates the GPU program for a linked shader pair, with vertex inputs
    /// fed according to `layout`.
    fn create_program(
        &mut self,
        program: &ShaderProgram,
        layout: &VertexLayout,
    ) -> Result<Self::Program, BackendError>;

    /// Uploads interleaved vertex data.
    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<Self::VertexBuffer, BackendError>;

    /// Writes `data` to the uniform at `slot`. Takes effect for later draws.
    fn write_uniform(&mut self, program: &Self::Program, slot: UniformSlot, data: &[u8]);

    /// Records one draw. Failures are reported through [`Backend::take_error`].
    fn draw(&mut self, program: &Self::Program, buffer: &Self::VertexBuffer, call: DrawCall);

    /// Pops the oldest pending GPU error, if any.
    fn take_error(&mut self) -> Option<String>;
}

/// Drains pending GPU errors, logging each one against `op`.
///
/// Advisory: nothing in the draw path calls this on its own.
pub fn check_errors<B: Backend + ?Sized>(backend: &mut B, op: &str) -> Vec<String> {
    let mut errors = Vec::new();
    while let Some(err) = backend.take_error() {
        log::error!("{op}: GPU error: {err}");
        errors.push(err);
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::RecordingBackend;

    #[test]
    fn interleaved_layout_matches_vertex() {
        let layout = VertexLayout::interleaved(0, 1);
        assert_eq!(layout.stride, 28);
        assert_eq!(layout.position.offset, 0);
        assert_eq!(layout.position.components, 3);
        assert_eq!(layout.color.offset, 12);
        assert_eq!(layout.color.components, 4);
    }

    #[test]
    fn check_errors_drains_in_order() {
        let mut backend = RecordingBackend::new();
        backend.push_error("first");
        backend.push_error("second");

        assert_eq!(check_errors(&mut backend, "test"), vec!["first", "second"]);
        assert!(check_errors(&mut backend, "test").is_empty());
    }
}
