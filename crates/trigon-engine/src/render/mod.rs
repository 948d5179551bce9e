//! Shape rendering.
//!
//! A [`Shape`] compiles and links a [`ShaderProgram`], uploads its
//! [`Geometry`] once and issues one triangle-list draw per [`Shape::draw`].
//! GPU access goes through the [`Backend`] trait; [`WgpuBackend`] is the
//! real implementation.
//!
//! Convention:
//! - vertices are interleaved `x, y, z, r, g, b, a` (`f32`)
//! - `a_position` is bound to location 0, `a_color` to location 1
//! - the vertex stage reads the combined transform from `u_mvp`

mod backend;
mod ctx;
mod error;
mod shape;
mod wgpu_backend;

pub mod geometry;
pub mod shader;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{check_errors, Backend, DrawCall, VertexAttribute, VertexLayout};
pub use ctx::{RenderCtx, RenderTarget};
pub use error::{BackendError, GeometryError, ShaderError, ShapeError};
pub use geometry::{triangle, Geometry, Vertex};
pub use shader::{ProgramId, ShaderProgram, ShaderSources, Stage};
pub use shape::{ProgramLayout, Shape};
pub use wgpu_backend::{WgpuBackend, WgpuProgram, WgpuVertexBuffer};
