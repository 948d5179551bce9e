use thiserror::Error;

use super::shader::Stage;

/// Shader compilation or program link failure. Both are fatal for the
/// object being constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile: {message}")]
    Compilation { stage: Stage, message: String },

    #[error("program failed to link: {message}")]
    Link { message: String },
}

impl ShaderError {
    pub(crate) fn compilation(stage: Stage, message: impl Into<String>) -> Self {
        Self::Compilation { stage, message: message.into() }
    }

    pub(crate) fn link(message: impl Into<String>) -> Self {
        Self::Link { message: message.into() }
    }
}

/// Vertex data that does not describe whole vertices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("geometry has no vertices")]
    Empty,

    #[error("vertex data length {len} is not a multiple of {stride} scalars")]
    Misaligned { len: usize, stride: usize },

    #[error("vertex count {vertex_count} needs {expected} scalars, got {actual}")]
    CountMismatch { vertex_count: u32, expected: usize, actual: usize },
}

/// GPU resource creation failure reported by a [`Backend`](super::Backend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to create {what}: {message}")]
pub struct BackendError {
    pub what: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn new(what: &'static str, message: impl Into<String>) -> Self {
        Self { what, message: message.into() }
    }
}

/// Anything that can abort shape construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
