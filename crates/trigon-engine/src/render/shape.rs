use glam::Mat4;

use crate::math::Transforms;

use super::backend::{Backend, DrawCall, VertexLayout};
use super::error::{ShaderError, ShapeError};
use super::geometry::{Geometry, Vertex};
use super::shader::{
    AttributeBindings, ProgramId, ShaderProgram, ShaderSources, UniformSlot, COLOR_ATTRIBUTE,
    COLOR_UNIFORM, MVP_UNIFORM, POSITION_ATTRIBUTE,
};

/// Locations looked up once after linking and reused for every draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProgramLayout {
    pub position: u32,
    pub color: u32,
    pub mvp: UniformSlot,
    /// Present only when the program declares `u_color`.
    pub color_override: Option<UniformSlot>,
}

impl ProgramLayout {
    pub fn resolve(program: &ShaderProgram) -> Result<Self, ShaderError> {
        let attribute = |name: &str, components: u32| -> Result<u32, ShaderError> {
            let info = program
                .attributes()
                .iter()
                .find(|a| a.name == name)
                .ok_or_else(|| ShaderError::link(format!("missing attribute `{name}`")))?;
            if info.float_components != Some(components) {
                return Err(ShaderError::link(format!(
                    "`{name}` must be a {components}-component f32 vector to match the vertex layout"
                )));
            }
            Ok(info.location)
        };

        let position = attribute(POSITION_ATTRIBUTE, Vertex::POSITION_COMPONENTS)?;
        let color = attribute(COLOR_ATTRIBUTE, Vertex::COLOR_COMPONENTS)?;
        let mvp = program
            .uniform_location(MVP_UNIFORM)
            .ok_or_else(|| ShaderError::link(format!("missing uniform `{MVP_UNIFORM}`")))?;

        if mvp.size != std::mem::size_of::<Mat4>() as u64 {
            return Err(ShaderError::link(format!(
                "`{MVP_UNIFORM}` must be a mat4x4<f32>, found {} bytes",
                mvp.size
            )));
        }

        let color_override = program
            .uniform_location(COLOR_UNIFORM)
            .filter(|slot| slot.size == std::mem::size_of::<[f32; 4]>() as u64);

        Ok(Self {
            position,
            color,
            mvp,
            color_override,
        })
    }
}

/// A drawable: one linked program and one vertex buffer on backend `B`.
///
/// Both resources are released when the shape is dropped.
pub struct Shape<B: Backend> {
    program: B::Program,
    buffer: B::VertexBuffer,

    program_id: ProgramId,
    layout: ProgramLayout,
    vertex_layout: VertexLayout,
    vertex_count: u32,

    warned_no_color_uniform: bool,
}

impl<B: Backend> Shape<B> {
    /// Builds a shape with the built-in flat shader pair.
    pub fn new(backend: &mut B, geometry: &Geometry) -> Result<Self, ShapeError> {
        Self::with_shaders(backend, geometry, &ShaderSources::flat())
    }

    /// Builds a shape from custom shader sources.
    ///
    /// The sources must declare `a_position`, `a_color` and a `u_mvp`
    /// matrix; attributes are bound to locations 0 and 1 before linking.
    pub fn with_shaders(
        backend: &mut B,
        geometry: &Geometry,
        sources: &ShaderSources,
    ) -> Result<Self, ShapeError> {
        let data = geometry.vertex_data();
        log::debug!("shape vertex data: {} scalars, {} vertices", data.len(), geometry.vertex_count());

        let program = ShaderProgram::from_sources(sources, &AttributeBindings::standard())?;
        let layout = ProgramLayout::resolve(&program)?;
        let vertex_layout = VertexLayout::interleaved(layout.position, layout.color);

        let gpu_program = backend.create_program(&program, &vertex_layout)?;
        let buffer = backend.create_vertex_buffer(data)?;

        log::debug!(
            "{}: position@{} color@{} mvp@{}:{}",
            program.id(),
            layout.position,
            layout.color,
            layout.mvp.group,
            layout.mvp.binding
        );

        Ok(Self {
            program: gpu_program,
            buffer,
            program_id: program.id(),
            layout,
            vertex_layout,
            vertex_count: geometry.vertex_count(),
            warned_no_color_uniform: false,
        })
    }

    pub fn program_id(&self) -> ProgramId {
        self.program_id
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Uploads `projection * view * model` and records one draw of every vertex.
    ///
    /// Returns the matrix that was uploaded. GPU-side failures are not
    /// reported here; see [`check_errors`](super::check_errors).
    pub fn draw(&mut self, backend: &mut B, transforms: &Transforms) -> Mat4 {
        let mvp = transforms.mvp();
        let cols = mvp.to_cols_array();
        backend.write_uniform(&self.program, self.layout.mvp, bytemuck::cast_slice(&cols));

        backend.draw(
            &self.program,
            &self.buffer,
            DrawCall {
                layout: self.vertex_layout,
                first_vertex: 0,
                vertex_count: self.vertex_count,
            },
        );

        mvp
    }

    /// Writes the shape-wide color uniform.
    ///
    /// The built-in shaders color by vertex and ignore this value. Programs
    /// without a `u_color` vec4 make this a no-op.
    pub fn set_color(&mut self, backend: &mut B, rgba: [f32; 4]) {
        let Some(slot) = self.layout.color_override else {
            if !self.warned_no_color_uniform {
                log::debug!("{}: no `{COLOR_UNIFORM}` uniform; set_color ignored", self.program_id);
                self.warned_no_color_uniform = true;
            }
            return;
        };
        backend.write_uniform(&self.program, slot, bytemuck::cast_slice(&rgba));
    }
}
