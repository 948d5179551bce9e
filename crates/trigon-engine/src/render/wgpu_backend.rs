use std::cell::RefCell;
use std::collections::VecDeque;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex};

use wgpu::util::DeviceExt;

use super::backend::{Backend, DrawCall, VertexLayout};
use super::ctx::RenderTarget;
use super::error::BackendError;
use super::shader::{ProgramId, ShaderProgram, UniformSlot};

type ErrorQueue = Arc<Mutex<VecDeque<String>>>;

/// Current value of one uniform, uploaded with every draw.
struct StagedUniform {
    slot: UniformSlot,
    bytes: Vec<u8>,
}

/// GPU program: pipeline plus the staged values of its uniforms.
///
/// Uniform writes only touch the staged bytes; each draw snapshots them into
/// a bind group of its own, so draws recorded before one flush do not share
/// uniform state.
pub struct WgpuProgram {
    id: ProgramId,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: RefCell<Vec<StagedUniform>>,
}

pub struct WgpuVertexBuffer {
    buffer: wgpu::Buffer,
}

struct PendingDraw {
    pipeline: wgpu::RenderPipeline,
    bind_group: Option<wgpu::BindGroup>,
    buffer: wgpu::Buffer,
    first_vertex: u32,
    vertex_count: u32,
}

/// wgpu implementation of [`Backend`].
///
/// Draws are recorded and replayed into a render target by [`flush`](Self::flush),
/// so shapes can be drawn before the frame's encoder exists.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,

    pending: Vec<PendingDraw>,
    errors: ErrorQueue,
}

impl WgpuBackend {
    /// Creates a backend and routes uncaptured device errors into its error queue.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, surface_format: wgpu::TextureFormat) -> Self {
        let errors: ErrorQueue = Arc::default();

        let sink = Arc::clone(&errors);
        device.on_uncaptured_error(Arc::new(move |err: wgpu::Error| {
            if let Ok(mut q) = sink.lock() {
                q.push_back(err.to_string());
            }
        }));

        Self {
            device: device.clone(),
            queue: queue.clone(),
            surface_format,
            pending: Vec::new(),
            errors,
        }
    }

    /// Number of draws waiting for [`flush`](Self::flush).
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Encodes all recorded draws into one render pass over `target`.
    ///
    /// The target is loaded, not cleared.
    pub fn flush(&mut self, target: &mut RenderTarget<'_>) {
        if self.pending.is_empty() {
            return;
        }
        let draws = std::mem::take(&mut self.pending);

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("trigon shape pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for draw in &draws {
            rpass.set_pipeline(&draw.pipeline);
            if let Some(bg) = draw.bind_group.as_ref() {
                rpass.set_bind_group(0, bg, &[]);
            }
            rpass.set_vertex_buffer(0, draw.buffer.slice(..));
            rpass.draw(draw.first_vertex..draw.first_vertex + draw.vertex_count, 0..1);
        }
    }

    fn push_error(&self, err: String) {
        log::error!("{err}");
        if let Ok(mut q) = self.errors.lock() {
            q.push_back(err);
        }
    }

    fn build_program(
        &self,
        program: &ShaderProgram,
        layout: &VertexLayout,
    ) -> Result<WgpuProgram, BackendError> {
        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("trigon vertex shader"),
            source: wgpu::ShaderSource::Wgsl(program.vertex().source().into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("trigon fragment shader"),
            source: wgpu::ShaderSource::Wgsl(program.fragment().source().into()),
        });

        let mut entries = Vec::with_capacity(program.uniforms().len());
        let mut uniforms = Vec::with_capacity(program.uniforms().len());

        for u in program.uniforms() {
            if u.slot.group != 0 {
                return Err(BackendError::new(
                    "program",
                    format!("uniform `{}` uses bind group {}; only group 0 is supported", u.name, u.slot.group),
                ));
            }
            let min_size = NonZeroU64::new(u.slot.size).ok_or_else(|| {
                BackendError::new("program", format!("uniform `{}` has zero size", u.name))
            })?;
            let len = usize::try_from(u.slot.size).map_err(|_| {
                BackendError::new("program", format!("uniform `{}` is too large", u.name))
            })?;

            let mut visibility = wgpu::ShaderStages::NONE;
            if u.vertex {
                visibility |= wgpu::ShaderStages::VERTEX;
            }
            if u.fragment {
                visibility |= wgpu::ShaderStages::FRAGMENT;
            }

            entries.push(wgpu::BindGroupLayoutEntry {
                binding: u.slot.binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(min_size),
                },
                count: None,
            });
            uniforms.push(StagedUniform {
                slot: u.slot,
                bytes: vec![0; len],
            });
        }

        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("trigon program bgl"),
            entries: &entries,
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("trigon pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let mut attributes = Vec::with_capacity(2);
        for a in layout.attributes() {
            attributes.push(wgpu::VertexAttribute {
                format: float_format(a.components)?,
                offset: a.offset,
                shader_location: a.location,
            });
        }

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("trigon shape pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some(program.vertex().entry_point()),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: layout.stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },

            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some(program.fragment().entry_point()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(WgpuProgram {
            id: program.id(),
            pipeline,
            bind_group_layout,
            uniforms: RefCell::new(uniforms),
        })
    }

    /// Uploads the program's staged uniforms into fresh buffers bound by a new bind group.
    fn snapshot_uniforms(&self, program: &WgpuProgram) -> Option<wgpu::BindGroup> {
        let staged = program.uniforms.borrow();
        if staged.is_empty() {
            return None;
        }

        let buffers: Vec<wgpu::Buffer> = staged
            .iter()
            .map(|u| {
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("trigon uniform buffer"),
                    contents: &u.bytes,
                    usage: wgpu::BufferUsages::UNIFORM,
                })
            })
            .collect();

        let entries: Vec<wgpu::BindGroupEntry<'_>> = staged
            .iter()
            .zip(&buffers)
            .map(|(u, buffer)| wgpu::BindGroupEntry {
                binding: u.slot.binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("trigon draw bind group"),
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }
}

impl Backend for WgpuBackend {
    type Program = WgpuProgram;
    type VertexBuffer = WgpuVertexBuffer;

    /// Validation errors raised while building the pipeline fail the call
    /// instead of reaching the uncaptured-error queue.
    fn create_program(
        &mut self,
        program: &ShaderProgram,
        layout: &VertexLayout,
    ) -> Result<WgpuProgram, BackendError> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let built = self.build_program(program, layout);
        let captured = pollster::block_on(scope.pop());

        if let Some(err) = captured {
            return Err(BackendError::new("program", err.to_string()));
        }
        built
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<WgpuVertexBuffer, BackendError> {
        if data.is_empty() {
            return Err(BackendError::new("vertex buffer", "no vertex data"));
        }
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("trigon vertex buffer"),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Ok(WgpuVertexBuffer { buffer })
    }

    fn write_uniform(&mut self, program: &WgpuProgram, slot: UniformSlot, data: &[u8]) {
        let mut staged = program.uniforms.borrow_mut();
        let Some(uniform) = staged.iter_mut().find(|u| u.slot == slot) else {
            self.push_error(format!(
                "{}: no uniform at group {} binding {}",
                program.id, slot.group, slot.binding
            ));
            return;
        };
        if data.len() > uniform.bytes.len() {
            self.push_error(format!(
                "{}: {} bytes written to a {}-byte uniform",
                program.id,
                data.len(),
                slot.size
            ));
            return;
        }
        uniform.bytes[..data.len()].copy_from_slice(data);
    }

    fn draw(&mut self, program: &WgpuProgram, buffer: &WgpuVertexBuffer, call: DrawCall) {
        let bind_group = self.snapshot_uniforms(program);
        self.pending.push(PendingDraw {
            pipeline: program.pipeline.clone(),
            bind_group,
            buffer: buffer.buffer.clone(),
            first_vertex: call.first_vertex,
            vertex_count: call.vertex_count,
        });
    }

    fn take_error(&mut self) -> Option<String> {
        self.errors.lock().ok()?.pop_front()
    }
}

fn float_format(components: u32) -> Result<wgpu::VertexFormat, BackendError> {
    match components {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        n => Err(BackendError::new(
            "program",
            format!("no f32 vertex format with {n} components"),
        )),
    }
}
