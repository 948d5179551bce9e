use std::f32::consts::TAU;

use anyhow::Result;

use trigon_engine::core::{App, AppControl, FrameCtx};
use trigon_engine::device::Gpu;
use trigon_engine::math::{spin, Camera, Transforms};
use trigon_engine::render::{check_errors, triangle, Shape, WgpuBackend};

const CLEAR: wgpu::Color = wgpu::Color { r: 0.5, g: 0.5, b: 0.5, a: 1.0 };

/// Seconds per full turn of the triangle.
const SPIN_PERIOD: f32 = 10.0;

/// GPU-side state; rebuilt every time a surface is created.
struct Scene {
    backend: WgpuBackend,
    triangle: Shape<WgpuBackend>,
}

#[derive(Default)]
pub struct TriangleApp {
    camera: Camera,
    scene: Option<Scene>,
}

impl App for TriangleApp {
    fn on_surface_created(&mut self, gpu: &Gpu<'_>) -> Result<()> {
        let mut backend = WgpuBackend::new(gpu.device(), gpu.queue(), gpu.surface_format());
        let triangle = Shape::new(&mut backend, &triangle())?;

        let errors = check_errors(&mut backend, "create triangle");
        if let Some(first) = errors.first() {
            anyhow::bail!("triangle setup reported {} GPU error(s), first: {first}", errors.len());
        }

        log::info!("triangle ready ({}, {} vertices)", triangle.program_id(), triangle.vertex_count());
        self.scene = Some(Scene { backend, triangle });
        Ok(())
    }

    fn on_surface_lost(&mut self) {
        self.scene = None;
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Continue;
        };

        let angle = (ctx.time.elapsed % SPIN_PERIOD) / SPIN_PERIOD * TAU;
        let camera = self.camera;

        ctx.render(CLEAR, |rctx, target| {
            let transforms = Transforms::new(spin(angle), camera.view(), camera.projection(rctx.aspect()));

            scene.triangle.draw(&mut scene.backend, &transforms);
            scene.backend.flush(target);
            // Logged only; a failed frame does not stop the loop.
            let _ = check_errors(&mut scene.backend, "draw triangle");
        })
    }
}
