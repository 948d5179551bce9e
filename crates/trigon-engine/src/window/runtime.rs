use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx};
use crate::device::{Gpu, GpuInit};
use crate::time::FrameClock;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "trigon".to_string(),
            initial_size: LogicalSize::new(960.0, 720.0),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Runs the event loop until the window closes or the app exits.
    ///
    /// The window and its GPU context are created on resume and destroyed
    /// on suspend; the app is told about both.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + App,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = RuntimeState {
            config,
            gpu_init,
            app,
            surface: None,
            clock: FrameClock::default(),
            exit_requested: false,
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        Ok(())
    }
}

#[self_referencing]
struct SurfaceEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct RuntimeState<A: App> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    surface: Option<SurfaceEntry>,
    clock: FrameClock,
    exit_requested: bool,
}

impl<A: App> RuntimeState<A> {
    fn create_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let entry = SurfaceEntryTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()?;

        let app = &mut self.app;
        entry
            .with_gpu(|gpu| app.on_surface_created(gpu))
            .context("application failed to initialize GPU resources")?;

        entry.with_window(|w| w.request_redraw());
        self.surface = Some(entry);
        self.clock.reset();
        Ok(())
    }

    fn destroy_surface(&mut self) {
        if self.surface.is_some() {
            // App resources reference the device; release them first.
            self.app.on_surface_lost();
            self.surface = None;
        }
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        self.destroy_surface();
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.surface.as_mut() else { return };

        let time = self.clock.tick();
        let app = &mut self.app;
        let control = entry.with_mut(|fields| {
            let mut ctx = FrameCtx {
                window: fields.window,
                gpu: fields.gpu,
                time,
            };
            app.on_frame(&mut ctx)
        });

        if control == AppControl::Exit {
            self.exit(event_loop);
        }
    }
}

impl<A: App> ApplicationHandler for RuntimeState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.surface.is_some() || self.exit_requested {
            return;
        }
        log::info!("resumed; creating surface");

        if let Err(e) = self.create_surface(event_loop) {
            log::error!("failed to create surface: {e:#}");
            self.exit(event_loop);
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("suspended; releasing surface");
        self.destroy_surface();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous rendering.
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = self.surface.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.exit(event_loop),

            WindowEvent::Resized(size) => {
                if let Some(entry) = self.surface.as_mut() {
                    entry.with_gpu_mut(|gpu| gpu.resize(size));
                    self.app.on_resize(size.width, size.height);
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.surface.as_mut() {
                    let size = entry.with_window(|w| w.inner_size());
                    entry.with_gpu_mut(|gpu| gpu.resize(size));
                    self.app.on_resize(size.width, size.height);
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
