//! Window hosting using winit
//!
//! Owns the window and a wgpu-backed [`ArRenderer`] and requests a redraw
//! every frame interval of the renderer's clock.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window as WinitWindow, WindowBuilder},
};

use crate::backend::wgpu_backend::WgpuBackend;
use crate::backend::{BackendError, GraphicsBackend, TextureFormat};
use crate::error::RendererError;
use crate::provider::DataProvider;
use crate::renderer::{ArRenderer, FrameReport};
use crate::resources::MeshSource;
use crate::RendererConfig;

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("Failed to create window: {0}")]
    Os(#[from] winit::error::OsError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Renderer error: {0}")]
    Renderer(#[from] RendererError),
}

/// Window plus the renderer drawing into it
pub struct Window<F> {
    window: Arc<WinitWindow>,
    renderer: ArRenderer<WgpuBackend>,
    next_frame: Instant,
    on_frame: F,
    close_requested: bool,
}

impl<F> Window<F>
where
    F: FnMut(&mut ArRenderer<WgpuBackend>, &FrameReport),
{
    pub fn window(&self) -> &WinitWindow {
        &self.window
    }

    pub fn renderer(&self) -> &ArRenderer<WgpuBackend> {
        &self.renderer
    }

    /// Get current window dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Handle window events
    fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                if let Err(e) = self.renderer.resize(size.width, size.height) {
                    log::error!("Resize to {}x{} failed: {}", size.width, size.height, e);
                    self.close_requested = true;
                }
            }
            WindowEvent::RedrawRequested => match self.renderer.draw() {
                Ok(report) => (self.on_frame)(&mut self.renderer, &report),
                Err(e) => {
                    log::error!("Frame failed: {}", e);
                    self.close_requested = true;
                }
            },
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            _ => {}
        }
    }

    /// Request a redraw once the frame interval has elapsed.
    fn schedule(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let now = Instant::now();
        if now >= self.next_frame {
            self.window.request_redraw();
            self.next_frame = now + self.renderer.frame_interval();
        }
        elwt.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
    }
}

/// Open a window and draw `provider`'s data into it until closed.
///
/// `on_frame` runs after every drawn tick.
pub fn run<F>(
    config: RendererConfig,
    provider: Box<dyn DataProvider>,
    meshes: &dyn MeshSource,
    on_frame: F,
) -> Result<(), WindowError>
where
    F: FnMut(&mut ArRenderer<WgpuBackend>, &FrameReport) + 'static,
{
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(&event_loop)?,
    );

    let backend = WgpuBackend::new(Arc::clone(&window), config.vsync)?;
    let color_format = backend.swapchain_format();
    let mut renderer = ArRenderer::new(
        backend,
        provider,
        color_format,
        TextureFormat::Depth32Float,
        config,
    )?;
    renderer.init_scene(meshes)?;

    let mut host = Window {
        window,
        renderer,
        next_frame: Instant::now(),
        on_frame,
        close_requested: false,
    };

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => {
            host.handle_event(&event);
            if host.should_close() {
                elwt.exit();
            }
        }
        Event::AboutToWait => host.schedule(elwt),
        _ => {}
    })?;

    Ok(())
}
