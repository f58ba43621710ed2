//! Lane Arrow AR Renderer
//!
//! Draws a navigation arrow over live camera video. Every tick the renderer
//! pulls camera parameters, a video frame and four arrow control points from
//! a [`DataProvider`], then draws the frame as a full-screen background and
//! the scene graph on top of it.
//!
//! Two backends implement [`GraphicsBackend`]:
//! - **wgpu**: presents to a winit window
//! - **Dummy**: records commands for tests and headless runs

pub mod backend;
pub mod error;
pub mod events;
pub mod frame;
pub mod math;
pub mod pipeline;
pub mod provider;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod simulation;
pub mod window;

use glam::Vec4;

pub use backend::dummy::DummyBackend;
pub use backend::wgpu_backend::WgpuBackend;
pub use backend::GraphicsBackend;
pub use error::{RendererError, RendererResult};
pub use events::{ArEvent, EventDispatcher, NavigationRoute, NavigationTracker, RouteProgress};
pub use provider::{CameraParams, DataProvider, PixelFormat, RouteData, VideoFrame};
pub use renderer::{ArRenderer, FrameReport};
pub use resources::{BuiltinMeshes, MeshSource};
pub use simulation::SimulatedProvider;

/// Bounds the route producer applies when choosing the four control points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowConstants {
    /// Distance past the route origin where a turn may start
    pub turn_offset_after_origin: f32,
    pub max_length: f32,
    /// Smallest distance between the inner control points and the chord
    pub min_mid_offset: f32,
    /// Units per second the arrow travels back to its rest pose
    pub reset_speed: f32,
}

impl Default for ArrowConstants {
    fn default() -> Self {
        Self {
            turn_offset_after_origin: 10.0,
            max_length: 25.0,
            min_mid_offset: 0.5,
            reset_speed: 10.0,
        }
    }
}

/// Configuration for the renderer and its window
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Ticks per second of the simulated clock
    pub target_fps: u32,
    pub near: f32,
    pub far: f32,
    pub clear_color: [f32; 4],
    pub arrow_color: Vec4,
    pub grid_color: Vec4,
    pub arrow: ArrowConstants,
    /// Attach the ground grid to the scene
    pub enable_grid: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "Lane Arrow AR".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            target_fps: 20,
            near: math::NEAR_PLANE,
            far: math::FAR_PLANE,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            arrow_color: Vec4::new(0.2745, 0.4117, 0.949, 0.99),
            grid_color: Vec4::new(0.952, 0.0549, 0.3607, 0.95),
            arrow: ArrowConstants::default(),
            enable_grid: false,
        }
    }
}
