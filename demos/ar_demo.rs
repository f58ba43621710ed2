//! Lane arrow over simulated camera video.
//!
//! Run with `cargo run --example ar_demo -- --help` for options.

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use glam::Vec2;

use lane_ar_renderer::backend::TextureFormat;
use lane_ar_renderer::{
    window, ArEvent, ArRenderer, BuiltinMeshes, DummyBackend, RendererConfig, SimulatedProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliBackend {
    /// Draw into a window with wgpu
    #[default]
    Wgpu,
    /// No GPU; log what each frame would draw
    Dummy,
}

/// Lane arrow AR overlay demo.
#[derive(Parser, Debug)]
#[command(name = "ar_demo", about = "Lane arrow AR overlay demo", version)]
struct Args {
    /// Graphics backend to use.
    #[arg(long, default_value = "wgpu", value_enum)]
    backend: CliBackend,

    /// Initial window width in pixels.
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Initial window height in pixels.
    #[arg(long, default_value = "720")]
    height: u32,

    /// Disable vertical sync (may cause tearing).
    #[arg(long)]
    no_vsync: bool,

    /// Simulation ticks per second.
    #[arg(long, default_value = "20")]
    fps: u32,

    /// Draw the ground grid under the arrow.
    #[arg(long)]
    grid: bool,

    /// Frames to render with the dummy backend.
    #[arg(long, default_value = "100")]
    max_frames: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = RendererConfig {
        width: args.width,
        height: args.height,
        vsync: !args.no_vsync,
        target_fps: args.fps,
        enable_grid: args.grid,
        ..Default::default()
    };
    let provider = Rc::new(RefCell::new(SimulatedProvider::new(config.arrow, config.target_fps)));

    let result = match args.backend {
        CliBackend::Wgpu => run_windowed(config, provider),
        CliBackend::Dummy => run_headless(config, provider, args.max_frames),
    };
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run_windowed(
    config: RendererConfig,
    provider: Rc<RefCell<SimulatedProvider>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let view_size = Vec2::new(config.width as f32, config.height as f32);
    let simulation = Rc::clone(&provider);

    window::run(config, Box::new(provider), &BuiltinMeshes, move |renderer, _report| {
        let sim = simulation.borrow();
        renderer.on_route_progress(&sim.progress());
        renderer.update_maneuver_location(sim.maneuver_location(), Vec2::new(320.0, 180.0), view_size);
    })?;
    Ok(())
}

fn run_headless(
    config: RendererConfig,
    provider: Rc<RefCell<SimulatedProvider>>,
    max_frames: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = DummyBackend::new(config.width, config.height);
    let view_size = Vec2::new(config.width as f32, config.height as f32);
    let mut renderer = ArRenderer::new(
        backend,
        Box::new(Rc::clone(&provider)),
        TextureFormat::Bgra8Unorm,
        TextureFormat::Depth32Float,
        config,
    )?;
    renderer.init_scene(&BuiltinMeshes)?;
    renderer.events_mut().subscribe(|event| match event {
        ArEvent::RouteUpdated(route) => log::info!("Route updated: {} waypoints", route.waypoints.len()),
        ArEvent::ArrivedAtDestination => log::info!("Arrived"),
        ArEvent::ManeuverLocationUpdated(Some(p)) => log::debug!("Maneuver at {:.0}, {:.0}", p.x, p.y),
        _ => {}
    });

    for _ in 0..max_frames {
        let report = renderer.draw()?;
        let (progress, maneuver) = {
            let sim = provider.borrow();
            (sim.progress(), sim.maneuver_location())
        };
        renderer.on_route_progress(&progress);
        renderer.update_maneuver_location(maneuver, Vec2::new(320.0, 180.0), view_size);
        log::debug!(
            "t={:.2}s background={} nodes={}",
            report.time,
            report.background_drawn,
            report.nodes_drawn
        );
        renderer.backend_mut().clear_commands();
    }

    log::info!(
        "Rendered {} frames headless",
        renderer.backend().frames_presented()
    );
    Ok(())
}
