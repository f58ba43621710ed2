use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use glam::{Vec2, Vec3, Vec4};

use lane_ar_renderer::backend::dummy::{DummyBackend, FailureInjection, RecordedCommand};
use lane_ar_renderer::backend::{BackendError, LoadOp, TextureFormat};
use lane_ar_renderer::pipeline::{ArrowVertexUniforms, FragmentUniforms};
use lane_ar_renderer::resources::{Mesh, MeshSource};
use lane_ar_renderer::{
    ArEvent, ArRenderer, BuiltinMeshes, CameraParams, DataProvider, PixelFormat, RendererConfig,
    RendererError, RouteData, VideoFrame,
};

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedProvider {
    camera: CameraParams,
    route: RouteData,
    frames: VecDeque<Option<VideoFrame>>,
    calls: Vec<&'static str>,
}

impl DataProvider for ScriptedProvider {
    fn camera_params(&mut self) -> CameraParams {
        self.calls.push("camera_params");
        self.camera
    }

    fn current_frame(&mut self) -> Option<VideoFrame> {
        self.calls.push("current_frame");
        self.frames.pop_front().flatten()
    }

    fn route_data(&mut self) -> RouteData {
        self.calls.push("route_data");
        self.route
    }
}

fn video_frame(width: u32, height: u32) -> VideoFrame {
    VideoFrame {
        width,
        height,
        format: PixelFormat::Bgra8,
        data: vec![0x40; (width * height * 4) as usize],
    }
}

fn scenario_route() -> RouteData {
    RouteData::new(
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(5.0, 0.0, 1.0),
        Vec3::new(10.0, 0.0, 2.0),
        Vec3::new(15.0, 0.0, 0.0),
    )
}

fn scenario_camera() -> CameraParams {
    CameraParams {
        aspect_ratio: 1.77,
        vertical_fov: 60f32.to_radians(),
        pitch: 0.1,
        roll: 0.0,
        height: 1.5,
    }
}

fn build(
    backend: DummyBackend,
    provider: &Rc<RefCell<ScriptedProvider>>,
) -> Result<ArRenderer<DummyBackend>, RendererError> {
    ArRenderer::new(
        backend,
        Box::new(Rc::clone(provider)),
        TextureFormat::Bgra8Unorm,
        TextureFormat::Depth32Float,
        RendererConfig::default(),
    )
}

fn setup(frames: Vec<Option<VideoFrame>>) -> (ArRenderer<DummyBackend>, Rc<RefCell<ScriptedProvider>>) {
    let provider = Rc::new(RefCell::new(ScriptedProvider {
        camera: scenario_camera(),
        route: scenario_route(),
        frames: frames.into(),
        calls: Vec::new(),
    }));
    let mut renderer = build(DummyBackend::default(), &provider).unwrap();
    renderer.init_scene(&BuiltinMeshes).unwrap();
    (renderer, provider)
}

fn position_of(commands: &[RecordedCommand], pred: impl Fn(&RecordedCommand) -> bool) -> Option<usize> {
    commands.iter().position(pred)
}

fn is_background_draw(c: &RecordedCommand) -> bool {
    matches!(c, RecordedCommand::Draw { vertices, .. } if *vertices == (0..4))
}

fn is_scene_draw(c: &RecordedCommand) -> bool {
    matches!(c, RecordedCommand::DrawIndexed { .. })
}

// ---------------------------------------------------------------------------
// Draw order and background handling
// ---------------------------------------------------------------------------

#[test]
fn background_is_recorded_before_scene() {
    let (mut renderer, _) = setup(vec![Some(video_frame(8, 4))]);
    let report = renderer.draw().unwrap();

    assert!(report.presented);
    assert!(report.background_drawn);
    assert_eq!(report.nodes_drawn, 1);

    let commands = renderer.backend().commands();
    let background = position_of(commands, is_background_draw).unwrap();
    let scene = position_of(commands, is_scene_draw).unwrap();
    assert!(background < scene);
    assert_eq!(commands.last(), Some(&RecordedCommand::EndFrame));
}

#[test]
fn missing_frame_still_draws_scene() {
    let (mut renderer, _) = setup(vec![None]);
    let report = renderer.draw().unwrap();

    assert!(report.presented);
    assert!(!report.background_drawn);
    assert_eq!(report.nodes_drawn, 1);
    let commands = renderer.backend().commands();
    assert!(position_of(commands, is_background_draw).is_none());
    assert!(position_of(commands, is_scene_draw).is_some());
}

#[test]
fn malformed_frame_skips_background_only() {
    let mut short = video_frame(8, 4);
    short.data.truncate(17);
    let (mut renderer, _) = setup(vec![Some(short), Some(video_frame(8, 4))]);

    let first = renderer.draw().unwrap();
    assert!(!first.background_drawn);
    assert_eq!(first.nodes_drawn, 1);

    let second = renderer.draw().unwrap();
    assert!(second.background_drawn);
}

#[test]
fn texture_creation_failure_skips_background() {
    let (mut renderer, _) = setup(vec![Some(video_frame(8, 4))]);
    renderer.backend_mut().failures_mut().texture = true;

    let report = renderer.draw().unwrap();
    assert!(!report.background_drawn);
    assert_eq!(report.nodes_drawn, 1);
}

#[test]
fn frame_clears_to_transparent_black_and_far_depth() {
    let (mut renderer, _) = setup(vec![None]);
    renderer.draw().unwrap();

    let pass = renderer
        .backend()
        .commands()
        .iter()
        .find_map(|c| match c {
            RecordedCommand::BeginRenderPass(desc) => Some(desc.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(pass.color_attachments[0].load_op, LoadOp::Clear([0.0, 0.0, 0.0, 0.0]));
    let depth = pass.depth_stencil_attachment.unwrap();
    assert_eq!(depth.depth_clear_value, 1.0);
}

// ---------------------------------------------------------------------------
// Per-tick sequence
// ---------------------------------------------------------------------------

#[test]
fn provider_is_pulled_in_tick_order() {
    let (mut renderer, provider) = setup(vec![None, None]);
    renderer.draw().unwrap();
    renderer.draw().unwrap();

    assert_eq!(
        provider.borrow().calls,
        vec![
            "camera_params",
            "route_data",
            "current_frame",
            "camera_params",
            "route_data",
            "current_frame",
        ]
    );
}

#[test]
fn clock_advances_by_target_frame_time() {
    let (mut renderer, _) = setup(vec![]);
    let first = renderer.draw().unwrap();
    let second = renderer.draw().unwrap();
    assert!((first.time - 0.05).abs() < 1e-9);
    assert!((second.time - 0.10).abs() < 1e-9);
}

#[test]
fn missing_drawable_only_updates_state() {
    let (mut renderer, provider) = setup(vec![Some(video_frame(8, 4))]);
    renderer.backend_mut().failures_mut().drawable = true;

    let report = renderer.draw().unwrap();
    assert!(!report.presented);
    assert_eq!(report.nodes_drawn, 0);
    assert!(renderer.backend().draw_calls().is_empty());
    assert_eq!(renderer.backend().frames_presented(), 0);
    assert!(!provider.borrow().calls.contains(&"current_frame"));
    assert_eq!(renderer.camera().position, Vec3::new(0.0, 1.5, 0.0));

    renderer.backend_mut().failures_mut().drawable = false;
    let report = renderer.draw().unwrap();
    assert!(report.presented);
    assert!(report.background_drawn);
}

#[test]
fn draw_before_scene_init_presents_background_only() {
    let provider = Rc::new(RefCell::new(ScriptedProvider {
        frames: vec![Some(video_frame(4, 4))].into(),
        ..Default::default()
    }));
    let mut renderer = build(DummyBackend::default(), &provider).unwrap();

    let report = renderer.draw().unwrap();
    assert!(report.presented);
    assert!(report.background_drawn);
    assert_eq!(report.nodes_drawn, 0);
}

// ---------------------------------------------------------------------------
// Camera and arrow scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_camera_sits_above_origin_looking_ahead() {
    let (mut renderer, _) = setup(vec![]);
    renderer.draw().unwrap();

    let camera = renderer.camera();
    assert_eq!(camera.position, Vec3::new(0.0, 1.5, 0.0));
    let forward = camera.forward();
    assert!(forward.x > 0.9);
    assert!(forward.y < 0.0);
    assert!(forward.z.abs() < 1e-5);
}

#[test]
fn scenario_route_is_remapped_into_render_space() {
    let (mut renderer, _) = setup(vec![]);
    renderer.draw().unwrap();

    assert_eq!(
        renderer.arrow().control_points().0,
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 1.0, 0.0),
            Vec3::new(10.0, 2.0, 0.0),
            Vec3::new(15.0, 0.0, 0.0),
        ]
    );
}

#[test]
fn arrow_uniforms_carry_control_points_and_material() {
    let (mut renderer, _) = setup(vec![]);
    renderer.draw().unwrap();

    let writes: Vec<&Vec<u8>> = renderer
        .backend()
        .commands()
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::WriteBuffer { data, .. } => Some(data),
            _ => None,
        })
        .collect();
    let vertex = writes
        .iter()
        .find(|d| d.len() == std::mem::size_of::<ArrowVertexUniforms>())
        .unwrap();
    let fragment = writes
        .iter()
        .find(|d| d.len() == std::mem::size_of::<FragmentUniforms>())
        .unwrap();

    let vertex: ArrowVertexUniforms = bytemuck::pod_read_unaligned(vertex.as_slice());
    assert_eq!(vertex.control_points[1], Vec4::new(5.0, 1.0, 0.0, 1.0));
    assert_eq!(vertex.control_points[2], Vec4::new(10.0, 2.0, 0.0, 1.0));
    let expected_vp = renderer.camera().view_projection_matrix();
    assert!(vertex.mesh.view_projection.abs_diff_eq(expected_vp, 1e-5));

    let fragment: FragmentUniforms = bytemuck::pod_read_unaligned(fragment.as_slice());
    assert!((fragment.opacity - 0.99).abs() < 1e-6);
    assert_eq!(fragment.specular_power, 100.0);
    assert_eq!(fragment.camera_position, Vec3::new(0.0, 1.5, 0.0));
    assert_eq!(fragment.light.position, Vec4::new(0.0, 7.0, 0.0, 1.0));
}

#[test]
fn tick_events_reach_subscribers() {
    let (mut renderer, _) = setup(vec![]);
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    renderer
        .events_mut()
        .subscribe(move |e| sink.borrow_mut().push(e.clone()));

    renderer.draw().unwrap();
    let events = events.borrow();
    assert_eq!(events[0], ArEvent::CameraUpdated(scenario_camera()));
    assert_eq!(events[1], ArEvent::LaneUpdated(Some(scenario_route())));
}

#[test]
fn maneuver_ahead_is_reported_on_screen() {
    let (mut renderer, _) = setup(vec![]);
    renderer.draw().unwrap();

    let frame = Vec2::new(1280.0, 720.0);
    let view = Vec2::new(640.0, 360.0);
    let point = renderer
        .update_maneuver_location(Some(Vec3::new(10.0, 0.0, 0.0)), frame, view)
        .unwrap();
    // 10 m ahead on the ground is steeper than the camera pitch, so below center
    assert!((point.x - 320.0).abs() < 1e-2);
    assert!(point.y > 180.0);

    let behind = renderer.update_maneuver_location(Some(Vec3::new(-5.0, 0.0, 0.0)), frame, view);
    assert!(behind.is_none());
}

// ---------------------------------------------------------------------------
// Construction and scene population errors
// ---------------------------------------------------------------------------

#[test]
fn command_queue_failure_is_reported() {
    let provider = Rc::new(RefCell::new(ScriptedProvider::default()));
    let backend = DummyBackend::default().with_failures(FailureInjection {
        command_queue: true,
        ..Default::default()
    });
    assert!(matches!(
        build(backend, &provider),
        Err(RendererError::CommandQueueCreation(_))
    ));
}

#[test]
fn texture_cache_failure_is_reported() {
    let provider = Rc::new(RefCell::new(ScriptedProvider::default()));
    let backend = DummyBackend::default().with_failures(FailureInjection {
        sampler: true,
        ..Default::default()
    });
    assert!(matches!(
        build(backend, &provider),
        Err(RendererError::TextureCacheCreation(BackendError::SamplerCreationFailed(_)))
    ));
}

#[test]
fn base_pipeline_failure_is_reported() {
    let provider = Rc::new(RefCell::new(ScriptedProvider::default()));
    let backend = DummyBackend::default().with_failures(FailureInjection {
        pipeline_labels: vec!["Background".into()],
        ..Default::default()
    });
    assert!(matches!(
        build(backend, &provider),
        Err(RendererError::Backend(BackendError::PipelineCreationFailed(_)))
    ));
}

struct NoMeshes;

impl MeshSource for NoMeshes {
    fn load(&self, _name: &str) -> Option<Mesh> {
        None
    }
}

struct EmptyMeshes;

impl MeshSource for EmptyMeshes {
    fn load(&self, name: &str) -> Option<Mesh> {
        Some(Mesh::new(name))
    }
}

#[test]
fn missing_and_empty_meshes_are_distinguished() {
    let provider = Rc::new(RefCell::new(ScriptedProvider::default()));
    let mut renderer = build(DummyBackend::default(), &provider).unwrap();

    assert_eq!(
        renderer.init_scene(&NoMeshes),
        Err(RendererError::MeshNotFound("lane".into()))
    );
    assert_eq!(
        renderer.init_scene(&EmptyMeshes),
        Err(RendererError::MeshEmpty("lane".into()))
    );
    assert!(renderer.scene().root_children().is_empty());
}

#[test]
fn scene_can_only_be_initialized_once() {
    let (mut renderer, _) = setup(vec![]);
    assert_eq!(
        renderer.init_scene(&BuiltinMeshes),
        Err(RendererError::SceneAlreadyInitialized)
    );
    assert_eq!(renderer.scene().root_children().len(), 1);
}

#[test]
fn video_and_depth_textures_stay_live_between_frames() {
    let (mut renderer, _) = setup(vec![Some(video_frame(8, 4))]);
    renderer.draw().unwrap();
    assert!(renderer.backend().live_buffer_count() > 0);
    assert_eq!(renderer.backend().live_texture_count(), 2);
}
