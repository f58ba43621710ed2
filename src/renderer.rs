//! Per-tick frame loop over a [`GraphicsBackend`]

use glam::{Vec2, Vec3};

use crate::backend::*;
use crate::error::{RendererError, RendererResult};
use crate::events::{ArEvent, EventDispatcher, NavigationTracker, RouteProgress};
use crate::frame::FrameClock;
use crate::math;
use crate::pipeline::*;
use crate::provider::DataProvider;
use crate::resources::{BuiltinMeshes, GpuMesh, Material, MeshSource, ShaderLibrary, VideoTextureCache};
use crate::scene::*;
use crate::RendererConfig;

/// What one call to [`ArRenderer::draw`] did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    /// Simulated clock time after this tick
    pub time: f64,
    pub background_drawn: bool,
    pub nodes_drawn: u32,
    /// `false` when no drawable was available
    pub presented: bool,
}

/// Uniform buffers and bind group for one draw of a frame
struct DrawSlot {
    vertex_buffer: BufferHandle,
    fragment_buffer: BufferHandle,
    bind_group: BindGroupHandle,
}

struct DepthTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
}

/// A node resolved for drawing this tick
struct DrawItem {
    kind: PipelineKind,
    front_face: FrontFace,
    node: NodeId,
    vertex_uniforms: Vec<u8>,
    fragment_uniforms: FragmentUniforms,
}

/// Draws camera video with the lane arrow scene on top.
///
/// Owns the backend, the data provider, the scene graph and every GPU
/// resource it creates; all of them are released on drop.
pub struct ArRenderer<B: GraphicsBackend> {
    backend: B,
    provider: Box<dyn DataProvider>,
    config: RendererConfig,

    queue: CommandQueueHandle,
    video_textures: VideoTextureCache,
    draw_layout: BindGroupLayoutHandle,
    pipelines: PipelineCache,
    depth_format: TextureFormat,
    depth: Option<DepthTarget>,
    draw_slots: Vec<DrawSlot>,

    scene: SceneGraph,
    arrow_node: NodeId,
    grid_node: NodeId,
    scene_initialized: bool,
    camera: Camera,
    arrow: ArrowController,
    default_light: Light,

    clock: FrameClock,
    events: EventDispatcher,
    navigation: NavigationTracker,
}

impl<B: GraphicsBackend> ArRenderer<B> {
    /// Create every long-lived GPU object the frame loop needs.
    ///
    /// Fails without retrying if the command queue, video texture cache,
    /// shader entry points or base pipelines cannot be created.
    pub fn new(
        mut backend: B,
        provider: Box<dyn DataProvider>,
        color_format: TextureFormat,
        depth_format: TextureFormat,
        config: RendererConfig,
    ) -> RendererResult<Self> {
        let queue = backend
            .create_command_queue()
            .map_err(RendererError::CommandQueueCreation)?;
        let video_textures =
            VideoTextureCache::new(&mut backend).map_err(RendererError::TextureCacheCreation)?;

        let draw_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::VERTEX,
                ty: BindingType::UniformBuffer,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
        ])?;

        let pipelines = PipelineCache::new(
            &mut backend,
            &ShaderLibrary::builtin(),
            color_format,
            depth_format,
            draw_layout,
            video_textures.layout(),
        )?;

        let mut scene = SceneGraph::new();
        let arrow_node = scene.create_node(Node::new("arrow").with_kind(NodeKind::Arrow));
        let grid_node = scene.create_node(Node::new("grid"));

        let mut renderer = Self {
            backend,
            provider,
            queue,
            video_textures,
            draw_layout,
            pipelines,
            depth_format,
            depth: None,
            draw_slots: Vec::new(),
            scene,
            arrow_node,
            grid_node,
            scene_initialized: false,
            camera: Camera::new(config.near, config.far),
            arrow: ArrowController::new(),
            default_light: Light::default(),
            clock: FrameClock::new(config.target_fps),
            events: EventDispatcher::new(),
            navigation: NavigationTracker::default(),
            config,
        };
        renderer.recreate_depth()?;

        let (width, height) = renderer.backend.surface_size();
        log::info!(
            "AR renderer initialized: {}x{}, color {:?}, depth {:?}, {} Hz",
            width,
            height,
            color_format,
            depth_format,
            renderer.clock.target_fps()
        );
        Ok(renderer)
    }

    /// Populate the arrow node with the `"lane"` mesh and attach it to the root.
    ///
    /// May only be called once. The grid is populated and attached only when
    /// [`RendererConfig::enable_grid`] is set.
    pub fn init_scene(&mut self, meshes: &dyn MeshSource) -> RendererResult<()> {
        if self.scene_initialized {
            return Err(RendererError::SceneAlreadyInitialized);
        }

        let lane = self.upload_mesh(meshes, BuiltinMeshes::LANE)?;
        let grid = if self.config.enable_grid {
            match self.upload_mesh(meshes, BuiltinMeshes::GRID) {
                Ok(mesh) => Some(mesh),
                Err(e) => {
                    lane.destroy(&mut self.backend);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let arrow_entity = Entity::new(lane, Material::arrow(self.config.arrow_color))
            .with_pipeline(PipelineKind::Arrow);
        if let Some(node) = self.scene.node_mut(self.arrow_node) {
            node.entity = Some(arrow_entity);
        }
        let root = self.scene.root();
        self.scene.add_child(root, self.arrow_node)?;

        if let Some(grid) = grid {
            if let Some(node) = self.scene.node_mut(self.grid_node) {
                node.entity = Some(Entity::new(grid, Material::grid(self.config.grid_color)));
            }
            self.scene.add_child(root, self.grid_node)?;
        }

        self.default_light = Light::default();
        self.scene_initialized = true;
        log::info!(
            "Scene initialized with {} top-level nodes",
            self.scene.root_children().len()
        );
        Ok(())
    }

    fn upload_mesh(&mut self, meshes: &dyn MeshSource, name: &str) -> RendererResult<GpuMesh> {
        let mesh = meshes
            .load(name)
            .ok_or_else(|| RendererError::MeshNotFound(name.to_string()))?;
        if mesh.is_empty() {
            return Err(RendererError::MeshEmpty(name.to_string()));
        }
        Ok(mesh.upload(&mut self.backend)?)
    }

    /// Run one tick: update the camera and arrow, then draw the video
    /// background followed by the scene.
    ///
    /// A tick without a drawable only updates state. Non-recoverable backend
    /// errors are returned.
    pub fn draw(&mut self) -> RendererResult<FrameReport> {
        let time = self.clock.tick();

        let params = self.provider.camera_params();
        self.camera.update(&params);
        self.events.dispatch(&ArEvent::CameraUpdated(params));

        let route = self.provider.route_data();
        self.arrow.update(&route);
        self.events.dispatch(&ArEvent::LaneUpdated(Some(route)));

        let mut report = FrameReport {
            time,
            ..Default::default()
        };

        let items = self.collect_draw_items();
        self.ensure_draw_slots(items.len())?;

        let frame = match self.backend.begin_frame(self.queue) {
            Ok(frame) => frame,
            Err(e) if e.is_recoverable() => {
                log::warn!("Skipping frame {}: {}", self.clock.frame(), e);
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let background = match self.provider.current_frame() {
            Some(video) => match self.video_textures.texture_for(&mut self.backend, &video) {
                Ok(bind_group) => Some(bind_group),
                Err(e) => {
                    log::warn!("Video frame conversion failed, skipping background: {}", e);
                    None
                }
            },
            None => {
                log::debug!("No video frame this tick");
                None
            }
        };

        for (slot, item) in self.draw_slots.iter().zip(&items) {
            self.backend
                .write_buffer(slot.vertex_buffer, 0, &item.vertex_uniforms);
            self.backend.write_buffer(
                slot.fragment_buffer,
                0,
                bytemuck::bytes_of(&item.fragment_uniforms),
            );
        }

        self.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("AR Pass".into()),
            color_attachments: vec![ColorAttachment {
                view: frame.swapchain_view,
                load_op: LoadOp::Clear(self.config.clear_color),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: self.depth.as_ref().map(|depth| DepthStencilAttachment {
                view: depth.view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Discard,
                depth_clear_value: 1.0,
            }),
        });

        if let Some(bind_group) = background {
            report.background_drawn = self.draw_background(bind_group);
        }

        for index in 0..items.len() {
            if self.draw_item(&items[index], index) {
                report.nodes_drawn += 1;
            }
        }

        self.backend.end_render_pass();
        self.backend.end_frame()?;
        report.presented = true;

        Ok(report)
    }

    fn draw_background(&mut self, bind_group: BindGroupHandle) -> bool {
        let key = PipelineKind::Background.base_key();
        let Some(pipeline) = self.pipelines.get(&mut self.backend, key) else {
            return false;
        };
        self.backend.set_render_pipeline(pipeline);
        self.backend.set_bind_group(0, bind_group);
        self.backend.draw(0..4, 0..1);
        true
    }

    fn draw_item(&mut self, item: &DrawItem, slot: usize) -> bool {
        let Some(bind_group) = self.draw_slots.get(slot).map(|s| s.bind_group) else {
            return false;
        };

        let Some(mesh) = self
            .scene
            .node(item.node)
            .and_then(|node| node.entity.as_ref())
            .and_then(|entity| entity.mesh.as_ref())
        else {
            return false;
        };

        let mut drawn = false;
        for submesh in &mesh.submeshes {
            let key = PipelineKey {
                kind: item.kind,
                front_face: item.front_face,
                topology: submesh.topology,
            };
            let Some(pipeline) = self.pipelines.get(&mut self.backend, key) else {
                continue;
            };

            self.backend.set_render_pipeline(pipeline);
            self.backend.set_bind_group(0, bind_group);
            self.backend.set_vertex_buffer(0, mesh.vertex_buffer, 0);
            self.backend
                .set_index_buffer(mesh.index_buffer, 0, mesh.index_format);
            self.backend
                .draw_indexed(submesh.index_range.clone(), 0, 0..1);
            drawn = true;
        }
        drawn
    }

    /// Root children with a mesh, in insertion order, with their uniforms.
    fn collect_draw_items(&self) -> Vec<DrawItem> {
        let view_projection = self.camera.view_projection_matrix();
        let mut items = Vec::new();

        for &id in self.scene.root_children() {
            let Some(node) = self.scene.node(id) else {
                continue;
            };
            let Some(entity) = &node.entity else {
                continue;
            };
            if entity.mesh.is_none() {
                continue;
            }

            let model = self.scene.world_transform(id);
            let vertex_uniforms = match node.kind {
                NodeKind::Arrow => bytemuck::bytes_of(&ArrowVertexUniforms::new(
                    view_projection,
                    model,
                    self.arrow.control_points(),
                ))
                .to_vec(),
                NodeKind::Default => {
                    bytemuck::bytes_of(&MeshVertexUniforms::new(view_projection, model)).to_vec()
                }
            };
            let light = entity.material.resolve_light(&self.default_light);

            items.push(DrawItem {
                kind: entity.pipeline.unwrap_or(PipelineKind::Default),
                front_face: entity.material.front_face,
                node: id,
                vertex_uniforms,
                fragment_uniforms: FragmentUniforms::new(&self.camera, &entity.material, &light),
            });
        }
        items
    }

    fn ensure_draw_slots(&mut self, count: usize) -> BackendResult<()> {
        while self.draw_slots.len() < count {
            let index = self.draw_slots.len();
            let vertex_buffer = self.backend.create_buffer(&BufferDescriptor {
                label: Some(format!("Draw {} Vertex Uniforms", index)),
                size: VERTEX_UNIFORM_SIZE,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })?;
            let fragment_buffer = self.backend.create_buffer(&BufferDescriptor {
                label: Some(format!("Draw {} Fragment Uniforms", index)),
                size: FRAGMENT_UNIFORM_SIZE,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })?;
            let bind_group = self.backend.create_bind_group(
                self.draw_layout,
                &[
                    (
                        0,
                        BindGroupEntry::Buffer {
                            buffer: vertex_buffer,
                            offset: 0,
                            size: Some(VERTEX_UNIFORM_SIZE),
                        },
                    ),
                    (
                        1,
                        BindGroupEntry::Buffer {
                            buffer: fragment_buffer,
                            offset: 0,
                            size: Some(FRAGMENT_UNIFORM_SIZE),
                        },
                    ),
                ],
            )?;
            log::debug!("Allocated draw slot {}", index);
            self.draw_slots.push(DrawSlot {
                vertex_buffer,
                fragment_buffer,
                bind_group,
            });
        }
        Ok(())
    }

    /// Resize the surface and the depth buffer with it.
    pub fn resize(&mut self, width: u32, height: u32) -> RendererResult<()> {
        self.backend.resize(width, height);
        self.recreate_depth()
    }

    fn recreate_depth(&mut self) -> RendererResult<()> {
        if let Some(old) = self.depth.take() {
            self.backend.destroy_texture(old.texture);
        }
        let (width, height) = self.backend.surface_size();
        let texture = self.backend.create_texture(&TextureDescriptor {
            label: Some("Depth Buffer".into()),
            width,
            height,
            format: self.depth_format,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let view = self.backend.create_texture_view(texture)?;
        self.depth = Some(DepthTarget { texture, view });
        Ok(())
    }

    /// Project a render-space point to pixel coordinates of a frame of
    /// `frame_size`, origin top-left. `None` if the point is behind the camera.
    pub fn project_to_frame(&self, point: Vec3, frame_size: Vec2) -> Option<Vec2> {
        let clip = self.camera.view_projection_matrix() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * frame_size.x,
            (1.0 - ndc.y) * 0.5 * frame_size.y,
        ))
    }

    /// Report where the upcoming maneuver appears on screen.
    ///
    /// `location` is in the route frame. The result is dispatched as
    /// [`ArEvent::ManeuverLocationUpdated`] and returned.
    pub fn update_maneuver_location(
        &mut self,
        location: Option<Vec3>,
        frame_size: Vec2,
        view_size: Vec2,
    ) -> Option<Vec2> {
        let on_screen = location
            .and_then(|p| self.project_to_frame(math::route_to_render(p), frame_size))
            .map(|p| math::aspect_fill(p, frame_size, view_size));
        self.events
            .dispatch(&ArEvent::ManeuverLocationUpdated(on_screen));
        on_screen
    }

    pub fn on_route_progress(&mut self, progress: &RouteProgress) {
        self.navigation.on_progress(progress, &mut self.events);
    }

    pub fn on_reroute(&mut self) {
        self.navigation.on_reroute();
    }

    /// Frame duration the display loop should aim for
    pub fn frame_interval(&self) -> std::time::Duration {
        self.clock.frame_duration()
    }

    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn arrow_node(&self) -> NodeId {
        self.arrow_node
    }

    pub fn grid_node(&self) -> NodeId {
        self.grid_node
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn arrow(&self) -> &ArrowController {
        &self.arrow
    }

    pub fn default_light(&self) -> &Light {
        &self.default_light
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: GraphicsBackend> Drop for ArRenderer<B> {
    fn drop(&mut self) {
        for slot in self.draw_slots.drain(..) {
            self.backend.destroy_bind_group(slot.bind_group);
            self.backend.destroy_buffer(slot.vertex_buffer);
            self.backend.destroy_buffer(slot.fragment_buffer);
        }
        for id in [self.arrow_node, self.grid_node] {
            let mesh = self
                .scene
                .node_mut(id)
                .and_then(|node| node.entity.as_mut())
                .and_then(|entity| entity.mesh.take());
            if let Some(mesh) = mesh {
                mesh.destroy(&mut self.backend);
            }
        }
        self.video_textures.release(&mut self.backend);
        if let Some(depth) = self.depth.take() {
            self.backend.destroy_texture(depth.texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, RecordedCommand};
    use crate::provider::{CameraParams, RouteData, VideoFrame};

    struct StillProvider;

    impl DataProvider for StillProvider {
        fn camera_params(&mut self) -> CameraParams {
            CameraParams::default()
        }

        fn current_frame(&mut self) -> Option<VideoFrame> {
            None
        }

        fn route_data(&mut self) -> RouteData {
            RouteData::new(
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(15.0, 0.0, 0.0),
            )
        }
    }

    fn renderer(config: RendererConfig) -> ArRenderer<DummyBackend> {
        ArRenderer::new(
            DummyBackend::default(),
            Box::new(StillProvider),
            TextureFormat::Bgra8Unorm,
            TextureFormat::Depth32Float,
            config,
        )
        .unwrap()
    }

    #[test]
    fn grid_stays_detached_by_default() {
        let mut r = renderer(RendererConfig::default());
        r.init_scene(&BuiltinMeshes).unwrap();
        assert_eq!(r.scene().root_children(), &[r.arrow_node()]);
        let grid = r.scene().node(r.grid_node()).unwrap();
        assert!(grid.entity.is_none());
        assert!(grid.parent().is_none());
    }

    #[test]
    fn enabled_grid_is_drawn_as_lines() {
        let mut r = renderer(RendererConfig {
            enable_grid: true,
            ..Default::default()
        });
        r.init_scene(&BuiltinMeshes).unwrap();
        assert_eq!(r.scene().root_children().len(), 2);

        let report = r.draw().unwrap();
        assert_eq!(report.nodes_drawn, 2);
        let line_pipelines = drawn_pipelines(&r)
            .into_iter()
            .filter(|d| d.primitive_topology == PrimitiveTopology::LineList)
            .count();
        assert_eq!(line_pipelines, 1);
    }

    fn drawn_pipelines(r: &ArRenderer<DummyBackend>) -> Vec<&RenderPipelineDescriptor> {
        r.backend()
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::SetPipeline(p) => r.backend().pipeline_descriptor(*p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn material_front_face_selects_the_pipeline_variant() {
        let mut r = renderer(RendererConfig::default());
        r.init_scene(&BuiltinMeshes).unwrap();
        let arrow = r.arrow_node();
        let entity = r.scene.node_mut(arrow).unwrap().entity.as_mut().unwrap();
        entity.material = entity.material.clone().with_front_face(FrontFace::Cw);

        let report = r.draw().unwrap();
        assert_eq!(report.nodes_drawn, 1);
        let scene_pipelines: Vec<_> = drawn_pipelines(&r)
            .into_iter()
            .filter(|d| d.vertex_entry == "arrow_vertex")
            .collect();
        assert_eq!(scene_pipelines.len(), 1);
        assert_eq!(scene_pipelines[0].front_face, FrontFace::Cw);
        assert_eq!(scene_pipelines[0].primitive_topology, PrimitiveTopology::TriangleList);
    }

    #[test]
    fn nodes_without_mesh_are_skipped() {
        let mut r = renderer(RendererConfig::default());
        r.init_scene(&BuiltinMeshes).unwrap();
        let root = r.scene().root();

        let bare = r.scene.create_node(Node::new("bare"));
        let hollow = r.scene.create_node(Node::new("hollow").with_entity(Entity {
            mesh: None,
            material: Material::default(),
            pipeline: None,
        }));
        r.scene.add_child(root, bare).unwrap();
        r.scene.add_child(root, hollow).unwrap();
        assert_eq!(r.scene().root_children().len(), 3);

        let report = r.draw().unwrap();
        assert_eq!(report.nodes_drawn, 1);
        assert!(report.presented);
        let draws = r
            .backend()
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::DrawIndexed { .. }))
            .count();
        assert_eq!(draws, 1);
    }

    #[test]
    fn draw_slots_are_reused_across_frames() {
        let mut r = renderer(RendererConfig::default());
        r.init_scene(&BuiltinMeshes).unwrap();
        r.draw().unwrap();
        let buffers = r.backend().live_buffer_count();
        r.draw().unwrap();
        assert_eq!(r.backend().live_buffer_count(), buffers);
    }

    #[test]
    fn resize_recreates_depth_buffer() {
        let mut r = renderer(RendererConfig::default());
        r.resize(640, 480).unwrap();
        let depth = r.depth.as_ref().unwrap().texture;
        let desc = r.backend().texture_descriptor(depth).unwrap();
        assert_eq!((desc.width, desc.height), (640, 480));
        assert_eq!(desc.format, TextureFormat::Depth32Float);
        assert_eq!(r.backend().live_texture_count(), 1);
    }

    #[test]
    fn point_ahead_projects_to_frame_center() {
        let mut r = renderer(RendererConfig::default());
        r.draw().unwrap();
        let center = r
            .project_to_frame(Vec3::new(100.0, 1.5, 0.0), Vec2::new(1280.0, 720.0))
            .unwrap();
        assert!((center - Vec2::new(640.0, 360.0)).length() < 1e-2);
        assert!(r
            .project_to_frame(Vec3::new(-10.0, 1.5, 0.0), Vec2::new(1280.0, 720.0))
            .is_none());
    }
}
