//! Render pipeline configurations and the pipeline cache
//!
//! Three configurations exist:
//! 1. Default - lit mesh, alpha blended, depth tested
//! 2. Arrow - same state as Default with the curve vertex stage
//! 3. Background - full-screen video quad, no vertex buffer, no depth test
//!
//! wgpu bakes winding and topology into the pipeline object, so each
//! configuration is instantiated per `(front face, topology)` on first use.

pub mod uniforms;

pub use uniforms::*;

use std::collections::{HashMap, HashSet};

use crate::backend::*;
use crate::error::RendererResult;
use crate::resources::{ShaderFunction, ShaderLibrary};

/// Pipeline selector for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Default,
    Arrow,
    Background,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::Default,
        PipelineKind::Arrow,
        PipelineKind::Background,
    ];

    pub fn config(&self) -> PipelineConfig {
        match self {
            PipelineKind::Default => PipelineConfig {
                label: "Default",
                vertex_entry: "mesh_vertex",
                fragment_entry: "mesh_fragment",
                uses_vertex_layout: true,
                blend: BlendState::alpha_blending(),
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                cull_mode: CullMode::Back,
                base_topology: PrimitiveTopology::TriangleList,
            },
            PipelineKind::Arrow => PipelineConfig {
                label: "Arrow",
                vertex_entry: "arrow_vertex",
                ..PipelineKind::Default.config()
            },
            PipelineKind::Background => PipelineConfig {
                label: "Background",
                vertex_entry: "background_vertex",
                fragment_entry: "background_fragment",
                uses_vertex_layout: false,
                blend: BlendState::replace(),
                depth_write_enabled: false,
                depth_compare: CompareFunction::Always,
                cull_mode: CullMode::None,
                base_topology: PrimitiveTopology::TriangleStrip,
            },
        }
    }

    pub fn base_key(&self) -> PipelineKey {
        PipelineKey {
            kind: *self,
            front_face: FrontFace::Ccw,
            topology: self.config().base_topology,
        }
    }
}

/// Fixed state of a pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: &'static str,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    pub uses_vertex_layout: bool,
    pub blend: BlendState,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub cull_mode: CullMode,
    pub base_topology: PrimitiveTopology,
}

/// Identifies one instantiated pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub kind: PipelineKind,
    pub front_face: FrontFace,
    pub topology: PrimitiveTopology,
}

struct ResolvedStages {
    vertex: ShaderFunction,
    fragment: ShaderFunction,
}

/// Owns every render pipeline the renderer draws with
pub struct PipelineCache {
    color_format: TextureFormat,
    depth_format: TextureFormat,
    draw_layout: BindGroupLayoutHandle,
    background_layout: BindGroupLayoutHandle,
    stages: HashMap<PipelineKind, ResolvedStages>,
    pipelines: HashMap<PipelineKey, RenderPipelineHandle>,
    failed: HashSet<PipelineKey>,
}

impl PipelineCache {
    /// Resolve every configuration's entry points and build the base variants.
    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        shaders: &ShaderLibrary,
        color_format: TextureFormat,
        depth_format: TextureFormat,
        draw_layout: BindGroupLayoutHandle,
        background_layout: BindGroupLayoutHandle,
    ) -> RendererResult<Self> {
        let mut stages = HashMap::new();
        for kind in PipelineKind::ALL {
            let config = kind.config();
            stages.insert(
                kind,
                ResolvedStages {
                    vertex: shaders.function(config.vertex_entry)?,
                    fragment: shaders.function(config.fragment_entry)?,
                },
            );
        }

        let mut cache = Self {
            color_format,
            depth_format,
            draw_layout,
            background_layout,
            stages,
            pipelines: HashMap::new(),
            failed: HashSet::new(),
        };

        for kind in PipelineKind::ALL {
            let key = kind.base_key();
            let handle = backend.create_render_pipeline(&cache.descriptor(key))?;
            cache.pipelines.insert(key, handle);
        }
        log::info!("Created {} base pipelines", cache.pipelines.len());

        Ok(cache)
    }

    /// Pipeline for `key`, built on first request.
    ///
    /// Returns `None` if the variant cannot be built; the failure is logged once.
    pub fn get<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        key: PipelineKey,
    ) -> Option<RenderPipelineHandle> {
        if let Some(handle) = self.pipelines.get(&key) {
            return Some(*handle);
        }
        if self.failed.contains(&key) {
            return None;
        }

        match backend.create_render_pipeline(&self.descriptor(key)) {
            Ok(handle) => {
                log::debug!("Created pipeline variant {:?}", key);
                self.pipelines.insert(key, handle);
                Some(handle)
            }
            Err(e) => {
                log::error!("Failed to create pipeline variant {:?}: {}", key, e);
                self.failed.insert(key);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    fn descriptor(&self, key: PipelineKey) -> RenderPipelineDescriptor {
        let config = key.kind.config();
        let stages = &self.stages[&key.kind];
        let (vertex_layouts, layout) = if config.uses_vertex_layout {
            (vec![Vertex::layout()], self.draw_layout)
        } else {
            (Vec::new(), self.background_layout)
        };

        RenderPipelineDescriptor {
            label: Some(format!(
                "{} {:?} {:?}",
                config.label, key.front_face, key.topology
            )),
            shader: stages.vertex.source.clone(),
            vertex_entry: stages.vertex.entry_point.clone(),
            fragment_entry: Some(stages.fragment.entry_point.clone()),
            vertex_layouts,
            bind_group_layouts: vec![layout],
            primitive_topology: key.topology,
            front_face: key.front_face,
            cull_mode: config.cull_mode,
            depth_stencil: Some(DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: config.depth_write_enabled,
                depth_compare: config.depth_compare,
            }),
            color_targets: vec![ColorTargetState {
                format: self.color_format,
                blend: Some(config.blend),
                write_mask: ColorWrites::ALL,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::error::RendererError;

    fn layouts(backend: &mut DummyBackend) -> (BindGroupLayoutHandle, BindGroupLayoutHandle) {
        (
            backend.create_bind_group_layout(&[]).unwrap(),
            backend.create_bind_group_layout(&[]).unwrap(),
        )
    }

    fn cache(backend: &mut DummyBackend) -> PipelineCache {
        let (draw, background) = layouts(backend);
        PipelineCache::new(
            backend,
            &ShaderLibrary::builtin(),
            TextureFormat::Bgra8Unorm,
            TextureFormat::Depth32Float,
            draw,
            background,
        )
        .unwrap()
    }

    #[test]
    fn base_variants_are_built_up_front() {
        let mut backend = DummyBackend::default();
        let cache = cache(&mut backend);
        assert_eq!(cache.len(), 3);
        assert_eq!(backend.pipeline_count(), 3);
    }

    #[test]
    fn configurations_match_draw_state() {
        let mut backend = DummyBackend::default();
        let mut cache = cache(&mut backend);

        let arrow = cache.get(&mut backend, PipelineKind::Arrow.base_key()).unwrap();
        let desc = backend.pipeline_descriptor(arrow).unwrap();
        assert_eq!(desc.vertex_entry, "arrow_vertex");
        assert_eq!(desc.fragment_entry.as_deref(), Some("mesh_fragment"));
        assert_eq!(desc.cull_mode, CullMode::Back);
        assert_eq!(desc.front_face, FrontFace::Ccw);
        let depth = desc.depth_stencil.clone().unwrap();
        assert!(depth.depth_write_enabled);
        assert_eq!(depth.depth_compare, CompareFunction::Less);
        assert_eq!(desc.color_targets[0].blend, Some(BlendState::alpha_blending()));
        assert_eq!(desc.vertex_layouts[0].array_stride, 32);

        let background = cache
            .get(&mut backend, PipelineKind::Background.base_key())
            .unwrap();
        let desc = backend.pipeline_descriptor(background).unwrap();
        assert!(desc.vertex_layouts.is_empty());
        assert_eq!(desc.primitive_topology, PrimitiveTopology::TriangleStrip);
        let depth = desc.depth_stencil.clone().unwrap();
        assert!(!depth.depth_write_enabled);
        assert_eq!(depth.depth_compare, CompareFunction::Always);
    }

    #[test]
    fn variants_are_built_once() {
        let mut backend = DummyBackend::default();
        let mut cache = cache(&mut backend);
        let key = PipelineKey {
            kind: PipelineKind::Default,
            front_face: FrontFace::Cw,
            topology: PrimitiveTopology::LineList,
        };
        let first = cache.get(&mut backend, key).unwrap();
        let second = cache.get(&mut backend, key).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.pipeline_count(), 4);
    }

    #[test]
    fn failed_variant_is_not_retried() {
        let mut backend = DummyBackend::default();
        let mut cache = cache(&mut backend);
        backend.failures_mut().pipeline_labels.push("Cw".into());
        let key = PipelineKey {
            kind: PipelineKind::Default,
            front_face: FrontFace::Cw,
            topology: PrimitiveTopology::TriangleList,
        };
        assert!(cache.get(&mut backend, key).is_none());
        backend.failures_mut().pipeline_labels.clear();
        assert!(cache.get(&mut backend, key).is_none());
    }

    #[test]
    fn missing_entry_point_fails_construction() {
        let mut backend = DummyBackend::default();
        let (draw, background) = layouts(&mut backend);
        let shaders = ShaderLibrary::new().with_module("mesh", crate::resources::MESH_SHADER);
        let result = PipelineCache::new(
            &mut backend,
            &shaders,
            TextureFormat::Bgra8Unorm,
            TextureFormat::Depth32Float,
            draw,
            background,
        );
        assert!(matches!(
            result,
            Err(RendererError::ShaderFunctionNotFound(name)) if name == "background_vertex"
        ));
    }
}
