//! WGSL sources and entry point lookup

use crate::error::{RendererError, RendererResult};

/// Lit meshes and the curve-bent lane arrow.
///
/// Group 0 is per draw: binding 0 vertex uniforms, binding 1 fragment uniforms.
pub const MESH_SHADER: &str = r#"
struct VertexUniforms {
    view_projection: mat4x4<f32>,
    model: mat4x4<f32>,
    normal_matrix: mat3x3<f32>,
    // Only read by arrow_vertex
    control_points: array<vec4<f32>, 4>,
}

struct FragmentUniforms {
    camera_position: vec3<f32>,
    opacity: f32,
    ambient_color: vec3<f32>,
    specular_power: f32,
    specular_color: vec3<f32>,
    pad0: f32,
    base_color: vec4<f32>,
    light_color: vec4<f32>,
    light_position: vec4<f32>,
}

@group(0) @binding(0) var<uniform> vertex_uniforms: VertexUniforms;
@group(0) @binding(1) var<uniform> fragment_uniforms: FragmentUniforms;

const AMBIENT_STRENGTH: f32 = 0.35;
const EPSILON: f32 = 1e-6;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

fn finish_vertex(local_position: vec3<f32>, local_normal: vec3<f32>, uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    let world = vertex_uniforms.model * vec4<f32>(local_position, 1.0);
    out.clip_position = vertex_uniforms.view_projection * world;
    out.world_position = world.xyz;
    out.world_normal = vertex_uniforms.normal_matrix * local_normal;
    out.uv = uv;
    return out;
}

@vertex
fn mesh_vertex(in: VertexInput) -> VertexOutput {
    return finish_vertex(in.position, in.normal, in.uv);
}

fn bezier(t: f32) -> vec3<f32> {
    let p = vertex_uniforms.control_points;
    let u = 1.0 - t;
    return p[0].xyz * (u * u * u)
        + p[1].xyz * (3.0 * u * u * t)
        + p[2].xyz * (3.0 * u * t * t)
        + p[3].xyz * (t * t * t);
}

fn bezier_tangent(t: f32) -> vec3<f32> {
    let p = vertex_uniforms.control_points;
    let u = 1.0 - t;
    let d = (p[1].xyz - p[0].xyz) * (3.0 * u * u)
        + (p[2].xyz - p[1].xyz) * (6.0 * u * t)
        + (p[3].xyz - p[2].xyz) * (3.0 * t * t);
    if (length(d) > EPSILON) {
        return normalize(d);
    }
    let chord = p[3].xyz - p[0].xyz;
    if (length(chord) > EPSILON) {
        return normalize(chord);
    }
    return vec3<f32>(1.0, 0.0, 0.0);
}

// The lane mesh runs along +X in [0, 1] with Z as lateral offset. X becomes
// the curve parameter and the ribbon is rebuilt in the curve's frame.
@vertex
fn arrow_vertex(in: VertexInput) -> VertexOutput {
    let t = clamp(in.position.x, 0.0, 1.0);
    let center = bezier(t);
    let tangent = bezier_tangent(t);

    var side = cross(tangent, vec3<f32>(0.0, 1.0, 0.0));
    if (length(side) > EPSILON) {
        side = normalize(side);
    } else {
        side = vec3<f32>(0.0, 0.0, 1.0);
    }
    let up = cross(side, tangent);

    let position = center + side * in.position.z + up * in.position.y;
    let normal = tangent * in.normal.x + up * in.normal.y + side * in.normal.z;
    return finish_vertex(position, normal, in.uv);
}

@fragment
fn mesh_fragment(in: VertexOutput) -> @location(0) vec4<f32> {
    let u = fragment_uniforms;
    let n = normalize(in.world_normal);
    let l = normalize(u.light_position.xyz - in.world_position);
    let v = normalize(u.camera_position - in.world_position);
    let h = normalize(l + v);

    let ambient = u.ambient_color * AMBIENT_STRENGTH;
    let diffuse = max(dot(n, l), 0.0) * u.base_color.rgb * u.light_color.rgb;
    let specular = pow(max(dot(n, h), 0.0), u.specular_power) * u.specular_color * u.light_color.rgb;

    return vec4<f32>(ambient + diffuse + specular, u.opacity);
}
"#;

/// Full-screen camera video quad drawn as a 4-vertex triangle strip.
///
/// Group 0 binding 0 is the frame texture, binding 1 its sampler.
pub const BACKGROUND_SHADER: &str = r#"
@group(0) @binding(0) var video_texture: texture_2d<f32>;
@group(0) @binding(1) var video_sampler: sampler;

struct BackgroundOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn background_vertex(@builtin(vertex_index) index: u32) -> BackgroundOutput {
    // (-1,-1) (1,-1) (-1,1) (1,1)
    let x = f32(index & 1u) * 2.0 - 1.0;
    let y = f32((index >> 1u) & 1u) * 2.0 - 1.0;
    var out: BackgroundOutput;
    out.clip_position = vec4<f32>(x, y, 1.0, 1.0);
    out.uv = vec2<f32>((x + 1.0) * 0.5, (1.0 - y) * 0.5);
    return out;
}

@fragment
fn background_fragment(in: BackgroundOutput) -> @location(0) vec4<f32> {
    return textureSample(video_texture, video_sampler, in.uv);
}
"#;

/// A named WGSL module
#[derive(Debug, Clone)]
pub struct ShaderModule {
    pub name: String,
    pub source: String,
}

/// An entry point together with the module that defines it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFunction {
    pub entry_point: String,
    pub module: String,
    pub source: String,
}

/// Looks up shader entry points by name
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    modules: Vec<ShaderModule>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mesh and background shaders the renderer ships with.
    pub fn builtin() -> Self {
        Self::new()
            .with_module("mesh", MESH_SHADER)
            .with_module("background", BACKGROUND_SHADER)
    }

    pub fn with_module(mut self, name: &str, source: &str) -> Self {
        self.modules.push(ShaderModule {
            name: name.to_string(),
            source: source.to_string(),
        });
        self
    }

    /// Find the module defining `fn name(`.
    pub fn function(&self, name: &str) -> RendererResult<ShaderFunction> {
        let signature = format!("fn {}(", name);
        self.modules
            .iter()
            .find(|m| m.source.contains(&signature))
            .map(|m| ShaderFunction {
                entry_point: name.to_string(),
                module: m.name.clone(),
                source: m.source.clone(),
            })
            .ok_or_else(|| RendererError::ShaderFunctionNotFound(name.to_string()))
    }
}
